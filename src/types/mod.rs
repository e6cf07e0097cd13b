//! Type definitions

pub mod city;
pub mod route;
pub mod service;
pub mod trailer;
pub mod weights;

pub use city::*;
pub use route::*;
pub use service::*;
pub use trailer::*;
pub use weights::*;
