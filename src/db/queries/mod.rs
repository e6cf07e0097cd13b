//! Database queries

pub mod base_rules;
pub mod coords;
pub mod planned_route;
pub mod service;
pub mod trailer;
pub mod weights;
