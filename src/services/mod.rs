//! Business logic services

pub mod cities;
pub mod geo;
pub mod geocoding;
pub mod model;
pub mod planner;
pub mod solver;
