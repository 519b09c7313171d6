pub mod algorithm;
pub mod cat;
pub mod common;
pub mod config;
pub mod constraint;
pub mod error;
pub mod map;
pub mod scenario;
pub mod solver;
pub mod stat;
