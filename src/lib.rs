pub mod config;
pub mod error;
pub mod experiment;
pub mod processing;
pub mod triggers;
pub mod utils;
pub mod visualization;
