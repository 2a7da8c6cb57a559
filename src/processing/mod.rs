pub mod detectors;
pub mod events;
pub mod photodiode;
pub mod signal;
pub mod statistics;
