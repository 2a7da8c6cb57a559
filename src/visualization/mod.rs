// src/visualization/mod.rs

pub mod plotter;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlotConfig {
    /// Plots written per run; later detections are not drawn.
    pub max_plots: usize,
    /// Samples of trace drawn from the coarse event onward.
    pub trace_len: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            max_plots: 10,
            trace_len: 400,
            width: 640,
            height: 480,
        }
    }
}

/// What one diagnostic plot shows.
pub struct TracePlot<'a> {
    pub trace: &'a [f64],
    pub threshold: f64,
    /// Detected onset, relative to the start of `trace`.
    pub onset: usize,
}
