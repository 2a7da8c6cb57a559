// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load stimuli from {path}: {reason}")]
    Stimuli { path: PathBuf, reason: String },

    #[error("no trigger code mapped for condition label '{0}'")]
    UnknownCondition(String),

    #[error("display error: {0}")]
    Display(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("trigger error: {0}")]
    Trigger(#[source] std::io::Error),

    #[error("failed to write trial log: {0}")]
    Log(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("channel {name} not found in {available:?}")]
    MissingChannel {
        name: String,
        available: Vec<String>,
    },

    #[error("malformed signal file: {0}")]
    Malformed(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write diagnostic plot: {0}")]
    Plot(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
