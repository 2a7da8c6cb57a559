// src/config/mod.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ExperimentError};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExperimentConfig {
    pub text: TextConfig,
    pub keys: KeysConfig,
    pub send_triggers: TriggerMapConfig,
    pub timing: TimingConfig,
    pub blocks: BlocksConfig,
    pub experiment: StimuliSection,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TextConfig {
    pub setup: String,
    pub instructions: String,
    pub practice: String,
    pub end: String,
    #[serde(default = "default_pause_text")]
    pub pause: String,
    #[serde(default = "default_block_end_text")]
    pub block_end: String,
    #[serde(default = "default_extended_pause_text")]
    pub extended_pause: String,
}

impl TextConfig {
    /// Fills the `{block}` placeholder with a 1-based block number.
    pub fn block_message(template: &str, block_number: usize) -> String {
        template.replace("{block}", &block_number.to_string())
    }
}

/// A single key or a list of keys, as both shapes appear in existing config files.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum KeyList {
    One(String),
    Many(Vec<String>),
}

impl KeyList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            KeyList::One(key) => vec![key.clone()],
            KeyList::Many(keys) => keys.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            KeyList::One(key) => key.is_empty(),
            KeyList::Many(keys) => keys.is_empty(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KeysConfig {
    pub setup_proceed: KeyList,
    pub instruction_proceed: KeyList,
    #[serde(rename = "match", default = "default_match_key")]
    pub match_key: String,
    #[serde(rename = "mismatch", default = "default_mismatch_key")]
    pub mismatch_key: String,
    #[serde(rename = "pause", default = "default_pause_key")]
    pub pause_key: String,
    #[serde(rename = "quit", default = "default_quit_key")]
    pub quit_key: String,
    #[serde(rename = "resume", default = "default_resume_key")]
    pub resume_key: String,
    #[serde(default = "default_block_continue_keys")]
    pub block_continue: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TriggerMapConfig {
    pub map: HashMap<String, u8>,
    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MsRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(rename = "fixation_ON_ms")]
    pub fixation_on_ms: f64,
    #[serde(rename = "fixation_OFF_ms")]
    pub fixation_off_ms: f64,
    #[serde(rename = "prime_ON_ms")]
    pub prime_on_ms: f64,
    #[serde(rename = "prime_OFF_ms")]
    pub prime_off_ms: f64,
    #[serde(default = "default_response_window_ms")]
    pub response_window_ms: f64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: MsRange,
    #[serde(default = "default_simulated_rt_ms")]
    pub simulated_rt_ms: MsRange,
    #[serde(default = "default_use_frame_rate")]
    pub use_frame_rate: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BlocksConfig {
    pub count: usize,
    pub trials_per_block: usize,
    #[serde(default = "default_extended_pause_after")]
    pub extended_pause_after: usize,
    #[serde(default = "default_practice_trials_per_block")]
    pub practice_trials_per_block: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StimuliSection {
    #[serde(default = "default_experiment_name")]
    pub name: String,
    pub stimuli: StimuliFiles,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StimuliFiles {
    pub full: String,
    pub practice: String,
}

fn default_pause_text() -> String {
    "Experiment paused. Wait for experimenter to continue.".to_string()
}
fn default_block_end_text() -> String {
    "End of block {block}. Press any key to continue.".to_string()
}
fn default_extended_pause_text() -> String {
    "End of block {block}. Wait for experimenter to continue.".to_string()
}
fn default_match_key() -> String {
    "2".to_string()
}
fn default_mismatch_key() -> String {
    "1".to_string()
}
fn default_pause_key() -> String {
    "p".to_string()
}
fn default_quit_key() -> String {
    "q".to_string()
}
fn default_resume_key() -> String {
    "s".to_string()
}
fn default_block_continue_keys() -> Vec<String> {
    ["1", "2", "s", "q"].iter().map(|k| k.to_string()).collect()
}
fn default_pulse_ms() -> f64 {
    20.0
}
fn default_response_window_ms() -> f64 {
    300.0
}
fn default_jitter_ms() -> MsRange {
    MsRange {
        min: 500.0,
        max: 900.0,
    }
}
fn default_simulated_rt_ms() -> MsRange {
    MsRange {
        min: 500.0,
        max: 900.0,
    }
}
fn default_use_frame_rate() -> bool {
    true
}
fn default_extended_pause_after() -> usize {
    4
}
fn default_practice_trials_per_block() -> usize {
    6
}
fn default_experiment_name() -> String {
    "experiment".to_string()
}

/// Which stimulus table a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentType {
    Full,
    Practice,
}

/// Per-run choices made by the experimenter at start-up.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub participant: String,
    pub experiment_type: ExperimentType,
    pub fullscreen: bool,
    pub photodiode: bool,
    pub send_triggers: bool,
    pub auto_respond: bool,
    pub verbose: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            participant: String::new(),
            experiment_type: ExperimentType::Full,
            fullscreen: false,
            photodiode: true,
            send_triggers: true,
            auto_respond: false,
            verbose: true,
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, text) in [
            ("text.setup", &self.text.setup),
            ("text.instructions", &self.text.instructions),
            ("text.practice", &self.text.practice),
            ("text.end", &self.text.end),
        ] {
            if text.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }

        if self.keys.setup_proceed.is_empty() || self.keys.instruction_proceed.is_empty() {
            return Err(ConfigError::Invalid(
                "keys.setup_proceed and keys.instruction_proceed need at least one key".into(),
            ));
        }
        let keys = &self.keys;
        if keys.match_key == keys.mismatch_key {
            return Err(ConfigError::Invalid(
                "keys.match and keys.mismatch must differ".into(),
            ));
        }
        for control in [&keys.pause_key, &keys.quit_key] {
            if *control == keys.match_key || *control == keys.mismatch_key {
                return Err(ConfigError::Invalid(format!(
                    "control key '{}' collides with a response key",
                    control
                )));
            }
        }
        if keys.pause_key == keys.quit_key {
            return Err(ConfigError::Invalid("keys.pause and keys.quit must differ".into()));
        }
        if keys.resume_key == keys.pause_key {
            return Err(ConfigError::Invalid("keys.resume and keys.pause must differ".into()));
        }

        if self.send_triggers.map.is_empty() {
            return Err(ConfigError::Invalid("send_triggers.map is empty".into()));
        }
        let pulse_ms = self.send_triggers.pulse_ms;
        if !pulse_ms.is_finite() || pulse_ms < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "send_triggers.pulse_ms must be a non-negative number, got {}",
                pulse_ms
            )));
        }

        let timing = &self.timing;
        for (name, value) in [
            ("timing.fixation_ON_ms", timing.fixation_on_ms),
            ("timing.fixation_OFF_ms", timing.fixation_off_ms),
            ("timing.prime_ON_ms", timing.prime_on_ms),
            ("timing.prime_OFF_ms", timing.prime_off_ms),
            ("timing.response_window_ms", timing.response_window_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        for (name, range) in [
            ("timing.jitter_ms", timing.jitter_ms),
            ("timing.simulated_rt_ms", timing.simulated_rt_ms),
        ] {
            if !range.min.is_finite()
                || !range.max.is_finite()
                || range.min < 0.0
                || range.min > range.max
            {
                return Err(ConfigError::Invalid(format!(
                    "{} needs 0 <= min <= max, got {:?}",
                    name, range
                )));
            }
        }

        if self.blocks.count == 0 || self.blocks.trials_per_block == 0 {
            return Err(ConfigError::Invalid(
                "blocks.count and blocks.trials_per_block must be positive".into(),
            ));
        }
        if self.blocks.practice_trials_per_block == 0 {
            return Err(ConfigError::Invalid(
                "blocks.practice_trials_per_block must be positive".into(),
            ));
        }

        Ok(())
    }

    pub fn trigger_code(&self, condition_label: &str) -> Result<u8, ExperimentError> {
        self.send_triggers
            .map
            .get(condition_label)
            .copied()
            .ok_or_else(|| ExperimentError::UnknownCondition(condition_label.to_string()))
    }

    pub fn stimuli_path(&self, stimuli_dir: &Path, experiment_type: ExperimentType) -> PathBuf {
        let file = match experiment_type {
            ExperimentType::Full => &self.experiment.stimuli.full,
            ExperimentType::Practice => &self.experiment.stimuli.practice,
        };
        stimuli_dir.join(file)
    }

    /// Block layout for a run: `(block count, trials per block)`. Practice runs are a
    /// single short block.
    pub fn block_layout(&self, experiment_type: ExperimentType) -> (usize, usize) {
        match experiment_type {
            ExperimentType::Full => (self.blocks.count, self.blocks.trials_per_block),
            ExperimentType::Practice => (1, self.blocks.practice_trials_per_block),
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ExperimentConfig, ConfigError> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config = parse_config(&config_str)?;
    log::info!("Loaded experiment config from {}", path.display());
    Ok(config)
}

/// Parses and validates config text. JSON config files parse as YAML too.
pub fn parse_config(config_str: &str) -> Result<ExperimentConfig, ConfigError> {
    let config: ExperimentConfig = serde_yaml::from_str(config_str)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(config: &ExperimentConfig, path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let yaml = serde_yaml::to_string(config)?;

    fs::write(path, yaml).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
