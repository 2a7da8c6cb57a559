// src/experiment/mod.rs

pub mod devices;
pub mod presenter;
pub mod session;
pub mod stimuli;
pub mod timing;

use std::time::Duration;

use crate::config::KeysConfig;

/// Value of `match_manip` that marks a match trial.
pub const SAME: &str = "SAME";

/// One row of the stimulus table.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// Position of the row in the stimulus file.
    pub id: usize,
    pub prime: String,
    pub target: String,
    pub condition_label: String,
    pub match_manip: String,
    pub block_id: usize,
    /// Every column of the row in file order, copied into the trial log.
    pub columns: Vec<(String, String)>,
}

impl Trial {
    pub fn is_match(&self) -> bool {
        self.match_manip == SAME
    }

    /// Text shown at the response prompt: the prime again on match trials, the target
    /// otherwise.
    pub fn probe_text(&self) -> &str {
        if self.is_match() {
            &self.prime
        } else {
            &self.target
        }
    }
}

/// Result of a presentation step: carry on with a value, or end the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow<T> {
    Continue(T),
    Quit,
}

/// Per-trial phases, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fixation,
    StimulusOnset,
    StimulusOffset,
    ResponseWait,
    Scored,
    InterTrialInterval,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Fixation => "fixation",
            Phase::StimulusOnset => "stimulus onset",
            Phase::StimulusOffset => "stimulus offset",
            Phase::ResponseWait => "response wait",
            Phase::Scored => "scoring",
            Phase::InterTrialInterval => "inter-trial interval",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub answer: String,
    pub reaction_time: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub response: Response,
    pub correct: bool,
    pub jitter_ms: f64,
}

/// One line of the participant's trial log.
#[derive(Debug, Clone)]
pub struct TrialRecord {
    pub participant: String,
    pub trial_num: usize,
    pub answer: String,
    pub correct: bool,
    pub reaction_time_s: f64,
    pub jitter_s: f64,
    pub timestamp: chrono::DateTime<chrono::Local>,
    pub trial: Trial,
}

impl TrialRecord {
    pub fn new(participant: &str, trial_num: usize, trial: &Trial, outcome: &TrialOutcome) -> Self {
        Self {
            participant: participant.to_string(),
            trial_num,
            answer: outcome.response.answer.clone(),
            correct: outcome.correct,
            reaction_time_s: outcome.response.reaction_time.as_secs_f64(),
            jitter_s: outcome.jitter_ms / 1000.0,
            timestamp: chrono::Local::now(),
            trial: trial.clone(),
        }
    }
}

/// A match trial is correct on the match key, a mismatch trial on the mismatch key.
/// Any other answer (pause, timeout) is incorrect.
pub fn score(trial: &Trial, answer: &str, keys: &KeysConfig) -> bool {
    (trial.is_match() && answer == keys.match_key)
        || (!trial.is_match() && answer == keys.mismatch_key)
}
