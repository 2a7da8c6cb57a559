// src/experiment/session.rs

use colored::Colorize;
use std::time::{Duration, Instant};

use super::presenter::Presenter;
use super::stimuli::{block_count, trials_in_block};
use super::{Flow, Trial, TrialRecord};
use crate::config::{ExperimentConfig, ExperimentType, SessionSettings, TextConfig};
use crate::error::ExperimentError;
use crate::utils::log::TrialLogger;

/// Running counters and the log handle, threaded through the block loop.
pub struct SessionState {
    pub trial_num: usize,
    pub total_correct: usize,
    logger: Option<TrialLogger>,
}

impl SessionState {
    pub fn new(logger: Option<TrialLogger>) -> Self {
        Self {
            trial_num: 0,
            total_correct: 0,
            logger,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Quit,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub outcome: SessionOutcome,
    pub trials_completed: usize,
    pub total_correct: usize,
    pub accuracy_percent: f64,
    pub elapsed: Duration,
}

/// Owns the session state for the duration of the block loop and reports the final
/// statistics when dropped, however the loop ended.
struct SessionGuard {
    state: SessionState,
    total_trials: usize,
    started: Instant,
    started_at: chrono::DateTime<chrono::Local>,
}

impl SessionGuard {
    fn new(state: SessionState, total_trials: usize) -> Self {
        Self {
            state,
            total_trials,
            started: Instant::now(),
            started_at: chrono::Local::now(),
        }
    }

    fn accuracy_percent(&self) -> f64 {
        if self.total_trials == 0 {
            return 0.0;
        }
        self.state.total_correct as f64 / self.total_trials as f64 * 100.0
    }

    fn summary(&self, outcome: SessionOutcome) -> SessionSummary {
        SessionSummary {
            outcome,
            trials_completed: self.state.trial_num,
            total_correct: self.state.total_correct,
            accuracy_percent: self.accuracy_percent(),
            elapsed: self.started.elapsed(),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let elapsed_s = self.started.elapsed().as_secs_f64();
        log::info!(
            "Session started {} finished: {} trials, {} correct",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.state.trial_num,
            self.state.total_correct
        );
        log::info!("Total Experiment Time in seconds: {:.3}", elapsed_s);
        log::info!("Total Experiment Time in minutes: {:.3}", elapsed_s / 60.0);
        log::info!("Accuracy: {:.2}%", self.accuracy_percent());
    }
}

/// Runs setup and instruction screens, every block in order, and the closing screen.
/// `trials` must already carry block ids.
pub fn run_session(
    config: &ExperimentConfig,
    settings: &SessionSettings,
    trials: &[Trial],
    presenter: &mut Presenter<'_>,
    logger: Option<TrialLogger>,
) -> Result<SessionSummary, ExperimentError> {
    let (n_blocks, trials_per_block) = config.block_layout(settings.experiment_type);
    let derived_blocks = block_count(trials.len(), trials_per_block);
    if derived_blocks != n_blocks {
        log::warn!(
            "Stimulus table yields {} blocks of {} but {} are configured",
            derived_blocks,
            trials_per_block,
            n_blocks
        );
    }

    let mut guard = SessionGuard::new(SessionState::new(logger), trials.len());
    match run_blocks(config, settings, trials, n_blocks, presenter, &mut guard.state) {
        Ok(outcome) => Ok(guard.summary(outcome)),
        Err(e) => {
            log::error!("Error in experiment: {}", e);
            Err(e)
        }
    }
}

fn run_blocks(
    config: &ExperimentConfig,
    settings: &SessionSettings,
    trials: &[Trial],
    n_blocks: usize,
    presenter: &mut Presenter<'_>,
    state: &mut SessionState,
) -> Result<SessionOutcome, ExperimentError> {
    let keys = &config.keys;
    let instructions = match settings.experiment_type {
        ExperimentType::Full => &config.text.instructions,
        ExperimentType::Practice => &config.text.practice,
    };

    for (text, proceed) in [
        (&config.text.setup, keys.setup_proceed.to_vec()),
        (instructions, keys.instruction_proceed.to_vec()),
    ] {
        if let Flow::Quit = presenter.present_text(text, &proceed, false)? {
            return Ok(SessionOutcome::Quit);
        }
    }

    for block_id in 0..n_blocks {
        let block = trials_in_block(trials, block_id);
        log::info!("Starting block {} ({} trials)", block_id + 1, block.len());
        if let Flow::Quit = run_block(settings, &block, trials.len(), presenter, state)? {
            return Ok(SessionOutcome::Quit);
        }

        let block_number = block_id + 1;
        if block_number == config.blocks.extended_pause_after {
            let text = TextConfig::block_message(&config.text.extended_pause, block_number);
            let resume = vec![keys.resume_key.clone()];
            if let Flow::Quit = presenter.present_text(&text, &resume, false)? {
                return Ok(SessionOutcome::Quit);
            }
        }
        let text = TextConfig::block_message(&config.text.block_end, block_number);
        if let Flow::Quit = presenter.present_text(&text, &keys.block_continue, false)? {
            return Ok(SessionOutcome::Quit);
        }
    }

    presenter.show_closing()?;
    Ok(SessionOutcome::Completed)
}

fn run_block(
    settings: &SessionSettings,
    block: &[&Trial],
    total_trials: usize,
    presenter: &mut Presenter<'_>,
    state: &mut SessionState,
) -> Result<Flow<()>, ExperimentError> {
    for trial in block {
        let outcome = match presenter.run_trial(trial)? {
            Flow::Continue(outcome) => outcome,
            Flow::Quit => return Ok(Flow::Quit),
        };

        state.total_correct += usize::from(outcome.correct);
        let record = TrialRecord::new(&settings.participant, state.trial_num, trial, &outcome);

        if settings.verbose {
            let verdict = if outcome.correct {
                "correct".green()
            } else {
                "incorrect".red()
            };
            println!(
                "Trial {} / {}: {} -> {} | answer {} {} | RT {:.3}s | accuracy {:.2}",
                state.trial_num + 1,
                total_trials,
                trial.prime,
                trial.probe_text(),
                record.answer,
                verdict,
                record.reaction_time_s,
                state.total_correct as f64 / (state.trial_num + 1) as f64
            );
        }

        if let Some(logger) = state.logger.as_mut() {
            logger.append(&record)?;
        }
        log::debug!(
            "Trial {} (stimulus {}, condition {}) answer {} correct {} rt {:.3}s jitter {:.3}s",
            record.trial_num,
            trial.id,
            trial.condition_label,
            record.answer,
            record.correct,
            record.reaction_time_s,
            record.jitter_s
        );
        state.trial_num += 1;
    }
    Ok(Flow::Continue(()))
}
