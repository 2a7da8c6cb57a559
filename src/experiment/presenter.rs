// src/experiment/presenter.rs

use rand::rngs::StdRng;
use rand::Rng;
use std::time::Duration;

use super::devices::{Display, Input, Timer, Visual};
use super::timing::{frames_for, hold, WaitPolicy};
use super::{score, Flow, Phase, Response, Trial, TrialOutcome};
use crate::config::{ExperimentConfig, SessionSettings};
use crate::error::ExperimentError;
use crate::triggers::TriggerSender;

/// Borrowed handles to the hardware a session drives.
pub struct Devices<'a> {
    pub display: &'a mut dyn Display,
    pub input: &'a mut dyn Input,
    pub timer: &'a mut dyn Timer,
    pub trigger: &'a mut dyn TriggerSender,
}

fn enter(trial: &Trial, phase: &mut Phase, next: Phase) {
    *phase = next;
    log::debug!("Trial {}: {}", trial.id, next);
}

pub struct Presenter<'a> {
    config: &'a ExperimentConfig,
    settings: &'a SessionSettings,
    devices: Devices<'a>,
    policy: WaitPolicy,
    rng: StdRng,
    trial_onset: Option<Duration>,
}

impl<'a> Presenter<'a> {
    pub fn new(
        config: &'a ExperimentConfig,
        settings: &'a SessionSettings,
        devices: Devices<'a>,
        rng: StdRng,
    ) -> Self {
        Self {
            config,
            settings,
            devices,
            policy: WaitPolicy::from_use_frame_rate(config.timing.use_frame_rate),
            rng,
            trial_onset: None,
        }
    }

    /// Time of the most recent stimulus onset flip.
    pub fn trial_onset(&self) -> Option<Duration> {
        self.trial_onset
    }

    // TEXT PROMPTS ------------------------------------------------------------

    /// Shows a text screen until one of `proceed_keys` is pressed. With `allow_pause`
    /// the pause and quit keys are accepted as well.
    pub fn present_text(
        &mut self,
        text: &str,
        proceed_keys: &[String],
        allow_pause: bool,
    ) -> Result<Flow<String>, ExperimentError> {
        let config = self.config;
        let keys = &config.keys;
        let mut allowed = proceed_keys.to_vec();
        if allow_pause {
            allowed.push(keys.pause_key.clone());
            allowed.push(keys.quit_key.clone());
        }

        let key = self.show_and_wait(text, &allowed)?;
        if key == keys.quit_key {
            self.show_closing()?;
            return Ok(Flow::Quit);
        }
        if key == keys.pause_key {
            if let Flow::Quit = self.pause()? {
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue(key))
    }

    /// Holds the session until the experimenter resumes.
    pub fn pause(&mut self) -> Result<Flow<String>, ExperimentError> {
        log::info!("Experiment paused");
        let text = self.config.text.pause.clone();
        let resume = vec![self.config.keys.resume_key.clone()];
        self.present_text(&text, &resume, false)
    }

    /// Shows the closing message once.
    pub fn show_closing(&mut self) -> Result<(), ExperimentError> {
        let text = self.config.text.end.clone();
        let resume = vec![self.config.keys.resume_key.clone()];
        self.show_and_wait(&text, &resume)?;
        Ok(())
    }

    fn show_and_wait(&mut self, text: &str, allowed: &[String]) -> Result<String, ExperimentError> {
        self.devices
            .display
            .draw(&Visual::Instructions(text.to_string()))?;
        self.devices.display.flip()?;
        self.devices
            .input
            .wait_keys(allowed, None)?
            .ok_or_else(|| ExperimentError::Input("unbounded key wait returned nothing".into()))
    }

    // TRIAL PHASES ------------------------------------------------------------

    pub fn run_trial(&mut self, trial: &Trial) -> Result<Flow<TrialOutcome>, ExperimentError> {
        let mut phase = Phase::Fixation;
        let result = self.step_through(trial, &mut phase);
        if let Err(e) = &result {
            log::error!("Error in {} of trial {}: {}", phase, trial.id, e);
        }
        result
    }

    fn step_through(
        &mut self,
        trial: &Trial,
        phase: &mut Phase,
    ) -> Result<Flow<TrialOutcome>, ExperimentError> {
        enter(trial, phase, Phase::Fixation);
        self.present_fixation()?;

        enter(trial, phase, Phase::StimulusOnset);
        self.present_stimulus(trial)?;

        enter(trial, phase, Phase::StimulusOffset);
        self.blank(self.config.timing.prime_off_ms)?;

        enter(trial, phase, Phase::ResponseWait);
        let response = match self.collect_response(trial)? {
            Flow::Continue(response) => response,
            Flow::Quit => return Ok(Flow::Quit),
        };

        enter(trial, phase, Phase::Scored);
        let correct = score(trial, &response.answer, &self.config.keys);
        log::debug!("Trial {} scored: answer {} correct {}", trial.id, response.answer, correct);

        enter(trial, phase, Phase::InterTrialInterval);
        let jitter_ms = self.inter_trial_interval()?;

        Ok(Flow::Continue(TrialOutcome {
            response,
            correct,
            jitter_ms,
        }))
    }

    pub fn present_fixation(&mut self) -> Result<(), ExperimentError> {
        let start = self.devices.timer.now();
        let timing = &self.config.timing;
        let (on_ms, off_ms) = (timing.fixation_on_ms, timing.fixation_off_ms);

        hold(
            &mut *self.devices.display,
            &mut *self.devices.timer,
            self.policy,
            on_ms,
            &[Visual::Fixation],
        )?;
        hold(
            &mut *self.devices.display,
            &mut *self.devices.timer,
            self.policy,
            off_ms,
            &[],
        )?;

        let onscreen_ms = (self.devices.timer.now() - start).as_secs_f64() * 1000.0;
        log::debug!(
            "Fixation onscreen time: {:.2} ms ({:?})",
            onscreen_ms,
            self.policy
        );
        Ok(())
    }

    /// Draws the prime and fires the trigger on the first flip. The trigger code is
    /// resolved before anything is drawn.
    pub fn present_stimulus(&mut self, trial: &Trial) -> Result<(), ExperimentError> {
        let code = self.config.trigger_code(&trial.condition_label)?;
        let pulse = Duration::from_secs_f64(self.config.send_triggers.pulse_ms / 1000.0);

        let mut visuals = vec![Visual::Text(trial.prime.clone())];
        if self.settings.photodiode {
            visuals.push(Visual::PhotodiodeMarker);
        }

        let on_ms = self.config.timing.prime_on_ms;
        let start = self.devices.timer.now();

        for visual in &visuals {
            self.devices.display.draw(visual)?;
        }
        self.devices.display.flip()?;
        self.on_stimulus_flip(code, pulse, &trial.condition_label)?;

        match self.policy {
            WaitPolicy::FrameCounted => {
                let frames = frames_for(on_ms, self.devices.display.frame_period_ms());
                // The onset flip is the first frame of the hold.
                for _ in 1..frames {
                    for visual in &visuals {
                        self.devices.display.draw(visual)?;
                    }
                    self.devices.display.flip()?;
                }
            }
            WaitPolicy::WallClock => {
                self.devices
                    .timer
                    .sleep(Duration::from_secs_f64(on_ms / 1000.0));
            }
        }

        let total_ms = (self.devices.timer.now() - start).as_secs_f64() * 1000.0;
        log::debug!("Stimulus presentation time: {:.2} ms", total_ms);
        Ok(())
    }

    fn on_stimulus_flip(
        &mut self,
        code: u8,
        pulse: Duration,
        condition_label: &str,
    ) -> Result<(), ExperimentError> {
        self.trial_onset = Some(self.devices.timer.now());
        if self.settings.send_triggers {
            self.devices.trigger.send(code, pulse)?;
            log::debug!("Sent trigger {} for condition {}", code, condition_label);
        }
        Ok(())
    }

    fn blank(&mut self, duration_ms: f64) -> Result<(), ExperimentError> {
        hold(
            &mut *self.devices.display,
            &mut *self.devices.timer,
            self.policy,
            duration_ms,
            &[],
        )?;
        Ok(())
    }

    /// Shows the probe and waits for a judgement. A short bounded wait comes first; if
    /// nothing arrives the screen is blanked and the wait continues without bound.
    pub fn collect_response(&mut self, trial: &Trial) -> Result<Flow<Response>, ExperimentError> {
        self.devices
            .display
            .draw(&Visual::Text(trial.probe_text().to_string()))?;
        if self.settings.photodiode {
            self.devices.display.draw(&Visual::PhotodiodeMarker)?;
        }
        self.devices.display.flip()?;
        let response_start = self.devices.timer.now();

        let config = self.config;
        let keys = &config.keys;
        if self.settings.auto_respond {
            let answer = if self.rng.gen_bool(0.5) {
                keys.match_key.clone()
            } else {
                keys.mismatch_key.clone()
            };
            let range = self.config.timing.simulated_rt_ms;
            let delay_ms = self.rng.gen_range(range.min..=range.max);
            self.devices
                .timer
                .sleep(Duration::from_secs_f64(delay_ms / 1000.0));
            return Ok(Flow::Continue(Response {
                answer,
                reaction_time: self.devices.timer.now() - response_start,
            }));
        }

        let allowed = vec![
            keys.match_key.clone(),
            keys.mismatch_key.clone(),
            keys.quit_key.clone(),
            keys.pause_key.clone(),
        ];
        let window = Duration::from_secs_f64(self.config.timing.response_window_ms / 1000.0);

        let answer = match self.devices.input.wait_keys(&allowed, Some(window))? {
            Some(key) => key,
            None => {
                self.devices.display.flip()?;
                self.devices.input.wait_keys(&allowed, None)?.ok_or_else(|| {
                    ExperimentError::Input("unbounded key wait returned nothing".into())
                })?
            }
        };
        let reaction_time = self.devices.timer.now() - response_start;

        if answer == keys.quit_key {
            self.show_closing()?;
            return Ok(Flow::Quit);
        }
        if answer == keys.pause_key {
            if let Flow::Quit = self.pause()? {
                return Ok(Flow::Quit);
            }
        }

        Ok(Flow::Continue(Response {
            answer,
            reaction_time,
        }))
    }

    /// Draws a jitter from the configured range and waits it out on a blank screen.
    pub fn inter_trial_interval(&mut self) -> Result<f64, ExperimentError> {
        let range = self.config.timing.jitter_ms;
        let jitter_ms = self.rng.gen_range(range.min..=range.max);
        self.blank(jitter_ms)?;
        Ok(jitter_ms)
    }
}
