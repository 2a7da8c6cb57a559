// src/processing/photodiode.rs
//
// Moves software-timed event markers onto the physical stimulus onset seen by the
// photodiode.

use colored::Colorize;
use serde::{Deserialize, Serialize};

use super::detectors::threshold::{ThresholdDetector, ThresholdDetectorConfig};
use super::detectors::DetectorInstance;
use super::events::Event;
use super::signal::RawSignal;
use super::statistics::Statistics;
use crate::error::ProcessingError;
use crate::visualization::plotter::DiagnosticPlotter;
use crate::visualization::TracePlot;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PhotodiodeConfig {
    pub channel: String,
    /// Baseline length in samples.
    pub baseline_len: usize,
    /// Samples between the end of the baseline and the coarse event.
    pub baseline_gap: usize,
    pub std_multiplier: f64,
    /// Samples searched from the coarse event onward.
    pub search_window: usize,
}

impl Default for PhotodiodeConfig {
    fn default() -> Self {
        Self {
            channel: "MISC 021".to_string(),
            baseline_len: 100,
            baseline_gap: 50,
            std_multiplier: 20.0,
            search_window: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// Nothing in the search window crossed the threshold.
    NoCrossing,
    /// The baseline window starts before the first recorded sample.
    BaselineOutOfRange,
    /// The event lies outside the recording.
    OutsideRecording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnsetOutcome {
    Detected { shift: usize },
    Missed(MissReason),
}

impl OnsetOutcome {
    /// Shift applied to the event; misses are left in place.
    pub fn shift(&self) -> usize {
        match self {
            OnsetOutcome::Detected { shift } => *shift,
            OnsetOutcome::Missed(_) => 0,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, OnsetOutcome::Detected { .. })
    }
}

#[derive(Debug, Clone)]
pub struct CorrectionReport {
    /// Same length, order and codes as the input; only `sample` may have moved forward.
    pub events: Vec<Event>,
    pub outcomes: Vec<OnsetOutcome>,
    /// Mean of the applied shifts over all events, misses counted as zero.
    pub mean_shift: f64,
    /// Population standard deviation of the applied shifts.
    pub sd_shift: f64,
}

impl CorrectionReport {
    pub fn detected(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_detected()).count()
    }

    pub fn missed(&self) -> Vec<(usize, MissReason)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, outcome)| match outcome {
                OnsetOutcome::Missed(reason) => Some((i, *reason)),
                OnsetOutcome::Detected { .. } => None,
            })
            .collect()
    }

    pub fn print_summary(&self) {
        println!(
            "shift applied: mean={:.2} samples, sd={:.2}",
            self.mean_shift, self.sd_shift
        );
        let missed = self.outcomes.len() - self.detected();
        if missed > 0 {
            println!(
                "{}",
                format!(
                    "{} of {} events had no photodiode onset and were left unshifted",
                    missed,
                    self.outcomes.len()
                )
                .yellow()
            );
        }
    }
}

pub struct PhotodiodeCorrector {
    config: PhotodiodeConfig,
    plotter: Option<DiagnosticPlotter>,
}

impl PhotodiodeCorrector {
    pub fn new(config: PhotodiodeConfig) -> Self {
        Self {
            config,
            plotter: None,
        }
    }

    pub fn with_plotter(mut self, plotter: DiagnosticPlotter) -> Self {
        self.plotter = Some(plotter);
        self
    }

    pub fn plotter(&self) -> Option<&DiagnosticPlotter> {
        self.plotter.as_ref()
    }

    /// Corrects every event against the photodiode channel. A missing channel is an
    /// error; an event without a detectable onset is kept as is and reported as missed.
    pub fn correct(
        &mut self,
        raw: &RawSignal,
        events: &[Event],
    ) -> Result<CorrectionReport, ProcessingError> {
        let trace = raw.channel(&self.config.channel)?;

        let mut shifted = events.to_vec();
        let mut outcomes = Vec::with_capacity(events.len());

        for (index, event) in events.iter().enumerate() {
            let (outcome, threshold) = self.detect_onset(trace, event.sample - raw.first_samp());
            if let OnsetOutcome::Detected { shift } = outcome {
                shifted[index].sample = event.sample + shift as i64;

                if let (Some(plotter), Some(threshold)) = (self.plotter.as_mut(), threshold) {
                    let start = (event.sample - raw.first_samp()) as usize;
                    let end = (start + plotter.trace_len()).min(trace.len());
                    plotter.plot(
                        index,
                        &TracePlot {
                            trace: &trace[start..end],
                            threshold,
                            onset: shift,
                        },
                    )?;
                }
            } else {
                log::debug!("No photodiode onset for event {} at sample {}: {:?}", index, event.sample, outcome);
            }
            outcomes.push(outcome);
        }

        let shifts: Vec<f64> = outcomes.iter().map(|o| o.shift() as f64).collect();
        let stats = Statistics::from_slice(&shifts);

        let report = CorrectionReport {
            events: shifted,
            outcomes,
            mean_shift: stats.mean,
            sd_shift: stats.std_dev,
        };
        log::info!(
            "Photodiode correction on {}: {} of {} events shifted, mean {:.2} sd {:.2} samples",
            self.config.channel,
            report.detected(),
            events.len(),
            report.mean_shift,
            report.sd_shift
        );
        Ok(report)
    }

    /// Looks for the onset after recording-relative sample `t`. Returns the outcome and
    /// the threshold used, when one could be computed.
    fn detect_onset(&self, trace: &[f64], t: i64) -> (OnsetOutcome, Option<f64>) {
        if t < 0 || t as usize >= trace.len() {
            return (OnsetOutcome::Missed(MissReason::OutsideRecording), None);
        }
        let t = t as usize;
        let lead = self.config.baseline_gap + self.config.baseline_len;
        if t < lead {
            return (OnsetOutcome::Missed(MissReason::BaselineOutOfRange), None);
        }

        let baseline = &trace[t - lead..t - self.config.baseline_gap];
        let detector = ThresholdDetector::from_baseline(
            ThresholdDetectorConfig {
                id: self.config.channel.clone(),
                std_multiplier: self.config.std_multiplier,
            },
            baseline,
        );

        let end = (t + self.config.search_window).min(trace.len());
        let outcome = match detector.detect(&trace[t..end]) {
            Some(hit) => OnsetOutcome::Detected { shift: hit.offset },
            None => OnsetOutcome::Missed(MissReason::NoCrossing),
        };
        (outcome, Some(detector.threshold()))
    }
}

/// Corrects `events` with default plotting off.
pub fn correct_onsets(
    raw: &RawSignal,
    events: &[Event],
    config: &PhotodiodeConfig,
) -> Result<CorrectionReport, ProcessingError> {
    PhotodiodeCorrector::new(config.clone()).correct(raw, events)
}
