use std::time::Duration;

use super::devices::{Display, Timer, Visual};
use crate::error::ExperimentError;

/// How a hold of a given duration is timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Count display refreshes. Immune to timer drift, relies on the true frame period.
    FrameCounted,
    /// Flip once and sleep.
    WallClock,
}

impl WaitPolicy {
    pub fn from_use_frame_rate(use_frame_rate: bool) -> Self {
        if use_frame_rate {
            WaitPolicy::FrameCounted
        } else {
            WaitPolicy::WallClock
        }
    }
}

/// Number of refreshes covering `duration_ms`: rounded up, plus one frame.
pub fn frames_for(duration_ms: f64, frame_period_ms: f64) -> usize {
    if duration_ms <= 0.0 {
        return 1;
    }
    // Absorb float noise so exact multiples are not pushed up by one.
    let frames = duration_ms / frame_period_ms;
    let rounded = frames.round();
    let whole = if (frames - rounded).abs() < 1e-9 {
        rounded
    } else {
        frames.ceil()
    };
    whole as usize + 1
}

/// Shows `visuals` (nothing = blank) for `duration_ms`. Returns the number of flips.
pub fn hold(
    display: &mut dyn Display,
    timer: &mut dyn Timer,
    policy: WaitPolicy,
    duration_ms: f64,
    visuals: &[Visual],
) -> Result<usize, ExperimentError> {
    match policy {
        WaitPolicy::FrameCounted => {
            let frames = frames_for(duration_ms, display.frame_period_ms());
            for _ in 0..frames {
                for visual in visuals {
                    display.draw(visual)?;
                }
                display.flip()?;
            }
            Ok(frames)
        }
        WaitPolicy::WallClock => {
            for visual in visuals {
                display.draw(visual)?;
            }
            display.flip()?;
            timer.sleep(Duration::from_secs_f64(duration_ms.max(0.0) / 1000.0));
            Ok(1)
        }
    }
}
