// src/experiment/devices.rs
//
// Collaborators the presentation loop drives: a display with a refresh cycle, a key
// source and a clock. The terminal implementations run a session without a window.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ExperimentError;

#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Fixation,
    /// Stimulus or probe text.
    Text(String),
    Instructions(String),
    /// Swatch in the corner of the screen read by the photodiode.
    PhotodiodeMarker,
}

pub trait Display {
    fn frame_period_ms(&self) -> f64;

    /// Queues a visual for the next flip.
    fn draw(&mut self, visual: &Visual) -> Result<(), ExperimentError>;

    /// Shows everything drawn since the last flip and returns on the next refresh.
    /// A flip with nothing drawn blanks the screen.
    fn flip(&mut self) -> Result<(), ExperimentError>;
}

pub trait Input {
    /// Blocks until one of `allowed` is pressed, or `max_wait` passes (`None`).
    fn wait_keys(
        &mut self,
        allowed: &[String],
        max_wait: Option<Duration>,
    ) -> Result<Option<String>, ExperimentError>;
}

pub trait Timer {
    /// Monotonic time since the timer was created.
    fn now(&self) -> Duration;
    fn sleep(&mut self, duration: Duration);
}

pub struct SystemTimer {
    start: Instant,
}

impl SystemTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for SystemTimer {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

// CONSOLE DISPLAY -------------------------------------------------------------

pub struct ConsoleDisplay {
    frame_period_ms: f64,
    fullscreen: bool,
    pending: Vec<Visual>,
    shown: Vec<Visual>,
    last_flip: Option<Instant>,
}

impl ConsoleDisplay {
    pub fn new(refresh_rate_hz: f64) -> Self {
        Self {
            frame_period_ms: 1000.0 / refresh_rate_hz,
            fullscreen: false,
            pending: Vec::new(),
            shown: Vec::new(),
            last_flip: None,
        }
    }

    /// Clears the terminal before each new screen.
    pub fn fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    fn render(&self, visuals: &[Visual]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        if self.fullscreen {
            write!(out, "\x1B[2J\x1B[H")?;
        }
        if visuals.is_empty() {
            writeln!(out, "{}", "·".dimmed())?;
        }
        for visual in visuals {
            match visual {
                Visual::Fixation => writeln!(out, "{}", "+".bold())?,
                Visual::Text(text) => writeln!(out, "{}", text.bold().white())?,
                Visual::Instructions(text) => writeln!(out, "{}", text.cyan())?,
                Visual::PhotodiodeMarker => writeln!(out, "{}", "■".white())?,
            }
        }
        out.flush()
    }
}

impl Display for ConsoleDisplay {
    fn frame_period_ms(&self) -> f64 {
        self.frame_period_ms
    }

    fn draw(&mut self, visual: &Visual) -> Result<(), ExperimentError> {
        self.pending.push(visual.clone());
        Ok(())
    }

    fn flip(&mut self) -> Result<(), ExperimentError> {
        // Pace flips to the nominal refresh rate.
        let period = Duration::from_secs_f64(self.frame_period_ms / 1000.0);
        if let Some(last) = self.last_flip {
            let elapsed = last.elapsed();
            if elapsed < period {
                thread::sleep(period - elapsed);
            }
        }
        self.last_flip = Some(Instant::now());

        let frame = std::mem::take(&mut self.pending);
        if frame != self.shown {
            self.render(&frame).map_err(|e| ExperimentError::Display(e.to_string()))?;
            self.shown = frame;
        }
        Ok(())
    }
}

// STDIN INPUT -----------------------------------------------------------------

/// Reads one key per line from stdin on a background thread so bounded waits can
/// time out.
pub struct StdinInput {
    lines: Receiver<String>,
}

impl StdinInput {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line.trim().to_string()).is_err() {
                    break;
                }
            }
        });
        Self { lines: rx }
    }
}

impl Input for StdinInput {
    fn wait_keys(
        &mut self,
        allowed: &[String],
        max_wait: Option<Duration>,
    ) -> Result<Option<String>, ExperimentError> {
        let deadline = max_wait.map(|wait| Instant::now() + wait);
        loop {
            let key = match deadline {
                None => self
                    .lines
                    .recv()
                    .map_err(|_| ExperimentError::Input("stdin closed".into()))?,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.lines.recv_timeout(remaining) {
                        Ok(key) => key,
                        Err(RecvTimeoutError::Timeout) => return Ok(None),
                        Err(RecvTimeoutError::Disconnected) => {
                            return Err(ExperimentError::Input("stdin closed".into()))
                        }
                    }
                }
            };
            if allowed.iter().any(|k| *k == key) {
                return Ok(Some(key));
            }
            log::debug!("Ignoring key '{}', expected one of {:?}", key, allowed);
        }
    }
}
