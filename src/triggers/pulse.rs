use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use super::TriggerSender;
use crate::error::ExperimentError;

/// Parallel-port style pulse: the code is written to the device, held, then the line
/// is reset to zero.
pub struct PulseTrigger<W: Write> {
    device: W,
}

impl PulseTrigger<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExperimentError> {
        let device = OpenOptions::new()
            .write(true)
            .open(path.as_ref())
            .map_err(ExperimentError::Trigger)?;
        log::info!("Opened trigger device {}", path.as_ref().display());
        Ok(Self::new(device))
    }
}

impl<W: Write> PulseTrigger<W> {
    pub fn new(device: W) -> Self {
        Self { device }
    }

    pub fn into_inner(self) -> W {
        self.device
    }

    fn write_level(&mut self, level: u8) -> Result<(), ExperimentError> {
        self.device
            .write_all(&[level])
            .and_then(|_| self.device.flush())
            .map_err(ExperimentError::Trigger)
    }
}

impl<W: Write> TriggerSender for PulseTrigger<W> {
    fn send(&mut self, code: u8, duration: Duration) -> Result<(), ExperimentError> {
        self.write_level(code)?;
        std::thread::sleep(duration);
        self.write_level(0)?;
        log::debug!("Sent trigger {} for {:?}", code, duration);
        Ok(())
    }
}
