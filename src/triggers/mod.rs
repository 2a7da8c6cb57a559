pub mod pulse;

use std::time::Duration;

use crate::error::ExperimentError;

pub trait TriggerSender {
    /// Marks an event in the recording system's timeline with `code`, held for `duration`.
    fn send(&mut self, code: u8, duration: Duration) -> Result<(), ExperimentError>;
}

/// Used when triggers are switched off for a session.
#[derive(Debug, Default)]
pub struct NullTrigger;

impl TriggerSender for NullTrigger {
    fn send(&mut self, code: u8, duration: Duration) -> Result<(), ExperimentError> {
        log::debug!("Trigger {} ({:?}) not sent: triggers disabled", code, duration);
        Ok(())
    }
}
