#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use meg_task_toolkit::config::{parse_config, ExperimentConfig};
use meg_task_toolkit::error::ExperimentError;
use meg_task_toolkit::experiment::devices::{Display, Input, Timer, Visual};
use meg_task_toolkit::experiment::Trial;
use meg_task_toolkit::triggers::TriggerSender;

pub const CONFIG: &str = r#"
text:
  setup: "Setting up"
  instructions: "Press 1 or 2 to start"
  practice: "Practice round"
  end: "Thank you for taking part"
keys:
  setup_proceed: "s"
  instruction_proceed: ["1", "2"]
send_triggers:
  map:
    "1": 160
    "2": 161
    "3": 162
    "4": 163
timing:
  fixation_ON_ms: 300
  fixation_OFF_ms: 200
  prime_ON_ms: 500
  prime_OFF_ms: 300
blocks:
  count: 4
  trials_per_block: 6
experiment:
  name: "ColorGreen"
  seed: 42
  stimuli:
    full: "full.csv"
    practice: "practice.csv"
"#;

pub fn config() -> ExperimentConfig {
    parse_config(CONFIG).unwrap()
}

/// Everything the devices did, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Frame(Vec<Visual>),
    Trigger(u8),
    Key(String),
}

pub type Timeline = Rc<RefCell<Vec<Entry>>>;
pub type Clock = Rc<Cell<Duration>>;

pub struct FakeDisplay {
    pub period_ms: f64,
    pending: Vec<Visual>,
    timeline: Timeline,
    clock: Clock,
}

impl FakeDisplay {
    pub fn new(period_ms: f64, timeline: Timeline, clock: Clock) -> Self {
        Self {
            period_ms,
            pending: Vec::new(),
            timeline,
            clock,
        }
    }
}

impl Display for FakeDisplay {
    fn frame_period_ms(&self) -> f64 {
        self.period_ms
    }

    fn draw(&mut self, visual: &Visual) -> Result<(), ExperimentError> {
        self.pending.push(visual.clone());
        Ok(())
    }

    fn flip(&mut self) -> Result<(), ExperimentError> {
        let frame = std::mem::take(&mut self.pending);
        self.timeline.borrow_mut().push(Entry::Frame(frame));
        self.clock
            .set(self.clock.get() + Duration::from_secs_f64(self.period_ms / 1000.0));
        Ok(())
    }
}

/// Replays keys in order. `None` answers a bounded wait with a timeout; each entry may
/// carry the time it takes to arrive.
pub struct ScriptedInput {
    script: VecDeque<(Option<&'static str>, Duration)>,
    timeline: Timeline,
    clock: Clock,
}

impl ScriptedInput {
    pub fn new(keys: &[(Option<&'static str>, u64)], timeline: Timeline, clock: Clock) -> Self {
        Self {
            script: keys
                .iter()
                .map(|&(key, ms)| (key, Duration::from_millis(ms)))
                .collect(),
            timeline,
            clock,
        }
    }

    pub fn keys(keys: &[&'static str], timeline: Timeline, clock: Clock) -> Self {
        let script: Vec<(Option<&'static str>, u64)> = keys.iter().map(|&k| (Some(k), 0)).collect();
        Self::new(&script, timeline, clock)
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Input for ScriptedInput {
    fn wait_keys(
        &mut self,
        allowed: &[String],
        max_wait: Option<Duration>,
    ) -> Result<Option<String>, ExperimentError> {
        let (key, delay) = self
            .script
            .pop_front()
            .ok_or_else(|| ExperimentError::Input("script exhausted".into()))?;
        match key {
            None => {
                let wait = max_wait
                    .ok_or_else(|| ExperimentError::Input("timeout scripted for an unbounded wait".into()))?;
                self.clock.set(self.clock.get() + wait);
                Ok(None)
            }
            Some(key) => {
                if !allowed.iter().any(|k| k == key) {
                    return Err(ExperimentError::Input(format!(
                        "scripted key '{}' not in {:?}",
                        key, allowed
                    )));
                }
                self.clock.set(self.clock.get() + delay);
                self.timeline.borrow_mut().push(Entry::Key(key.to_string()));
                Ok(Some(key.to_string()))
            }
        }
    }
}

pub struct FakeTimer {
    clock: Clock,
}

impl FakeTimer {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }
}

impl Timer for FakeTimer {
    fn now(&self) -> Duration {
        self.clock.get()
    }

    fn sleep(&mut self, duration: Duration) {
        self.clock.set(self.clock.get() + duration);
    }
}

pub struct RecordingTrigger {
    timeline: Timeline,
}

impl RecordingTrigger {
    pub fn new(timeline: Timeline) -> Self {
        Self { timeline }
    }
}

impl TriggerSender for RecordingTrigger {
    fn send(&mut self, code: u8, _duration: Duration) -> Result<(), ExperimentError> {
        self.timeline.borrow_mut().push(Entry::Trigger(code));
        Ok(())
    }
}

pub fn trial(id: usize, condition: &str, match_manip: &str, block_id: usize) -> Trial {
    Trial {
        id,
        prime: format!("prime{}", id),
        target: format!("target{}", id),
        condition_label: condition.to_string(),
        match_manip: match_manip.to_string(),
        block_id,
        columns: vec![
            ("prime".to_string(), format!("prime{}", id)),
            ("target".to_string(), format!("target{}", id)),
            ("condition_label".to_string(), condition.to_string()),
            ("match_manip".to_string(), match_manip.to_string()),
        ],
    }
}

pub fn frames(timeline: &Timeline) -> Vec<Vec<Visual>> {
    timeline
        .borrow()
        .iter()
        .filter_map(|entry| match entry {
            Entry::Frame(frame) => Some(frame.clone()),
            _ => None,
        })
        .collect()
}

pub fn triggers(timeline: &Timeline) -> Vec<u8> {
    timeline
        .borrow()
        .iter()
        .filter_map(|entry| match entry {
            Entry::Trigger(code) => Some(*code),
            _ => None,
        })
        .collect()
}
