// src/processing/events.rs

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::signal::RawSignal;
use crate::error::ProcessingError;

/// Stimulus-onset marker: absolute sample index, stim value before the step, and code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub sample: i64,
    pub previous: i32,
    pub code: i32,
}

/// Default shortest pulse accepted on the stim channel, in seconds.
pub const DEFAULT_MIN_DURATION_S: f64 = 0.002;

/// Finds stimulus onsets on a digital trigger channel. An onset is a step to a non-zero
/// value from zero or from a lower value; pulses that hold for fewer than
/// `ceil(min_duration_s * sfreq)` samples are dropped.
pub fn find_events(
    raw: &RawSignal,
    stim_channel: &str,
    min_duration_s: f64,
) -> Result<Vec<Event>, ProcessingError> {
    let stim = raw.channel(stim_channel)?;
    let min_samples = ((min_duration_s * raw.sfreq()).ceil() as usize).max(1);

    let levels: Vec<i32> = stim.iter().map(|&v| v.round() as i32).collect();
    let mut events = Vec::new();
    let mut discarded = 0;

    let mut i = 0;
    while i < levels.len() {
        let value = levels[i];
        let previous = if i == 0 { 0 } else { levels[i - 1] };
        if value != previous && value != 0 && (previous == 0 || value > previous) {
            let duration = levels[i..].iter().take_while(|&&v| v == value).count();
            if duration >= min_samples {
                events.push(Event {
                    sample: raw.first_samp() + i as i64,
                    previous,
                    code: value,
                });
            } else {
                discarded += 1;
            }
            i += duration;
            continue;
        }
        i += 1;
    }

    log::info!(
        "{} events found on {} ({} pulses shorter than {} samples dropped)",
        events.len(),
        stim_channel,
        discarded,
        min_samples
    );
    Ok(events)
}

pub fn write_events<P: AsRef<Path>>(path: P, events: &[Event]) -> Result<(), ProcessingError> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    for event in events {
        wtr.serialize(event)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<Event>, ProcessingError> {
    let mut rdr = csv::Reader::from_path(path.as_ref())?;
    let events = rdr
        .deserialize()
        .collect::<Result<Vec<Event>, csv::Error>>()?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stim_raw(stim: Vec<f64>, first_samp: i64) -> RawSignal {
        RawSignal::new(vec!["STI 014".into()], 1000.0, first_samp, vec![stim]).unwrap()
    }

    #[test]
    fn finds_onsets_with_codes() {
        let mut stim = vec![0.0; 100];
        stim[10..20].iter_mut().for_each(|v| *v = 160.0);
        stim[50..60].iter_mut().for_each(|v| *v = 161.0);
        let events = find_events(&stim_raw(stim, 1000), "STI 014", 0.002).unwrap();
        assert_eq!(
            events,
            vec![
                Event { sample: 1010, previous: 0, code: 160 },
                Event { sample: 1050, previous: 0, code: 161 },
            ]
        );
    }

    #[test]
    fn drops_short_pulses() {
        let mut stim = vec![0.0; 40];
        stim[5] = 3.0;
        stim[20..25].iter_mut().for_each(|v| *v = 4.0);
        let events = find_events(&stim_raw(stim, 0), "STI 014", 0.002).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sample, 20);
    }

    #[test]
    fn increasing_steps_count_decreasing_do_not() {
        let mut stim = vec![0.0; 30];
        stim[5..10].iter_mut().for_each(|v| *v = 2.0);
        stim[10..15].iter_mut().for_each(|v| *v = 6.0);
        stim[15..20].iter_mut().for_each(|v| *v = 1.0);
        let events = find_events(&stim_raw(stim, 0), "STI 014", 0.002).unwrap();
        let codes: Vec<(i64, i32, i32)> = events.iter().map(|e| (e.sample, e.previous, e.code)).collect();
        assert_eq!(codes, vec![(5, 0, 2), (10, 2, 6)]);
    }

    #[test]
    fn events_persist_as_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        let events = vec![
            Event { sample: 1234, previous: 0, code: 165 },
            Event { sample: 2234, previous: 0, code: 166 },
        ];
        write_events(&path, &events).unwrap();
        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("sample,previous,code"));
        assert_eq!(read_events(&path).unwrap(), events);
    }

    #[test]
    fn missing_stim_channel_is_fatal() {
        let raw = stim_raw(vec![0.0; 10], 0);
        assert!(matches!(
            find_events(&raw, "STI 101", 0.002),
            Err(ProcessingError::MissingChannel { .. })
        ));
    }
}
