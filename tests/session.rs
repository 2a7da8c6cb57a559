mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use common::*;
use meg_task_toolkit::config::{ExperimentType, SessionSettings};
use meg_task_toolkit::error::ExperimentError;
use meg_task_toolkit::experiment::devices::Visual;
use meg_task_toolkit::experiment::presenter::{Devices, Presenter};
use meg_task_toolkit::experiment::session::{run_session, SessionOutcome};
use meg_task_toolkit::experiment::stimuli::assign_blocks;
use meg_task_toolkit::experiment::{Trial, SAME};
use meg_task_toolkit::utils::log::TrialLogger;

fn stimulus_table(n: usize) -> Vec<Trial> {
    (0..n)
        .map(|i| {
            let condition = ((i % 4) + 1).to_string();
            let match_manip = if i % 2 == 0 { SAME } else { "DIFF" };
            trial(i, &condition, match_manip, 0)
        })
        .collect()
}

fn log_rows(path: &std::path::Path) -> Vec<csv::StringRecord> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    rdr.records().map(|r| r.unwrap()).collect()
}

#[test]
fn auto_session_runs_every_block() {
    let config = config();
    let settings = SessionSettings {
        participant: "P01".into(),
        auto_respond: true,
        ..SessionSettings::default()
    };
    let mut rng = StdRng::seed_from_u64(42);
    let trials = assign_blocks(stimulus_table(24), 6, &mut rng);

    let dir = tempfile::tempdir().unwrap();
    let logger = TrialLogger::create(dir.path(), "P01", "ColorGreen").unwrap();
    let log_path = logger.path().to_path_buf();

    let timeline: Timeline = Rc::new(RefCell::new(Vec::new()));
    let clock: Clock = Rc::new(Cell::new(Duration::ZERO));
    let mut display = FakeDisplay::new(16.67, timeline.clone(), clock.clone());
    // setup, instructions, three block ends, extended pause, last block end, closing
    let mut input = ScriptedInput::keys(&["s", "1", "s", "s", "s", "s", "s", "s"], timeline.clone(), clock.clone());
    let mut timer = FakeTimer::new(clock.clone());
    let mut trigger = RecordingTrigger::new(timeline.clone());

    let summary = {
        let devices = Devices {
            display: &mut display,
            input: &mut input,
            timer: &mut timer,
            trigger: &mut trigger,
        };
        let mut presenter = Presenter::new(&config, &settings, devices, rng);
        run_session(&config, &settings, &trials, &mut presenter, Some(logger)).unwrap()
    };

    assert_eq!(summary.outcome, SessionOutcome::Completed);
    assert_eq!(summary.trials_completed, 24);
    assert_eq!(input.remaining(), 0);
    let expected = summary.total_correct as f64 / 24.0 * 100.0;
    assert!((summary.accuracy_percent - expected).abs() < 1e-9);

    let expected_codes: Vec<u8> = trials
        .iter()
        .map(|t| config.trigger_code(&t.condition_label).unwrap())
        .collect();
    assert_eq!(triggers(&timeline), expected_codes);

    let extended = Visual::Instructions(config.text.extended_pause.replace("{block}", "4"));
    assert!(frames(&timeline).iter().any(|f| f.contains(&extended)));

    let rows = log_rows(&log_path);
    assert_eq!(rows.len(), 24);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(&row[0], "P01");
        assert_eq!(row[1].parse::<usize>().unwrap(), i);
        assert_eq!(&row[row.len() - 1], (i / 6).to_string().as_str());
    }
}

#[test]
fn quitting_at_block_end_stops_the_session() {
    let config = config();
    let settings = SessionSettings {
        auto_respond: true,
        verbose: false,
        ..SessionSettings::default()
    };
    let mut rng = StdRng::seed_from_u64(7);
    let trials = assign_blocks(stimulus_table(24), 6, &mut rng);

    let timeline: Timeline = Rc::new(RefCell::new(Vec::new()));
    let clock: Clock = Rc::new(Cell::new(Duration::ZERO));
    let mut display = FakeDisplay::new(16.67, timeline.clone(), clock.clone());
    let mut input = ScriptedInput::keys(&["s", "1", "q", "s"], timeline.clone(), clock.clone());
    let mut timer = FakeTimer::new(clock.clone());
    let mut trigger = RecordingTrigger::new(timeline.clone());

    let summary = {
        let devices = Devices {
            display: &mut display,
            input: &mut input,
            timer: &mut timer,
            trigger: &mut trigger,
        };
        let mut presenter = Presenter::new(&config, &settings, devices, rng);
        run_session(&config, &settings, &trials, &mut presenter, None).unwrap()
    };

    assert_eq!(summary.outcome, SessionOutcome::Quit);
    assert_eq!(summary.trials_completed, 6);
    assert_eq!(triggers(&timeline).len(), 6);
    assert_eq!(input.remaining(), 0);

    let closing = Visual::Instructions(config.text.end.clone());
    let shown = frames(&timeline)
        .iter()
        .filter(|f| f.contains(&closing))
        .count();
    assert_eq!(shown, 1);
}

#[test]
fn practice_session_scores_manual_answers() {
    let config = config();
    let settings = SessionSettings {
        experiment_type: ExperimentType::Practice,
        verbose: false,
        ..SessionSettings::default()
    };
    let trials = stimulus_table(6);

    let timeline: Timeline = Rc::new(RefCell::new(Vec::new()));
    let clock: Clock = Rc::new(Cell::new(Duration::ZERO));
    let mut display = FakeDisplay::new(16.67, timeline.clone(), clock.clone());
    let mut input = ScriptedInput::keys(
        &["s", "1", "2", "2", "2", "2", "2", "2", "s", "s"],
        timeline.clone(),
        clock.clone(),
    );
    let mut timer = FakeTimer::new(clock.clone());
    let mut trigger = RecordingTrigger::new(timeline.clone());

    let summary = {
        let devices = Devices {
            display: &mut display,
            input: &mut input,
            timer: &mut timer,
            trigger: &mut trigger,
        };
        let mut presenter = Presenter::new(&config, &settings, devices, StdRng::seed_from_u64(1));
        run_session(&config, &settings, &trials, &mut presenter, None).unwrap()
    };

    assert_eq!(summary.outcome, SessionOutcome::Completed);
    assert_eq!(summary.trials_completed, 6);
    // Only the match trials were answered with the match key.
    assert_eq!(summary.total_correct, 3);
    assert!((summary.accuracy_percent - 50.0).abs() < 1e-9);

    let practice = Visual::Instructions(config.text.practice.clone());
    assert!(frames(&timeline).iter().any(|f| f.contains(&practice)));
}

#[test]
fn failing_trial_aborts_but_keeps_logged_rows() {
    let config = config();
    let settings = SessionSettings {
        participant: "P02".into(),
        auto_respond: true,
        verbose: false,
        ..SessionSettings::default()
    };
    let mut trials = stimulus_table(12);
    for (i, t) in trials.iter_mut().enumerate() {
        t.block_id = i / 6;
    }
    trials[6].condition_label = "9".into();

    let dir = tempfile::tempdir().unwrap();
    let logger = TrialLogger::create(dir.path(), "P02", "ColorGreen").unwrap();
    let log_path = logger.path().to_path_buf();

    let timeline: Timeline = Rc::new(RefCell::new(Vec::new()));
    let clock: Clock = Rc::new(Cell::new(Duration::ZERO));
    let mut display = FakeDisplay::new(16.67, timeline.clone(), clock.clone());
    let mut input = ScriptedInput::keys(&["s", "1", "s"], timeline.clone(), clock.clone());
    let mut timer = FakeTimer::new(clock.clone());
    let mut trigger = RecordingTrigger::new(timeline.clone());

    let result = {
        let devices = Devices {
            display: &mut display,
            input: &mut input,
            timer: &mut timer,
            trigger: &mut trigger,
        };
        let mut presenter = Presenter::new(&config, &settings, devices, StdRng::seed_from_u64(1));
        run_session(&config, &settings, &trials, &mut presenter, Some(logger))
    };

    assert!(matches!(result, Err(ExperimentError::UnknownCondition(ref label)) if label == "9"));
    assert_eq!(triggers(&timeline).len(), 6);
    assert_eq!(log_rows(&log_path).len(), 6);
}
