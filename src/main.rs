use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::path::PathBuf;

use meg_task_toolkit::config::{load_config, ExperimentType, SessionSettings};
use meg_task_toolkit::experiment::devices::{ConsoleDisplay, StdinInput, SystemTimer};
use meg_task_toolkit::experiment::presenter::{Devices, Presenter};
use meg_task_toolkit::experiment::session::run_session;
use meg_task_toolkit::experiment::stimuli::{assign_blocks, load_stimuli};
use meg_task_toolkit::processing::events::{find_events, read_events, write_events};
use meg_task_toolkit::processing::photodiode::{PhotodiodeConfig, PhotodiodeCorrector};
use meg_task_toolkit::processing::signal::RawSignal;
use meg_task_toolkit::triggers::pulse::PulseTrigger;
use meg_task_toolkit::triggers::{NullTrigger, TriggerSender};
use meg_task_toolkit::utils::log::{init_logging, TrialLogger};
use meg_task_toolkit::visualization::plotter::DiagnosticPlotter;
use meg_task_toolkit::visualization::PlotConfig;

#[derive(Parser)]
#[command(name = "main", about = "Behavioural task runner and photodiode onset correction")]
struct Cli {
    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the trial presentation task.
    Run(RunArgs),
    /// Shift events onto the photodiode onset.
    Correct(CorrectArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: PathBuf,
    /// Participant id; without one no trial log is written.
    #[arg(long, default_value = "")]
    participant: String,
    #[arg(long)]
    practice: bool,
    /// Directory holding the stimulus tables. Defaults to `stimuli/` next to the config.
    #[arg(long)]
    stimuli_dir: Option<PathBuf>,
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
    #[arg(long)]
    fullscreen: bool,
    #[arg(long)]
    no_diode: bool,
    #[arg(long)]
    no_triggers: bool,
    /// Byte device the trigger pulses are written to (e.g. /dev/parport0).
    #[arg(long)]
    trigger_device: Option<PathBuf>,
    #[arg(long)]
    auto_respond: bool,
    #[arg(long, default_value_t = 60.0)]
    refresh_rate: f64,
    /// Suppress the per-trial console summary.
    #[arg(long)]
    quiet: bool,
}

#[derive(Args)]
struct CorrectArgs {
    /// CSV export of the raw recording, one column per channel.
    #[arg(long)]
    raw: PathBuf,
    #[arg(long)]
    sfreq: f64,
    #[arg(long, default_value_t = 0)]
    first_samp: i64,
    #[arg(long, default_value = "STI 014")]
    stim_channel: String,
    #[arg(long, default_value = "MISC 021")]
    channel: String,
    #[arg(long, default_value_t = 0.002)]
    min_duration: f64,
    /// Coarse events CSV; found on the stim channel when omitted.
    #[arg(long)]
    events: Option<PathBuf>,
    /// Where the corrected events are written.
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value = "subject")]
    subject: String,
    /// Root directory for diagnostic plots; no plots when omitted.
    #[arg(long)]
    plots: Option<PathBuf>,
    #[arg(long, default_value_t = 10)]
    max_plots: usize,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Run(args) => run_experiment(args, cli.verbose),
        Command::Correct(args) => run_correction(args),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run_experiment(args: RunArgs, verbose: bool) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.config)?;

    let settings = SessionSettings {
        participant: args.participant.clone(),
        experiment_type: if args.practice {
            ExperimentType::Practice
        } else {
            ExperimentType::Full
        },
        fullscreen: args.fullscreen,
        photodiode: !args.no_diode,
        send_triggers: !args.no_triggers,
        auto_respond: args.auto_respond,
        verbose: verbose || !args.quiet,
    };

    let stimuli_dir = args.stimuli_dir.clone().unwrap_or_else(|| {
        args.config
            .parent()
            .map(|dir| dir.join("stimuli"))
            .unwrap_or_else(|| PathBuf::from("stimuli"))
    });
    let trials = load_stimuli(config.stimuli_path(&stimuli_dir, settings.experiment_type))?;

    let mut rng = match config.experiment.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let (_, trials_per_block) = config.block_layout(settings.experiment_type);
    let trials = assign_blocks(trials, trials_per_block, &mut rng);

    let logger = if settings.participant.is_empty() {
        log::warn!("No participant id given; trials will not be logged");
        None
    } else {
        Some(TrialLogger::create(
            &args.log_dir,
            &settings.participant,
            &config.experiment.name,
        )?)
    };

    let mut trigger: Box<dyn TriggerSender> = match (&args.trigger_device, settings.send_triggers) {
        (Some(path), true) => Box::new(PulseTrigger::open(path)?),
        (None, true) => {
            log::warn!("No trigger device given; trigger codes are only logged");
            Box::new(NullTrigger)
        }
        (_, false) => Box::new(NullTrigger),
    };
    let mut display = ConsoleDisplay::new(args.refresh_rate).fullscreen(settings.fullscreen);
    let mut input = StdinInput::spawn();
    let mut timer = SystemTimer::new();

    let devices = Devices {
        display: &mut display,
        input: &mut input,
        timer: &mut timer,
        trigger: trigger.as_mut(),
    };
    let mut presenter = Presenter::new(&config, &settings, devices, rng);

    let summary = run_session(&config, &settings, &trials, &mut presenter, logger)?;
    println!(
        "{} {:?}: {} trials, {} correct ({:.2}%), {:.1} min",
        "Session".bold(),
        summary.outcome,
        summary.trials_completed,
        summary.total_correct,
        summary.accuracy_percent,
        summary.elapsed.as_secs_f64() / 60.0
    );
    Ok(())
}

fn run_correction(args: CorrectArgs) -> Result<(), Box<dyn Error>> {
    let raw = RawSignal::from_csv(&args.raw, args.sfreq, args.first_samp)?;
    log::info!(
        "Recording: {} samples at {} Hz from sample {}",
        raw.n_samples(),
        raw.sfreq(),
        raw.first_samp()
    );

    let events = match &args.events {
        Some(path) => read_events(path)?,
        None => find_events(&raw, &args.stim_channel, args.min_duration)?,
    };

    let config = PhotodiodeConfig {
        channel: args.channel.clone(),
        ..PhotodiodeConfig::default()
    };
    let mut corrector = PhotodiodeCorrector::new(config);
    if let Some(root) = &args.plots {
        let plot_config = PlotConfig {
            max_plots: args.max_plots,
            ..PlotConfig::default()
        };
        corrector = corrector.with_plotter(DiagnosticPlotter::for_subject(root, &args.subject, plot_config));
    }

    let report = corrector.correct(&raw, &events)?;
    report.print_summary();

    write_events(&args.out, &report.events)?;
    log::info!("Wrote {} corrected events to {}", report.events.len(), args.out.display());
    Ok(())
}
