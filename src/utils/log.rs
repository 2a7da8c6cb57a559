use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::ExperimentError;
use crate::experiment::TrialRecord;

/// Initialises the `log` backend once. `RUST_LOG` overrides the default level.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}

const FIXED_COLUMNS: [&str; 7] = [
    "Participant",
    "Trial_num",
    "Answer",
    "Correct",
    "RT",
    "Jitter",
    "Timestamp",
];

/// Append-only trial log, one CSV per participant. Each row is flushed as soon as it
/// is written, so a crash loses at most the trial in progress.
pub struct TrialLogger {
    writer: csv::Writer<File>,
    path: PathBuf,
    needs_header: bool,
}

impl TrialLogger {
    /// Opens `<log_dir>/<participant>/<participant>_<experiment>_logfile.csv`, creating
    /// directories as needed.
    pub fn create<P: AsRef<Path>>(
        log_dir: P,
        participant: &str,
        experiment: &str,
    ) -> Result<Self, ExperimentError> {
        let dir = log_dir.as_ref().join(participant);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = dir.join(format!("{}_{}_logfile.csv", participant, experiment));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExperimentError> {
        let path = path.as_ref().to_path_buf();
        let needs_header = !path.exists() || fs::metadata(&path)?.len() == 0;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        log::info!("Logging trials to {}", path.display());
        Ok(Self {
            writer,
            path,
            needs_header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &TrialRecord) -> Result<(), ExperimentError> {
        if self.needs_header {
            let mut header: Vec<&str> = FIXED_COLUMNS.to_vec();
            header.extend(record.trial.columns.iter().map(|(name, _)| name.as_str()));
            header.push("blockID");
            self.writer.write_record(&header)?;
            self.needs_header = false;
        }

        let mut row = vec![
            record.participant.clone(),
            record.trial_num.to_string(),
            record.answer.clone(),
            record.correct.to_string(),
            format!("{:.6}", record.reaction_time_s),
            format!("{:.6}", record.jitter_s),
            record.timestamp.to_rfc3339(),
        ];
        row.extend(record.trial.columns.iter().map(|(_, value)| value.clone()));
        row.push(record.trial.block_id.to_string());

        self.writer.write_record(&row)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::tests::trial;
    use crate::experiment::{Response, TrialOutcome};
    use std::time::Duration;

    fn record(trial_num: usize) -> TrialRecord {
        let outcome = TrialOutcome {
            response: Response {
                answer: "2".into(),
                reaction_time: Duration::from_millis(640),
            },
            correct: true,
            jitter_ms: 700.0,
        };
        TrialRecord::new("P01", trial_num, &trial(trial_num, "green", "SAME"), &outcome)
    }

    #[test]
    fn writes_header_once_and_flushes_each_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = TrialLogger::create(dir.path(), "P01", "ColorGreen").unwrap();
        logger.append(&record(0)).unwrap();

        let path = logger.path().to_path_buf();
        assert!(path.ends_with("P01/P01_ColorGreen_logfile.csv"));
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);

        logger.append(&record(1)).unwrap();
        drop(logger);

        let mut reopened = TrialLogger::open(&path).unwrap();
        reopened.append(&record(2)).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[0], "Participant");
        assert_eq!(&headers[5], "Jitter");
        assert_eq!(&headers[headers.len() - 1], "blockID");
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[2][1], "2");
        assert_eq!(&rows[0][3], "true");
        assert_eq!(&rows[0][4], "0.640000");
        assert_eq!(&rows[0][5], "0.700000");
        assert_eq!(&rows[0][7], "prime0");
    }
}
