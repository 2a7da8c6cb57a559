use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;

use super::Trial;
use crate::error::ExperimentError;

const REQUIRED_COLUMNS: [&str; 4] = ["prime", "target", "condition_label", "match_manip"];

pub fn load_stimuli<P: AsRef<Path>>(path: P) -> Result<Vec<Trial>, ExperimentError> {
    let path = path.as_ref();
    let stimuli_error = |reason: String| ExperimentError::Stimuli {
        path: path.to_path_buf(),
        reason,
    };

    let mut rdr = csv::Reader::from_path(path).map_err(|e| stimuli_error(e.to_string()))?;
    let headers = rdr
        .headers()
        .map_err(|e| stimuli_error(e.to_string()))?
        .clone();

    let mut positions = [0usize; 4];
    for (slot, column) in positions.iter_mut().zip(REQUIRED_COLUMNS.iter()) {
        *slot = headers
            .iter()
            .position(|h| h.trim() == *column)
            .ok_or_else(|| stimuli_error(format!("missing column '{}'", column)))?;
    }

    let mut trials = Vec::new();
    for (id, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| stimuli_error(e.to_string()))?;
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();

        trials.push(Trial {
            id,
            prime: field(positions[0]),
            target: field(positions[1]),
            condition_label: field(positions[2]),
            match_manip: field(positions[3]),
            block_id: 0,
            columns: headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.trim().to_string(), v.to_string()))
                .collect(),
        });
    }

    log::info!("Loaded {} trials from {}", trials.len(), path.display());
    Ok(trials)
}

/// Shuffles the whole trial set, then cuts it into consecutive blocks of
/// `trials_per_block`. The returned order is the presentation order.
pub fn assign_blocks<R: Rng + ?Sized>(
    mut trials: Vec<Trial>,
    trials_per_block: usize,
    rng: &mut R,
) -> Vec<Trial> {
    assert!(trials_per_block > 0, "trials_per_block must be positive");
    trials.shuffle(rng);
    for (position, trial) in trials.iter_mut().enumerate() {
        trial.block_id = position / trials_per_block;
    }
    trials
}

pub fn block_count(n_trials: usize, trials_per_block: usize) -> usize {
    (n_trials + trials_per_block - 1) / trials_per_block
}

pub fn trials_in_block(trials: &[Trial], block_id: usize) -> Vec<&Trial> {
    trials.iter().filter(|t| t.block_id == block_id).collect()
}
