// src/processing/signal.rs

use std::path::Path;

use crate::error::ProcessingError;

/// A multichannel recording sampled at a constant rate. Sample indices in event lists
/// are absolute and include `first_samp`, the offset of the first stored sample.
#[derive(Debug, Clone)]
pub struct RawSignal {
    channel_names: Vec<String>,
    sfreq: f64,
    first_samp: i64,
    data: Vec<Vec<f64>>,
}

impl RawSignal {
    pub fn new(
        channel_names: Vec<String>,
        sfreq: f64,
        first_samp: i64,
        data: Vec<Vec<f64>>,
    ) -> Result<Self, ProcessingError> {
        if channel_names.len() != data.len() {
            return Err(ProcessingError::Malformed(format!(
                "{} channel names for {} channels",
                channel_names.len(),
                data.len()
            )));
        }
        if let Some(first) = data.first() {
            if data.iter().any(|channel| channel.len() != first.len()) {
                return Err(ProcessingError::Malformed(
                    "channels have different lengths".into(),
                ));
            }
        }
        if sfreq.is_nan() || sfreq <= 0.0 {
            return Err(ProcessingError::Malformed(format!(
                "sampling rate must be positive, got {}",
                sfreq
            )));
        }
        Ok(Self {
            channel_names,
            sfreq,
            first_samp,
            data,
        })
    }

    /// Reads a CSV export: a header row of channel names, then one row per sample.
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        sfreq: f64,
        first_samp: i64,
    ) -> Result<Self, ProcessingError> {
        let mut rdr = csv::Reader::from_path(path.as_ref())?;
        let channel_names: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut data: Vec<Vec<f64>> = vec![Vec::new(); channel_names.len()];

        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            for (channel, value) in record.iter().enumerate() {
                let sample = value.trim().parse::<f64>().map_err(|e| {
                    ProcessingError::Malformed(format!(
                        "row {}, channel {}: {} ({})",
                        row + 1,
                        channel_names[channel],
                        value,
                        e
                    ))
                })?;
                data[channel].push(sample);
            }
        }

        log::info!(
            "Read {} channels x {} samples from {}",
            channel_names.len(),
            data.first().map_or(0, Vec::len),
            path.as_ref().display()
        );
        Self::new(channel_names, sfreq, first_samp, data)
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn first_samp(&self) -> i64 {
        self.first_samp
    }

    pub fn n_samples(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    pub fn channel(&self, name: &str) -> Result<&[f64], ProcessingError> {
        self.channel_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.data[i].as_slice())
            .ok_or_else(|| ProcessingError::MissingChannel {
                name: name.to_string(),
                available: self.channel_names.clone(),
            })
    }
}
