// src/processing/statistics.rs

/// Mean and population standard deviation of a stretch of samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Statistics {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Statistics {
    /// Two passes over the slice: the mean, then the mean squared deviation. An empty
    /// slice gives all zeros.
    pub fn from_slice(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let count = samples.len();
        let mean = samples.iter().sum::<f64>() / count as f64;
        let variance = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / count as f64;
        Self {
            count,
            mean,
            std_dev: variance.sqrt(),
        }
    }
}
