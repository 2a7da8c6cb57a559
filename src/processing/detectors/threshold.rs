use super::{DetectionResult, DetectorInstance};
use crate::processing::statistics::Statistics;

pub struct ThresholdDetectorConfig {
    pub id: String,
    /// Threshold sits this many baseline standard deviations above the baseline mean.
    pub std_multiplier: f64,
}

/// Fires on the first sample strictly above `mean + multiplier * sd` of a baseline.
pub struct ThresholdDetector {
    config: ThresholdDetectorConfig,
    threshold: f64,
}

impl ThresholdDetector {
    pub fn from_baseline(config: ThresholdDetectorConfig, baseline: &[f64]) -> Self {
        let baseline = Statistics::from_slice(baseline);
        let threshold = baseline.mean + config.std_multiplier * baseline.std_dev;
        Self { config, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl DetectorInstance for ThresholdDetector {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn detect(&self, window: &[f64]) -> Option<DetectionResult> {
        window
            .iter()
            .position(|&value| value > self.threshold)
            .map(|offset| DetectionResult {
                offset,
                value: window[offset],
            })
    }
}
