pub mod threshold;

// DETECTOR COMPONENT ----------------------------------------------------------
pub trait DetectorInstance {
    fn id(&self) -> &str;

    /// Offset of the first detection within `window`, if any.
    fn detect(&self, window: &[f64]) -> Option<DetectionResult>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    pub offset: usize,
    pub value: f64,
}
