use image::GrayImage;

/// Outcome of fitting a global motion model between two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEstimate {
    pub score: f64,
    pub inliers: usize,
    pub outliers: usize,
}

/// Frame-pair motion scorer.
///
/// Implementations keep whatever they need from the previous frame between
/// calls; every frame after the first is scored against its predecessor only.
pub trait MotionEstimator: Send {
    /// Start a sequence with its first frame. Returns the number of features
    /// found on it.
    fn prime(&mut self, frame: &GrayImage) -> usize;

    /// Score `frame` against the previous one. `None` when no reliable model
    /// could be fitted.
    fn advance(&mut self, frame: &GrayImage) -> Option<MotionEstimate>;

    /// Whether scores from this estimator carry camera/object classification.
    fn classifies_movement(&self) -> bool {
        false
    }

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}
