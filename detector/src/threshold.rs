use serde::Serialize;
use tracing::info;

/// Where a run's flagging threshold came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdSource {
    Fixed,
    Adaptive { mean: f64, stddev: f64 },
    /// No explicit threshold and no finite score to adapt to.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Threshold {
    pub value: f64,
    pub source: ThresholdSource,
}

/// Explicit threshold if given, otherwise mean + k * stddev (population) of the
/// finite scores, otherwise `fallback`.
pub fn resolve_threshold(scores: &[f64], explicit: Option<f64>, k: f64, fallback: f64) -> Threshold {
    if let Some(value) = explicit {
        return Threshold {
            value,
            source: ThresholdSource::Fixed,
        };
    }

    let finite: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    if finite.is_empty() {
        return Threshold {
            value: fallback,
            source: ThresholdSource::Fallback,
        };
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let stddev = (finite.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
    let value = mean + k * stddev;
    info!(threshold = value, mean, stddev, "Adaptive threshold");
    Threshold {
        value,
        source: ThresholdSource::Adaptive { mean, stddev },
    }
}

/// A frame is flagged when its score is undefined or above the threshold.
pub fn is_flagged(score: f64, threshold: f64) -> bool {
    !score.is_finite() || score > threshold
}
