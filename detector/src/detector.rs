//! Scores every frame of a sequence against its predecessor and flags the
//! frames whose motion is undefined or exceeds the run's threshold.

use std::fmt;
use std::str::FromStr;

use camera_motion_common::config::DetectorConfig;
use camera_motion_common::frame::{FrameId, FrameSequence};
use serde::Serialize;
use tracing::{debug, info};

use crate::stats::{classify_movement, inlier_ratio, FrameStats, MovementType};
use crate::strategy::{KeypointEstimator, KeypointModel, MotionEstimator, SparseFlowEstimator};
use crate::threshold::{is_flagged, resolve_threshold, ThresholdSource};

/// Threshold used when none is given and no frame produced a finite score.
/// Frame 0 always scores a finite 0, so every strategy only reaches this on
/// an empty sequence.
pub const FALLBACK_THRESHOLD: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Algorithm {
    OpticalFlow,
    #[serde(rename = "ORB")]
    Orb,
    Homography,
}

impl Algorithm {
    pub fn estimator(self, config: &DetectorConfig) -> Box<dyn MotionEstimator> {
        match self {
            Algorithm::OpticalFlow => Box::new(SparseFlowEstimator::new(config)),
            Algorithm::Orb => Box::new(KeypointEstimator::new(config, KeypointModel::Affine)),
            Algorithm::Homography => Box::new(KeypointEstimator::new(config, KeypointModel::Homography)),
        }
    }
}

impl FromStr for Algorithm {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "opticalflow" | "optical_flow" | "flow" => Ok(Algorithm::OpticalFlow),
            "orb" => Ok(Algorithm::Orb),
            "homography" => Ok(Algorithm::Homography),
            _ => Err(DetectError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Algorithm::OpticalFlow => "OpticalFlow",
            Algorithm::Orb => "ORB",
            Algorithm::Homography => "Homography",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedFrame {
    pub id: FrameId,
    pub movement_type: MovementType,
}

/// Outcome of one detection run.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub algorithm: Algorithm,
    /// Flagged frame identifiers in sequence order.
    pub flagged: Vec<FrameId>,
    pub stats: Vec<FrameStats>,
    pub threshold: f64,
    pub threshold_source: ThresholdSource,
    pub flagged_types: Vec<FlaggedFrame>,
}

impl Detection {
    pub fn flagged_count(&self) -> usize {
        self.flagged.len()
    }
}

/// Per-frame statistics, one per frame. The first frame is always scored 0
/// with its detected feature count as inliers.
pub fn score_frames(frames: &FrameSequence, estimator: &mut dyn MotionEstimator) -> Vec<FrameStats> {
    let mut iter = frames.iter();
    let Some((first_id, first)) = iter.next() else {
        return Vec::new();
    };

    let mut stats = Vec::with_capacity(frames.len());
    let features = estimator.prime(first);
    stats.push(FrameStats::first(first_id.clone(), features));

    for (id, frame) in iter {
        let record = match estimator.advance(frame) {
            Some(estimate) => {
                let movement_type = if estimator.classifies_movement() {
                    classify_movement(estimate.score, inlier_ratio(estimate.inliers, estimate.outliers))
                } else {
                    MovementType::None
                };
                FrameStats {
                    id: id.clone(),
                    score: estimate.score,
                    inliers: estimate.inliers,
                    outliers: estimate.outliers,
                    movement_type,
                }
            }
            None => FrameStats::failed(id.clone()),
        };
        debug!(
            estimator = estimator.name(),
            frame = %record.id,
            score = record.score,
            inliers = record.inliers,
            outliers = record.outliers,
            "scored frame"
        );
        stats.push(record);
    }
    stats
}

/// Run the configured strategy over `frames` and flag significant movement.
pub fn detect(frames: &FrameSequence, config: &DetectorConfig) -> Result<Detection, DetectError> {
    let algorithm: Algorithm = config.algorithm.parse()?;
    let mut estimator = algorithm.estimator(config);
    let stats = score_frames(frames, estimator.as_mut());

    let scores: Vec<f64> = stats.iter().map(|s| s.score).collect();
    let threshold = resolve_threshold(&scores, config.threshold, config.adaptive_k, FALLBACK_THRESHOLD);

    let flagged_types: Vec<FlaggedFrame> = stats
        .iter()
        .filter(|s| is_flagged(s.score, threshold.value))
        .map(|s| FlaggedFrame {
            id: s.id.clone(),
            movement_type: s.movement_type,
        })
        .collect();
    let flagged: Vec<FrameId> = flagged_types.iter().map(|f| f.id.clone()).collect();

    info!(
        algorithm = %algorithm,
        frames = stats.len(),
        flagged = flagged.len(),
        threshold = threshold.value,
        "detection finished"
    );

    Ok(Detection {
        algorithm,
        flagged,
        stats,
        threshold: threshold.value,
        threshold_source: threshold.source,
        flagged_types,
    })
}
