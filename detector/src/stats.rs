use camera_motion_common::frame::FrameId;
use serde::{Serialize, Serializer};
use std::fmt;

/// Scores at or below this never count as movement.
pub const MOVEMENT_SCORE_CUTOFF: f64 = 5.0;
/// Inlier ratio above which movement is attributed to the camera.
pub const CAMERA_INLIER_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum MovementType {
    #[default]
    None,
    Camera,
    Object,
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MovementType::None => "None",
            MovementType::Camera => "Camera",
            MovementType::Object => "Object",
        };
        f.write_str(s)
    }
}

pub fn inlier_ratio(inliers: usize, outliers: usize) -> f64 {
    inliers as f64 / (inliers as f64 + outliers as f64 + 1e-6)
}

/// A large, well-supported global motion means the camera moved; a large
/// motion most points disagree with means something in the scene moved.
pub fn classify_movement(score: f64, inlier_ratio: f64) -> MovementType {
    if score > MOVEMENT_SCORE_CUTOFF {
        if inlier_ratio > CAMERA_INLIER_RATIO {
            MovementType::Camera
        } else {
            MovementType::Object
        }
    } else {
        MovementType::None
    }
}

/// Per-frame result. `score` is infinite when no model could be fitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameStats {
    pub id: FrameId,
    #[serde(serialize_with = "finite_or_null")]
    pub score: f64,
    pub inliers: usize,
    pub outliers: usize,
    pub movement_type: MovementType,
}

impl FrameStats {
    /// Record for the first frame of a sequence.
    pub fn first(id: FrameId, features: usize) -> Self {
        Self {
            id,
            score: 0.0,
            inliers: features,
            outliers: 0,
            movement_type: MovementType::None,
        }
    }

    pub fn failed(id: FrameId) -> Self {
        Self {
            id,
            score: f64::INFINITY,
            inliers: 0,
            outliers: 0,
            movement_type: MovementType::None,
        }
    }
}

pub(crate) fn finite_or_null<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}
