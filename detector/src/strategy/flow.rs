use camera_motion_common::config::{DetectorConfig, RansacConfig};
use image::GrayImage;
use nalgebra::Point2;
use tracing::debug;

use super::traits::{MotionEstimate, MotionEstimator};
use crate::vision::corners::good_features_to_track;
use crate::vision::lucas_kanade::LucasKanade;
use crate::vision::ransac::{self, Correspondence};
use crate::vision::transform::SimilarityEstimator;

/// Fewest corners (and fewest tracked corners) a frame pair needs.
pub const MIN_TRACKED_POINTS: usize = 6;

/// Shi–Tomasi corners tracked with pyramidal Lucas–Kanade, scored by a
/// RANSAC similarity fit. Corners are re-detected on every frame, so a point
/// is never followed for more than one step.
pub struct SparseFlowEstimator {
    tracker: LucasKanade,
    max_corners: usize,
    quality_level: f64,
    min_distance: f64,
    ransac: RansacConfig,
    prev: Option<(GrayImage, Vec<Point2<f64>>)>,
}

impl SparseFlowEstimator {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            tracker: LucasKanade::new(&config.flow),
            max_corners: config.max_corners,
            quality_level: config.quality_level,
            min_distance: config.min_distance,
            ransac: config.ransac.clone(),
            prev: None,
        }
    }

    fn corners(&self, frame: &GrayImage) -> Vec<Point2<f64>> {
        good_features_to_track(frame, self.max_corners, self.quality_level, self.min_distance)
    }

    fn estimate(&self, prev: &GrayImage, corners: &[Point2<f64>], frame: &GrayImage) -> Option<MotionEstimate> {
        if corners.len() < MIN_TRACKED_POINTS {
            debug!(corners = corners.len(), "Too few corners to track");
            return None;
        }

        let pairs: Vec<Correspondence> = corners
            .iter()
            .zip(self.tracker.track(prev, frame, corners))
            .filter_map(|(src, dst)| dst.map(|dst| Correspondence::new(*src, dst)))
            .collect();
        if pairs.len() < MIN_TRACKED_POINTS {
            debug!(tracked = pairs.len(), corners = corners.len(), "Too few points tracked");
            return None;
        }

        let fit = ransac::run(&SimilarityEstimator, &pairs, &self.ransac)?;
        Some(MotionEstimate {
            score: fit.model.motion_score(),
            inliers: fit.inlier_count(),
            outliers: fit.outlier_count(),
        })
    }
}

impl MotionEstimator for SparseFlowEstimator {
    fn prime(&mut self, frame: &GrayImage) -> usize {
        let corners = self.corners(frame);
        let count = corners.len();
        self.prev = Some((frame.clone(), corners));
        count
    }

    fn advance(&mut self, frame: &GrayImage) -> Option<MotionEstimate> {
        let estimate = self
            .prev
            .as_ref()
            .and_then(|(prev, corners)| self.estimate(prev, corners, frame));
        self.prime(frame);
        estimate
    }

    fn classifies_movement(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "OpticalFlow"
    }
}
