use camera_motion_common::config::{DetectorConfig, RansacConfig};
use image::GrayImage;
use tracing::debug;

use super::traits::{MotionEstimate, MotionEstimator};
use crate::vision::matcher::match_cross_checked;
use crate::vision::orb::{Features, Orb};
use crate::vision::ransac::{self, Correspondence};
use crate::vision::transform::{HomographyEstimator, SimilarityEstimator};

/// Global model fitted to matched keypoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypointModel {
    /// Similarity; scored by translation plus rotation in degrees.
    Affine,
    /// Full homography; scored by its translation column only.
    Homography,
}

/// ORB features matched between consecutive frames.
pub struct KeypointEstimator {
    orb: Orb,
    model: KeypointModel,
    min_matches: usize,
    ransac: RansacConfig,
    prev: Option<Features>,
}

impl KeypointEstimator {
    pub fn new(config: &DetectorConfig, model: KeypointModel) -> Self {
        Self {
            orb: Orb::new(config.orb_features),
            model,
            min_matches: config.min_matches,
            ransac: config.ransac.clone(),
            prev: None,
        }
    }

    fn estimate(&self, prev: &Features, current: &Features) -> Option<MotionEstimate> {
        let matches = match_cross_checked(&prev.descriptors, &current.descriptors);
        if matches.len() < self.min_matches {
            debug!(matches = matches.len(), required = self.min_matches, "Too few descriptor matches");
            return None;
        }
        let pairs: Vec<Correspondence> = matches
            .iter()
            .map(|m| Correspondence::new(prev.keypoints[m.query], current.keypoints[m.train]))
            .collect();

        let (score, inliers, outliers) = match self.model {
            KeypointModel::Affine => {
                let fit = ransac::run(&SimilarityEstimator, &pairs, &self.ransac)?;
                (fit.model.motion_score(), fit.inlier_count(), fit.outlier_count())
            }
            KeypointModel::Homography => {
                let fit = ransac::run(&HomographyEstimator, &pairs, &self.ransac)?;
                (fit.model.motion_score(), fit.inlier_count(), fit.outlier_count())
            }
        };
        Some(MotionEstimate {
            score,
            inliers,
            outliers,
        })
    }
}

impl MotionEstimator for KeypointEstimator {
    fn prime(&mut self, frame: &GrayImage) -> usize {
        let features = self.orb.detect_and_compute(frame);
        let count = features.len();
        self.prev = Some(features);
        count
    }

    fn advance(&mut self, frame: &GrayImage) -> Option<MotionEstimate> {
        let current = self.orb.detect_and_compute(frame);
        let estimate = self
            .prev
            .as_ref()
            .and_then(|prev| self.estimate(prev, &current));
        self.prev = Some(current);
        estimate
    }

    fn name(&self) -> &str {
        match self.model {
            KeypointModel::Affine => "ORB",
            KeypointModel::Homography => "Homography",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::shifted_pair;
    use image::Luma;

    #[test]
    fn affine_scores_pan() {
        let (prev, next) = shifted_pair(240, 180, 8, 0, 21);
        let mut est = KeypointEstimator::new(&DetectorConfig::default(), KeypointModel::Affine);
        assert!(est.prime(&prev) > 0);
        let estimate = est.advance(&next).unwrap();
        assert!((estimate.score - 8.0).abs() < 1.5, "score {}", estimate.score);
        assert!(estimate.inliers >= 15);
    }

    #[test]
    fn homography_scores_pan() {
        let (prev, next) = shifted_pair(240, 180, 0, 8, 22);
        let mut est = KeypointEstimator::new(&DetectorConfig::default(), KeypointModel::Homography);
        est.prime(&prev);
        let estimate = est.advance(&next).unwrap();
        assert!((estimate.score - 8.0).abs() < 1.5, "score {}", estimate.score);
    }

    #[test]
    fn too_few_matches_fail() {
        let blank = GrayImage::from_pixel(120, 120, Luma([10]));
        let mut est = KeypointEstimator::new(&DetectorConfig::default(), KeypointModel::Affine);
        assert_eq!(est.prime(&blank), 0);
        assert!(est.advance(&blank).is_none());
    }
}
