//! Camera-movement detection over ordered grayscale frame sequences.
//!
//! Each frame is scored against its predecessor by one of three strategies
//! (sparse optical flow, ORB keypoints with a similarity model, ORB keypoints
//! with a homography); frames whose score is undefined or above the run's
//! threshold are flagged.

pub mod detector;
pub mod report;
pub mod stats;
pub mod strategy;
pub mod threshold;
pub mod vision;

#[cfg(test)]
mod testutil;

pub use detector::{detect, Algorithm, DetectError, Detection, FlaggedFrame};
pub use stats::{FrameStats, MovementType};
