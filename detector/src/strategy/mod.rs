//! Frame-pair motion estimators.

pub mod flow;
pub mod keypoint;
pub mod traits;

pub use flow::SparseFlowEstimator;
pub use keypoint::{KeypointEstimator, KeypointModel};
pub use traits::{MotionEstimate, MotionEstimator};
