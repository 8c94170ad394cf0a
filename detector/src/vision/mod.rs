//! Image-processing primitives used by the motion estimators.

pub mod corners;
pub mod lucas_kanade;
pub mod matcher;
pub mod orb;
pub mod ransac;
pub mod raster;
pub mod transform;
