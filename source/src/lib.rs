//! Frame ingestion.
//!
//! Sources produce grayscale frames one at a time through [`FrameSource`]:
//! - image directories ([`DirectorySource`])
//! - video files and cameras decoded by an `ffmpeg` subprocess ([`FfmpegSource`])
//!
//! The `load*` helpers drain a source into a [`FrameSequence`]. They never fail:
//! an unreadable input produces an empty (or truncated) sequence and a warning,
//! so callers must check the length before scoring.

pub mod cli;
pub mod directory;
mod pnm;
pub mod video;

use std::path::{Path, PathBuf};

use camera_motion_common::frame::{FrameId, FrameSequence};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use tracing::{debug, info, warn};

pub use directory::DirectorySource;
pub use video::{check_ffmpeg_available, FfmpegSource};

/// Produces frames in order until the input is exhausted.
pub trait FrameSource {
    /// Returns the next frame, or `Ok(None)` at end of sequence.
    fn next_frame(&mut self) -> Result<Option<(FrameId, GrayImage)>, SourceError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read directory {0}: {1}")]
    ReadDir(String, std::io::Error),
    #[error("input not found: {0}")]
    NotFound(String),
    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(String),
    #[error("failed to read frame stream: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Directory(PathBuf),
    Video(PathBuf),
    Camera { device: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Exact `(width, height)` applied before grayscale conversion.
    pub resize: Option<(u32, u32)>,
    /// Stop after this many successfully decoded frames.
    pub max_frames: Option<usize>,
    /// Camera capture length when `max_frames` is unset.
    pub camera_frames: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            resize: None,
            max_frames: None,
            camera_frames: 20,
        }
    }
}

impl LoadOptions {
    fn frame_cap(&self, spec: &SourceSpec) -> Option<usize> {
        match spec {
            SourceSpec::Camera { .. } => Some(self.max_frames.unwrap_or(self.camera_frames)),
            _ => self.max_frames,
        }
    }
}

/// Resize (when requested) and convert to 8-bit grayscale.
pub fn to_gray(image: DynamicImage, resize: Option<(u32, u32)>) -> GrayImage {
    let image = match resize {
        Some((width, height)) => image.resize_exact(width, height, FilterType::Triangle),
        None => image,
    };
    image.to_luma8()
}

pub fn open(spec: &SourceSpec, options: &LoadOptions) -> Result<Box<dyn FrameSource>, SourceError> {
    let source: Box<dyn FrameSource> = match spec {
        SourceSpec::Directory(dir) => Box::new(DirectorySource::open(dir, options.resize)?),
        SourceSpec::Video(path) => Box::new(FfmpegSource::open_video(path, options.resize)?),
        SourceSpec::Camera { device } => Box::new(FfmpegSource::open_camera(
            device,
            options.frame_cap(spec),
            options.resize,
        )?),
    };
    Ok(source)
}

/// Drain `source` into a sequence, stopping at end of input, the first read
/// error, or `max_frames`.
pub fn collect_frames(source: &mut dyn FrameSource, max_frames: Option<usize>) -> FrameSequence {
    let mut seq = FrameSequence::new();
    loop {
        if max_frames.is_some_and(|cap| seq.len() >= cap) {
            debug!(source = source.name(), frames = seq.len(), "frame cap reached");
            break;
        }
        match source.next_frame() {
            Ok(Some((id, frame))) => seq.push(id, frame),
            Ok(None) => break,
            Err(e) => {
                warn!(source = source.name(), error = %e, frames = seq.len(), "frame source failed, stopping");
                break;
            }
        }
    }
    seq
}

/// Load every frame `spec` yields. Failures surface as an empty sequence.
pub fn load(spec: &SourceSpec, options: &LoadOptions) -> FrameSequence {
    match spec {
        SourceSpec::Directory(dir) => load_image_sequence(dir, options.resize, options.max_frames),
        SourceSpec::Video(path) => load_video(path, options.resize, options.max_frames),
        SourceSpec::Camera { device } => capture_from_camera(
            device,
            options.max_frames.unwrap_or(options.camera_frames),
            options.resize,
        ),
    }
}

fn drain(spec: &SourceSpec, options: &LoadOptions) -> FrameSequence {
    let mut source = match open(spec, options) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to open frame source");
            return FrameSequence::new();
        }
    };
    let seq = collect_frames(source.as_mut(), options.frame_cap(spec));
    info!(source = source.name(), frames = seq.len(), "frames loaded");
    seq
}

pub fn load_image_sequence(
    dir: &Path,
    resize: Option<(u32, u32)>,
    max_frames: Option<usize>,
) -> FrameSequence {
    let options = LoadOptions {
        resize,
        max_frames,
        ..LoadOptions::default()
    };
    drain(&SourceSpec::Directory(dir.to_path_buf()), &options)
}

pub fn load_video(path: &Path, resize: Option<(u32, u32)>, max_frames: Option<usize>) -> FrameSequence {
    let options = LoadOptions {
        resize,
        max_frames,
        ..LoadOptions::default()
    };
    drain(&SourceSpec::Video(path.to_path_buf()), &options)
}

/// Grab `num_frames` frames from a local camera.
pub fn capture_from_camera(device: &str, num_frames: usize, resize: Option<(u32, u32)>) -> FrameSequence {
    let options = LoadOptions {
        resize,
        max_frames: Some(num_frames),
        ..LoadOptions::default()
    };
    drain(
        &SourceSpec::Camera {
            device: device.to_string(),
        },
        &options,
    )
}
