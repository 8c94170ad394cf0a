//! Command-line input selection shared by the binaries.

use std::path::PathBuf;

use camera_motion_common::config::SourceConfig;
use clap::builder::RangedU64ValueParser;
use clap::Args;

use crate::{LoadOptions, SourceSpec};

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct InputArgs {
    /// Directory of images
    #[arg(long)]
    pub input_dir: Option<PathBuf>,
    /// Path to video file
    #[arg(long)]
    pub video: Option<PathBuf>,
    /// Use webcam
    #[arg(long)]
    pub webcam: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Camera device used with --webcam
    #[arg(long)]
    pub device: Option<String>,
    /// Resize frames to W x H before grayscale conversion
    #[arg(long, num_args = 2, value_names = ["W", "H"])]
    pub resize: Option<Vec<u32>>,
    /// Stop after this many frames
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_frames: Option<usize>,
}

impl SourceArgs {
    pub fn spec(&self, config: &SourceConfig) -> SourceSpec {
        if let Some(dir) = &self.input.input_dir {
            SourceSpec::Directory(dir.clone())
        } else if let Some(path) = &self.input.video {
            SourceSpec::Video(path.clone())
        } else {
            SourceSpec::Camera {
                device: self
                    .device
                    .clone()
                    .unwrap_or_else(|| config.camera_device.clone()),
            }
        }
    }

    /// Command-line values win over the config file. A configured
    /// `max_frames = 0` means no cap.
    pub fn options(&self, config: &SourceConfig) -> LoadOptions {
        let resize = match self.resize.as_deref() {
            Some([w, h]) => Some((*w, *h)),
            _ => config.resize.map(|[w, h]| (w, h)),
        };
        LoadOptions {
            resize,
            max_frames: self.max_frames.or(config.max_frames.filter(|&n| n > 0)),
            camera_frames: config.camera_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        source: SourceArgs,
    }

    #[test]
    fn inputs_are_mutually_exclusive() {
        assert!(TestCli::try_parse_from(["t", "--video", "a.mp4", "--webcam"]).is_err());
        assert!(TestCli::try_parse_from(["t"]).is_err());
        assert!(TestCli::try_parse_from(["t", "--input-dir", "frames"]).is_ok());
    }

    #[test]
    fn cli_overrides_config() {
        let cli =
            TestCli::try_parse_from(["t", "--webcam", "--resize", "320", "240", "--max-frames", "5"])
                .unwrap();
        let config = SourceConfig {
            resize: Some([640, 480]),
            max_frames: Some(100),
            ..SourceConfig::default()
        };
        let options = cli.source.options(&config);
        assert_eq!(options.resize, Some((320, 240)));
        assert_eq!(options.max_frames, Some(5));
        assert_eq!(
            cli.source.spec(&config),
            SourceSpec::Camera { device: "/dev/video0".into() }
        );
    }

    #[test]
    fn config_fills_missing_flags() {
        let cli = TestCli::try_parse_from(["t", "--video", "clip.mp4"]).unwrap();
        let config = SourceConfig {
            resize: Some([640, 480]),
            ..SourceConfig::default()
        };
        let options = cli.source.options(&config);
        assert_eq!(options.resize, Some((640, 480)));
        assert_eq!(options.max_frames, None);
        assert_eq!(cli.source.spec(&config), SourceSpec::Video("clip.mp4".into()));
    }

    #[test]
    fn zero_frame_cap_is_rejected_or_ignored() {
        assert!(TestCli::try_parse_from(["t", "--input-dir", "frames", "--max-frames", "0"]).is_err());

        let cli = TestCli::try_parse_from(["t", "--input-dir", "frames"]).unwrap();
        let config = SourceConfig {
            max_frames: Some(0),
            ..SourceConfig::default()
        };
        assert_eq!(cli.source.options(&config).max_frames, None);
    }
}
