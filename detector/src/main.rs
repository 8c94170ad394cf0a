use std::path::{Path, PathBuf};

use camera_motion_common::config::{Config, DetectorConfig};
use camera_motion_detector::report;
use camera_motion_source::cli::SourceArgs;
use camera_motion_source::SourceSpec;
use clap::{Args, Parser};
use tracing::{error, info};

/// Flag frames with significant camera movement.
#[derive(Debug, Parser)]
#[command(name = "camera-motion", version)]
struct Cli {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    detector: DetectorArgs,
    /// Write the full result as JSON
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,
    /// Save flagged frames as PNG thumbnails in this directory
    #[arg(long, value_name = "DIR")]
    thumbnails: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct DetectorArgs {
    /// OpticalFlow, ORB or Homography
    #[arg(long)]
    algorithm: Option<String>,
    /// Fixed flagging threshold
    #[arg(long, conflicts_with = "adaptive")]
    threshold: Option<f64>,
    /// Derive the threshold from the score distribution
    #[arg(long)]
    adaptive: bool,
    /// Standard deviations above the mean for the adaptive threshold
    #[arg(long)]
    adaptive_k: Option<f64>,
    #[arg(long)]
    min_matches: Option<usize>,
    #[arg(long)]
    max_corners: Option<usize>,
    #[arg(long)]
    quality_level: Option<f64>,
    #[arg(long)]
    min_distance: Option<f64>,
}

impl DetectorArgs {
    fn apply(&self, config: &mut DetectorConfig) {
        if let Some(algorithm) = &self.algorithm {
            config.algorithm = algorithm.clone();
        }
        if self.adaptive {
            config.threshold = None;
        } else if let Some(threshold) = self.threshold {
            config.threshold = Some(threshold);
        }
        if let Some(k) = self.adaptive_k {
            config.adaptive_k = k;
        }
        if let Some(n) = self.min_matches {
            config.min_matches = n;
        }
        if let Some(n) = self.max_corners {
            config.max_corners = n;
        }
        if let Some(q) = self.quality_level {
            config.quality_level = q;
        }
        if let Some(d) = self.min_distance {
            config.min_distance = d;
        }
    }
}

fn load_config(path: Option<&Path>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    match Config::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref());
    cli.detector.apply(&mut config.detector);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let spec = cli.source.spec(&config.source);
    let options = cli.source.options(&config.source);
    info!(
        algorithm = config.detector.algorithm,
        threshold = ?config.detector.threshold,
        adaptive_k = config.detector.adaptive_k,
        ?spec,
        "starting camera-motion"
    );

    // Video and camera frames are decoded by ffmpeg.
    if !matches!(spec, SourceSpec::Directory(_)) {
        camera_motion_source::check_ffmpeg_available();
    }

    let frames = camera_motion_source::load(&spec, &options);
    if frames.len() < 2 {
        eprintln!("Need at least 2 frames to detect movement, loaded {}", frames.len());
        std::process::exit(1);
    }
    info!(frames = frames.len(), "frames loaded");

    let detection = match camera_motion_detector::detect(&frames, &config.detector) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Detection failed: {e}");
            std::process::exit(1);
        }
    };
    print!("{detection}");

    if let Some(path) = &cli.json {
        if let Err(e) = report::write_json(&detection, path) {
            error!(error = %e, "failed to write JSON report");
            std::process::exit(1);
        }
    }
    if let Some(dir) = &cli.thumbnails {
        if let Err(e) = report::write_thumbnails(&detection, &frames, dir, config.report.max_thumbnails) {
            error!(error = %e, "failed to write thumbnails");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["camera-motion", "--input-dir", "frames"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = parse(&["--algorithm", "ORB", "--threshold", "3.5", "--min-matches", "20"]);
        let mut config = DetectorConfig::default();
        cli.detector.apply(&mut config);
        assert_eq!(config.algorithm, "ORB");
        assert_eq!(config.threshold, Some(3.5));
        assert_eq!(config.min_matches, 20);
        assert_eq!(config.max_corners, 500);
    }

    #[test]
    fn adaptive_clears_configured_threshold() {
        let cli = parse(&["--adaptive", "--adaptive-k", "1.5"]);
        let mut config = DetectorConfig {
            threshold: Some(8.0),
            ..DetectorConfig::default()
        };
        cli.detector.apply(&mut config);
        assert_eq!(config.threshold, None);
        assert_eq!(config.adaptive_k, 1.5);
    }

    #[test]
    fn threshold_conflicts_with_adaptive() {
        let result = Cli::try_parse_from([
            "camera-motion",
            "--input-dir",
            "frames",
            "--adaptive",
            "--threshold",
            "2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        let config = load_config(None);
        assert_eq!(config.detector.algorithm, "OpticalFlow");
        assert_eq!(config.report.max_thumbnails, 8);
    }
}
