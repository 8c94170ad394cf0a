use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parameters handed to the movement scorer for one detection run.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Strategy name: `OpticalFlow`, `ORB` or `Homography`.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Fixed flagging threshold. `None` selects the adaptive threshold.
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Multiplier applied to the standard deviation of the adaptive threshold.
    #[serde(default = "default_adaptive_k")]
    pub adaptive_k: f64,
    /// Minimum descriptor matches before a keypoint model is fitted.
    #[serde(default = "default_min_matches")]
    pub min_matches: usize,
    #[serde(default = "default_max_corners")]
    pub max_corners: usize,
    #[serde(default = "default_quality_level")]
    pub quality_level: f64,
    #[serde(default = "default_min_distance")]
    pub min_distance: f64,
    /// Upper bound on ORB keypoints per frame.
    #[serde(default = "default_orb_features")]
    pub orb_features: usize,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub ransac: RansacConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// Side length of the square tracking window, in pixels.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Pyramid levels above full resolution.
    #[serde(default = "default_pyramid_levels")]
    pub pyramid_levels: usize,
    #[serde(default = "default_flow_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RansacConfig {
    /// Maximum reprojection error (pixels) for a point to count as an inlier.
    #[serde(default = "default_reproj_threshold")]
    pub reproj_threshold: f64,
    #[serde(default = "default_ransac_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Seed for minimal-sample selection; runs are reproducible.
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Target `[width, height]` applied before grayscale conversion.
    #[serde(default)]
    pub resize: Option<[u32; 2]>,
    #[serde(default)]
    pub max_frames: Option<usize>,
    #[serde(default = "default_camera_device")]
    pub camera_device: String,
    /// Frames captured from a camera when no `max_frames` cap is given.
    #[serde(default = "default_camera_frames")]
    pub camera_frames: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_max_thumbnails")]
    pub max_thumbnails: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            threshold: None,
            adaptive_k: default_adaptive_k(),
            min_matches: default_min_matches(),
            max_corners: default_max_corners(),
            quality_level: default_quality_level(),
            min_distance: default_min_distance(),
            orb_features: default_orb_features(),
            flow: FlowConfig::default(),
            ransac: RansacConfig::default(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            pyramid_levels: default_pyramid_levels(),
            max_iterations: default_flow_iterations(),
            epsilon: default_epsilon(),
        }
    }
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            reproj_threshold: default_reproj_threshold(),
            max_iterations: default_ransac_iterations(),
            confidence: default_confidence(),
            seed: 0,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            resize: None,
            max_frames: None,
            camera_device: default_camera_device(),
            camera_frames: default_camera_frames(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_thumbnails: default_max_thumbnails(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_algorithm() -> String {
    "OpticalFlow".into()
}
fn default_adaptive_k() -> f64 {
    2.0
}
fn default_min_matches() -> usize {
    15
}
fn default_max_corners() -> usize {
    500
}
fn default_quality_level() -> f64 {
    0.01
}
fn default_min_distance() -> f64 {
    7.0
}
fn default_orb_features() -> usize {
    1000
}
fn default_window_size() -> usize {
    21
}
fn default_pyramid_levels() -> usize {
    3
}
fn default_flow_iterations() -> usize {
    30
}
fn default_epsilon() -> f64 {
    0.01
}
fn default_reproj_threshold() -> f64 {
    3.0
}
fn default_ransac_iterations() -> usize {
    2000
}
fn default_confidence() -> f64 {
    0.99
}
fn default_camera_device() -> String {
    "/dev/video0".into()
}
fn default_camera_frames() -> usize {
    20
}
fn default_max_thumbnails() -> usize {
    8
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.detector.algorithm, "OpticalFlow");
        assert_eq!(config.detector.threshold, None);
        assert_eq!(config.detector.adaptive_k, 2.0);
        assert_eq!(config.detector.min_matches, 15);
        assert_eq!(config.detector.max_corners, 500);
        assert_eq!(config.detector.quality_level, 0.01);
        assert_eq!(config.detector.min_distance, 7.0);
        assert_eq!(config.detector.flow.window_size, 21);
        assert_eq!(config.source.camera_frames, 20);
        assert_eq!(config.report.max_thumbnails, 8);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [detector]
            algorithm = "ORB"
            threshold = 4.5

            [detector.ransac]
            seed = 7

            [source]
            resize = [320, 240]
            max_frames = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.detector.algorithm, "ORB");
        assert_eq!(config.detector.threshold, Some(4.5));
        assert_eq!(config.detector.min_matches, 15);
        assert_eq!(config.detector.ransac.seed, 7);
        assert_eq!(config.detector.ransac.reproj_threshold, 3.0);
        assert_eq!(config.source.resize, Some([320, 240]));
        assert_eq!(config.source.max_frames, Some(50));
        assert_eq!(config.source.camera_device, "/dev/video0");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::parse("[detector\nalgorithm = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load(Path::new("/nonexistent/camera-motion.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(_, _)));
    }
}
