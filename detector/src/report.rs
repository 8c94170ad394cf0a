//! Text, JSON and thumbnail renderings of a [`Detection`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use camera_motion_common::frame::{FrameId, FrameSequence};
use tracing::{info, warn};

use crate::detector::Detection;
use crate::threshold::ThresholdSource;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to serialise detection: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to encode thumbnail {0}: {1}")]
    Image(String, image::ImageError),
}

fn format_score(score: f64) -> String {
    if score.is_finite() {
        format!("{score:.2}")
    } else {
        "inf".to_string()
    }
}

/// Human-readable summary: flagged count, threshold, flagged frames with
/// their movement type, then one table row per frame.
impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.threshold_source {
            ThresholdSource::Fixed => "fixed".to_string(),
            ThresholdSource::Adaptive { mean, stddev } => {
                format!("adaptive, mean={mean:.2}, std={stddev:.2}")
            }
            ThresholdSource::Fallback => "fallback".to_string(),
        };
        writeln!(
            f,
            "{}: {} of {} frames flagged above threshold {:.2} ({})",
            self.algorithm,
            self.flagged_count(),
            self.stats.len(),
            self.threshold,
            source
        )?;

        if self.flagged_types.is_empty() {
            writeln!(f, "No significant movement detected.")?;
        } else {
            writeln!(f, "Flagged frames:")?;
            for flagged in &self.flagged_types {
                writeln!(f, "  {} ({})", flagged.id, flagged.movement_type)?;
            }
        }

        let width = self
            .stats
            .iter()
            .map(|s| s.id.to_string().len())
            .max()
            .unwrap_or(0)
            .max("frame".len());
        writeln!(
            f,
            "\n{:<width$}  {:>10}  {:>7}  {:>8}  type",
            "frame", "score", "inliers", "outliers"
        )?;
        for s in &self.stats {
            writeln!(
                f,
                "{:<width$}  {:>10}  {:>7}  {:>8}  {}",
                s.id.to_string(),
                format_score(s.score),
                s.inliers,
                s.outliers,
                s.movement_type
            )?;
        }
        Ok(())
    }
}

pub fn write_json(detection: &Detection, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(detection)?;
    fs::write(path, json).map_err(|e| ReportError::Io(path.display().to_string(), e))?;
    info!(path = %path.display(), "wrote detection JSON");
    Ok(())
}

/// Save up to `max` flagged frames as PNG files in `dir`. Returns the paths
/// written.
pub fn write_thumbnails(
    detection: &Detection,
    frames: &FrameSequence,
    dir: &Path,
    max: usize,
) -> Result<Vec<PathBuf>, ReportError> {
    fs::create_dir_all(dir).map_err(|e| ReportError::Io(dir.display().to_string(), e))?;

    let mut written = Vec::new();
    for (n, id) in detection.flagged.iter().take(max).enumerate() {
        let Some(frame) = frames.find(id) else {
            warn!(frame = %id, "flagged frame missing from sequence");
            continue;
        };
        let path = dir.join(thumbnail_name(n, id));
        frame
            .save(&path)
            .map_err(|e| ReportError::Image(path.display().to_string(), e))?;
        written.push(path);
    }
    info!(count = written.len(), dir = %dir.display(), "wrote thumbnails");
    Ok(written)
}

fn thumbnail_name(n: usize, id: &FrameId) -> String {
    let stem: String = match id {
        FrameId::Name(name) => Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone()),
        FrameId::Index(idx) => format!("frame{idx}"),
    };
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{n:02}_{stem}.png")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{Algorithm, FlaggedFrame};
    use crate::stats::{FrameStats, MovementType};
    use image::{GrayImage, Luma};

    fn detection() -> Detection {
        let stats = vec![
            FrameStats::first("a.png".into(), 40),
            FrameStats {
                id: "b.png".into(),
                score: 12.5,
                inliers: 30,
                outliers: 4,
                movement_type: MovementType::Camera,
            },
            FrameStats::failed("c.png".into()),
        ];
        let flagged_types = vec![
            FlaggedFrame {
                id: "b.png".into(),
                movement_type: MovementType::Camera,
            },
            FlaggedFrame {
                id: "c.png".into(),
                movement_type: MovementType::None,
            },
        ];
        Detection {
            algorithm: Algorithm::OpticalFlow,
            flagged: flagged_types.iter().map(|f| f.id.clone()).collect(),
            stats,
            threshold: 10.0,
            threshold_source: ThresholdSource::Fixed,
            flagged_types,
        }
    }

    #[test]
    fn renders_summary_and_table() {
        let text = detection().to_string();
        assert!(text.starts_with("OpticalFlow: 2 of 3 frames flagged above threshold 10.00 (fixed)"));
        assert!(text.contains("  b.png (Camera)"));
        assert!(text.contains("12.50"));
        let last = text.lines().last().unwrap();
        assert!(last.starts_with("c.png"));
        assert!(last.contains("inf"));
    }

    #[test]
    fn json_uses_null_for_infinite_scores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&detection(), &path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["algorithm"], "OpticalFlow");
        assert_eq!(value["flagged"], serde_json::json!(["b.png", "c.png"]));
        assert!(value["stats"][2]["score"].is_null());
        assert_eq!(value["threshold_source"]["kind"], "fixed");
    }

    #[test]
    fn thumbnails_respect_limit() {
        let dir = tempfile::tempdir().unwrap();
        let frames: FrameSequence = ["a.png", "b.png", "c.png"]
            .into_iter()
            .map(|n| (FrameId::from(n), GrayImage::from_pixel(4, 4, Luma([7]))))
            .collect();

        let written = write_thumbnails(&detection(), &frames, dir.path(), 1).unwrap();
        assert_eq!(written, vec![dir.path().join("00_b.png")]);
        assert!(written[0].exists());
    }

    #[test]
    fn index_ids_get_frame_names() {
        assert_eq!(thumbnail_name(3, &FrameId::Index(17)), "03_frame17.png");
        assert_eq!(thumbnail_name(0, &FrameId::from("x y.jpg")), "00_x_y.png");
    }
}
