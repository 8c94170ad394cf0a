use std::path::{Path, PathBuf};

use camera_motion_common::frame::FrameId;
use image::GrayImage;
use tracing::debug;

use crate::{to_gray, FrameSource, SourceError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff"];

/// Image files in a directory, in lexicographic file-name order.
///
/// Files that carry an image extension but fail to decode are skipped without
/// producing an identifier.
pub struct DirectorySource {
    name: String,
    files: std::vec::IntoIter<PathBuf>,
    resize: Option<(u32, u32)>,
}

impl DirectorySource {
    pub fn open(dir: &Path, resize: Option<(u32, u32)>) -> Result<Self, SourceError> {
        let entries =
            std::fs::read_dir(dir).map_err(|e| SourceError::ReadDir(dir.display().to_string(), e))?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        debug!(dir = %dir.display(), candidates = files.len(), "listed image directory");

        Ok(Self {
            name: dir.display().to_string(),
            files: files.into_iter(),
            resize,
        })
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<(FrameId, GrayImage)>, SourceError> {
        for path in self.files.by_ref() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match image::open(&path) {
                Ok(img) => return Ok(Some((FrameId::Name(name), to_gray(img, self.resize)))),
                Err(e) => {
                    debug!(file = name, error = %e, "skipping undecodable image");
                }
            }
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
