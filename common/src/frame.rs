use std::fmt;

use image::GrayImage;
use serde::Serialize;

/// Identifier attached to a frame at load time.
///
/// Image-sequence sources name frames by file name; video and camera sources
/// number them from zero in decode order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum FrameId {
    Name(String),
    Index(usize),
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameId::Name(name) => f.write_str(name),
            FrameId::Index(idx) => write!(f, "{idx}"),
        }
    }
}

impl From<usize> for FrameId {
    fn from(idx: usize) -> Self {
        FrameId::Index(idx)
    }
}

impl From<&str> for FrameId {
    fn from(name: &str) -> Self {
        FrameId::Name(name.to_string())
    }
}

/// Ordered grayscale frames with their identifiers, kept index-aligned.
#[derive(Debug, Clone, Default)]
pub struct FrameSequence {
    frames: Vec<GrayImage>,
    ids: Vec<FrameId>,
}

impl FrameSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: FrameId, frame: GrayImage) {
        self.ids.push(id);
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[GrayImage] {
        &self.frames
    }

    pub fn ids(&self) -> &[FrameId] {
        &self.ids
    }

    pub fn get(&self, idx: usize) -> Option<(&FrameId, &GrayImage)> {
        Some((self.ids.get(idx)?, self.frames.get(idx)?))
    }

    /// Look up a frame by identifier.
    pub fn find(&self, id: &FrameId) -> Option<&GrayImage> {
        let pos = self.ids.iter().position(|candidate| candidate == id)?;
        self.frames.get(pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FrameId, &GrayImage)> {
        self.ids.iter().zip(self.frames.iter())
    }
}

impl FromIterator<(FrameId, GrayImage)> for FrameSequence {
    fn from_iter<I: IntoIterator<Item = (FrameId, GrayImage)>>(iter: I) -> Self {
        let mut seq = FrameSequence::new();
        for (id, frame) in iter {
            seq.push(id, frame);
        }
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_stay_aligned_with_frames() {
        let mut seq = FrameSequence::new();
        seq.push(FrameId::from("b.png"), GrayImage::new(2, 2));
        seq.push(FrameId::from("a.png"), GrayImage::new(3, 3));
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.ids().len(), seq.frames().len());
        let (id, frame) = seq.get(1).unwrap();
        assert_eq!(id, &FrameId::from("a.png"));
        assert_eq!(frame.width(), 3);
        assert!(seq.get(2).is_none());
    }

    #[test]
    fn find_by_identifier() {
        let seq: FrameSequence = (0..3)
            .map(|i| (FrameId::from(i), GrayImage::new(i as u32 + 1, 1)))
            .collect();
        assert_eq!(seq.find(&FrameId::Index(2)).unwrap().width(), 3);
        assert!(seq.find(&FrameId::from("missing")).is_none());
    }

    #[test]
    fn display_matches_source_naming() {
        assert_eq!(FrameId::from("frame_001.jpg").to_string(), "frame_001.jpg");
        assert_eq!(FrameId::Index(12).to_string(), "12");
    }
}
