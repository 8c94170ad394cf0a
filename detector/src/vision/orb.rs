//! ORB (Oriented FAST and Rotated BRIEF) keypoints and binary descriptors.
//!
//! FAST-9 corners are found on a scale pyramid, ranked by Harris response,
//! oriented by intensity centroid and described with a steered 256-bit BRIEF
//! test pattern evaluated on a smoothed copy of each level.

use image::imageops::{self, FilterType};
use image::GrayImage;
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

const N_LEVELS: i32 = 8;
const SCALE_FACTOR: f64 = 1.2;
const FAST_THRESHOLD: i16 = 20;
/// FAST arc length: a corner needs this many contiguous brighter or darker pixels.
const FAST_ARC: usize = 9;
/// Keypoints keep this far from the level border so every rotated test pair
/// stays inside the image.
const EDGE: u32 = 19;
const PATCH_RADIUS: i32 = 15;
const HARRIS_HALF_BLOCK: i32 = 3;
const HARRIS_K: f32 = 0.04;
const BLUR_SIGMA: f32 = 2.0;
const PATTERN_SEED: u64 = 0x0b_5eed;
/// Test-pair coordinates lie in `[-PATTERN_EXTENT, PATTERN_EXTENT]`.
const PATTERN_EXTENT: i8 = 13;

/// Bresenham circle of radius 3 around the candidate pixel.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// 256-bit binary descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub [u8; 32]);

impl Descriptor {
    pub fn hamming(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// Keypoints with their descriptors, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct Features {
    /// Keypoint positions in full-resolution coordinates.
    pub keypoints: Vec<Point2<f64>>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

pub struct Orb {
    n_features: usize,
    pattern: Vec<[i8; 4]>,
}

impl Orb {
    pub fn new(n_features: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let pattern = (0..256)
            .map(|_| {
                let mut pair = [0i8; 4];
                for v in pair.iter_mut() {
                    *v = rng.gen_range(-PATTERN_EXTENT..=PATTERN_EXTENT);
                }
                pair
            })
            .collect();
        Self {
            n_features,
            pattern,
        }
    }

    pub fn detect_and_compute(&self, image: &GrayImage) -> Features {
        let mut features = Features::default();
        let quotas = level_quotas(self.n_features);

        for (level, quota) in quotas.into_iter().enumerate() {
            let scale = SCALE_FACTOR.powi(level as i32);
            let width = (image.width() as f64 / scale).round() as u32;
            let height = (image.height() as f64 / scale).round() as u32;
            if width <= 2 * EDGE || height <= 2 * EDGE {
                break;
            }
            let level_img = if level == 0 {
                image.clone()
            } else {
                imageops::resize(image, width, height, FilterType::Triangle)
            };

            let mut corners: Vec<(u32, u32, f32)> = fast_corners(&level_img)
                .into_iter()
                .map(|(x, y)| (x, y, harris_response(&level_img, x, y)))
                .collect();
            let detected = corners.len();
            corners.sort_by(|a, b| b.2.total_cmp(&a.2));
            corners.truncate(quota);
            trace!(level, width, height, detected, kept = corners.len(), "ORB pyramid level");
            if corners.is_empty() {
                continue;
            }

            let smoothed = imageops::blur(&level_img, BLUR_SIGMA);
            for (x, y, _) in corners {
                let angle = intensity_centroid_angle(&level_img, x, y);
                features.descriptors.push(self.describe(&smoothed, x, y, angle));
                features
                    .keypoints
                    .push(Point2::new(x as f64 * scale, y as f64 * scale));
            }
        }
        features
    }

    fn describe(&self, smoothed: &GrayImage, x: u32, y: u32, angle: f64) -> Descriptor {
        let (sin, cos) = angle.sin_cos();
        let at = |px: i8, py: i8| {
            let (px, py) = (px as f64, py as f64);
            let rx = (cos * px - sin * py).round() as i64;
            let ry = (sin * px + cos * py).round() as i64;
            smoothed.get_pixel((x as i64 + rx) as u32, (y as i64 + ry) as u32)[0]
        };

        let mut bits = [0u8; 32];
        for (i, pair) in self.pattern.iter().enumerate() {
            if at(pair[0], pair[1]) < at(pair[2], pair[3]) {
                bits[i / 8] |= 1 << (i % 8);
            }
        }
        Descriptor(bits)
    }
}

/// Features per pyramid level, decreasing geometrically with level area.
fn level_quotas(n_features: usize) -> Vec<usize> {
    let factor = 1.0 / SCALE_FACTOR;
    let mut desired = n_features as f64 * (1.0 - factor) / (1.0 - factor.powi(N_LEVELS));
    let mut quotas = Vec::with_capacity(N_LEVELS as usize);
    let mut assigned = 0usize;
    for _ in 0..N_LEVELS - 1 {
        let n = desired.round() as usize;
        quotas.push(n);
        assigned += n;
        desired *= factor;
    }
    quotas.push(n_features.saturating_sub(assigned));
    quotas
}

/// FAST-9 corners after 3x3 non-maximum suppression on the corner score.
fn fast_corners(image: &GrayImage) -> Vec<(u32, u32)> {
    let (width, height) = image.dimensions();
    let mut scores = vec![0i32; (width * height) as usize];

    for y in EDGE..height - EDGE {
        for x in EDGE..width - EDGE {
            scores[(y * width + x) as usize] = fast_score(image, x, y);
        }
    }

    let mut corners = Vec::new();
    for y in EDGE..height - EDGE {
        for x in EDGE..width - EDGE {
            let s = scores[(y * width + x) as usize];
            if s == 0 {
                continue;
            }
            let is_peak = (y - 1..=y + 1).all(|ny| {
                (x - 1..=x + 1).all(|nx| scores[(ny * width + nx) as usize] <= s)
            });
            if is_peak {
                corners.push((x, y));
            }
        }
    }
    corners
}

/// Sum of excess contrast over the qualifying arc, or 0 when `(x, y)` is not
/// a FAST-9 corner.
fn fast_score(image: &GrayImage, x: u32, y: u32) -> i32 {
    let center = image.get_pixel(x, y)[0] as i16;
    let ring: [i16; 16] = CIRCLE.map(|(dx, dy)| {
        image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as i16
    });

    // Any 9-arc covers at least two of the four compass points.
    let compass = [ring[0], ring[4], ring[8], ring[12]];
    let bright = compass.iter().filter(|&&v| v > center + FAST_THRESHOLD).count();
    let dark = compass.iter().filter(|&&v| v < center - FAST_THRESHOLD).count();
    if bright < 2 && dark < 2 {
        return 0;
    }

    let mut best = 0;
    for sign in [1i16, -1] {
        let excess: [i16; 16] = ring.map(|v| sign * (v - center) - FAST_THRESHOLD);
        let mut run = 0;
        let mut longest = 0;
        for i in 0..32 {
            if excess[i % 16] > 0 {
                run += 1;
                longest = longest.max(run);
            } else {
                run = 0;
            }
        }
        if longest.min(16) >= FAST_ARC {
            let score: i32 = excess.iter().filter(|&&e| e > 0).map(|&e| e as i32).sum();
            best = best.max(score);
        }
    }
    best
}

/// Harris corner measure over a 7x7 window of Sobel gradients.
fn harris_response(image: &GrayImage, x: u32, y: u32) -> f32 {
    let px = |dx: i32, dy: i32| image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as f32;
    let (mut sxx, mut syy, mut sxy) = (0.0f32, 0.0f32, 0.0f32);
    for dy in -HARRIS_HALF_BLOCK..=HARRIS_HALF_BLOCK {
        for dx in -HARRIS_HALF_BLOCK..=HARRIS_HALF_BLOCK {
            let gx = (px(dx + 1, dy - 1) - px(dx - 1, dy - 1))
                + 2.0 * (px(dx + 1, dy) - px(dx - 1, dy))
                + (px(dx + 1, dy + 1) - px(dx - 1, dy + 1));
            let gy = (px(dx - 1, dy + 1) - px(dx - 1, dy - 1))
                + 2.0 * (px(dx, dy + 1) - px(dx, dy - 1))
                + (px(dx + 1, dy + 1) - px(dx + 1, dy - 1));
            sxx += gx * gx;
            syy += gy * gy;
            sxy += gx * gy;
        }
    }
    sxx * syy - sxy * sxy - HARRIS_K * (sxx + syy).powi(2)
}

/// Orientation of the intensity centroid within a circular patch.
fn intensity_centroid_angle(image: &GrayImage, x: u32, y: u32) -> f64 {
    let (mut m10, mut m01) = (0.0f64, 0.0f64);
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > PATCH_RADIUS * PATCH_RADIUS {
                continue;
            }
            let v = image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as f64;
            m10 += dx as f64 * v;
            m01 += dy as f64 * v;
        }
    }
    m01.atan2(m10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::textured_canvas;
    use image::Luma;

    #[test]
    fn quotas_sum_to_requested_features() {
        let quotas = level_quotas(1000);
        assert_eq!(quotas.len(), N_LEVELS as usize);
        assert_eq!(quotas.iter().sum::<usize>(), 1000);
        assert!(quotas[0] > quotas[1]);
    }

    #[test]
    fn flat_image_has_no_features() {
        let img = GrayImage::from_pixel(120, 120, Luma([40]));
        assert!(Orb::new(500).detect_and_compute(&img).is_empty());
    }

    #[test]
    fn textured_image_yields_aligned_features() {
        let img = textured_canvas(200, 160, 5);
        let features = Orb::new(300).detect_and_compute(&img);
        assert!(features.len() > 20, "only {} features", features.len());
        assert!(features.len() <= 300);
        assert_eq!(features.keypoints.len(), features.descriptors.len());
        for kp in &features.keypoints {
            assert!(kp.x >= 0.0 && kp.x < 200.0);
            assert!(kp.y >= 0.0 && kp.y < 160.0);
        }
    }

    #[test]
    fn detection_is_deterministic() {
        let img = textured_canvas(160, 120, 9);
        let a = Orb::new(200).detect_and_compute(&img);
        let b = Orb::new(200).detect_and_compute(&img);
        assert_eq!(a.descriptors, b.descriptors);
    }

    #[test]
    fn hamming_counts_differing_bits() {
        let a = Descriptor([0u8; 32]);
        let mut bits = [0u8; 32];
        bits[0] = 0b1011;
        bits[31] = 0x80;
        assert_eq!(a.hamming(&Descriptor(bits)), 4);
        assert_eq!(a.hamming(&a), 0);
    }
}
