//! Pyramidal Lucas–Kanade sparse optical flow.

use camera_motion_common::config::FlowConfig;
use image::GrayImage;
use nalgebra::{Matrix2, Point2, Vector2};

use super::raster::FloatImage;

/// Gradient matrices whose smaller eigenvalue (per window pixel) falls below
/// this are treated as untrackable.
const MIN_EIGEN_THRESHOLD: f64 = 1e-4;

/// Smallest side a pyramid level may have.
const MIN_LEVEL_SIDE: usize = 8;

pub struct LucasKanade {
    half_window: isize,
    pyramid_levels: usize,
    max_iterations: usize,
    epsilon: f64,
}

struct Level {
    prev: FloatImage,
    grad_x: FloatImage,
    grad_y: FloatImage,
    next: FloatImage,
}

impl LucasKanade {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            half_window: (config.window_size.max(3) / 2) as isize,
            pyramid_levels: config.pyramid_levels,
            max_iterations: config.max_iterations.max(1),
            epsilon: config.epsilon,
        }
    }

    /// Track `points` from `prev` into `next`. `None` marks a point that could
    /// not be tracked.
    pub fn track(
        &self,
        prev: &GrayImage,
        next: &GrayImage,
        points: &[Point2<f64>],
    ) -> Vec<Option<Point2<f64>>> {
        if prev.dimensions() != next.dimensions() {
            return vec![None; points.len()];
        }
        let levels = self.build_levels(prev, next);
        points.iter().map(|p| self.track_point(&levels, *p)).collect()
    }

    fn build_levels(&self, prev: &GrayImage, next: &GrayImage) -> Vec<Level> {
        let mut prev_img = FloatImage::from_gray(prev);
        let mut next_img = FloatImage::from_gray(next);
        let mut levels = Vec::with_capacity(self.pyramid_levels + 1);
        loop {
            let (grad_x, grad_y) = prev_img.scharr_gradients();
            let can_shrink = levels.len() < self.pyramid_levels
                && prev_img.width() / 2 >= MIN_LEVEL_SIDE
                && prev_img.height() / 2 >= MIN_LEVEL_SIDE;
            let (smaller_prev, smaller_next) = if can_shrink {
                (Some(prev_img.pyr_down()), Some(next_img.pyr_down()))
            } else {
                (None, None)
            };
            levels.push(Level {
                prev: prev_img,
                grad_x,
                grad_y,
                next: next_img,
            });
            match (smaller_prev, smaller_next) {
                (Some(p), Some(n)) => {
                    prev_img = p;
                    next_img = n;
                }
                _ => break,
            }
        }
        levels
    }

    fn track_point(&self, levels: &[Level], point: Point2<f64>) -> Option<Point2<f64>> {
        let base = &levels[0].prev;
        if !inside(base, point, 0.0) {
            return None;
        }

        let window = (2 * self.half_window + 1).pow(2) as usize;
        let mut template = Vec::with_capacity(window);
        let mut guess = Vector2::zeros();

        for (depth, level) in levels.iter().enumerate().rev() {
            let scale = (1u32 << depth) as f64;
            let p = Point2::new(point.x / scale, point.y / scale);

            template.clear();
            let mut g = Matrix2::<f64>::zeros();
            for dy in -self.half_window..=self.half_window {
                for dx in -self.half_window..=self.half_window {
                    let (x, y) = (p.x + dx as f64, p.y + dy as f64);
                    let ix = level.grad_x.sample(x, y) as f64;
                    let iy = level.grad_y.sample(x, y) as f64;
                    template.push((level.prev.sample(x, y) as f64, ix, iy));
                    g[(0, 0)] += ix * ix;
                    g[(0, 1)] += ix * iy;
                    g[(1, 1)] += iy * iy;
                }
            }
            g[(1, 0)] = g[(0, 1)];

            let half_trace = 0.5 * (g[(0, 0)] + g[(1, 1)]);
            let disc = (0.25 * (g[(0, 0)] - g[(1, 1)]).powi(2) + g[(0, 1)].powi(2)).sqrt();
            let min_eigen = (half_trace - disc) / window as f64;
            let g_inv = match g.try_inverse() {
                Some(inv) if min_eigen >= MIN_EIGEN_THRESHOLD => inv,
                // Coarse levels may be featureless; carry the guess down.
                _ if depth > 0 => {
                    guess *= 2.0;
                    continue;
                }
                _ => return None,
            };

            let mut step = Vector2::zeros();
            for _ in 0..self.max_iterations {
                let q = p + guess + step;
                if !inside(&level.next, q, self.half_window as f64) {
                    return None;
                }
                let mut mismatch = Vector2::<f64>::zeros();
                let mut k = 0;
                for dy in -self.half_window..=self.half_window {
                    for dx in -self.half_window..=self.half_window {
                        let (i, ix, iy) = template[k];
                        k += 1;
                        let j = level.next.sample(q.x + dx as f64, q.y + dy as f64) as f64;
                        let diff = i - j;
                        mismatch.x += diff * ix;
                        mismatch.y += diff * iy;
                    }
                }
                let delta = g_inv * mismatch;
                step += delta;
                if delta.norm_squared() <= self.epsilon * self.epsilon {
                    break;
                }
            }

            if depth > 0 {
                guess = (guess + step) * 2.0;
            } else {
                let tracked = p + guess + step;
                return inside(base, tracked, 0.0).then_some(tracked);
            }
        }
        None
    }
}

/// Whether `p` lies within the raster, allowing `margin` pixels outside.
fn inside(image: &FloatImage, p: Point2<f64>, margin: f64) -> bool {
    p.x >= -margin
        && p.y >= -margin
        && p.x <= image.width() as f64 - 1.0 + margin
        && p.y <= image.height() as f64 - 1.0 + margin
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{shifted_pair, textured_canvas};
    use image::Luma;

    #[test]
    fn identical_frames_have_zero_flow() {
        let img = textured_canvas(96, 96, 3);
        let lk = LucasKanade::new(&FlowConfig::default());
        let points = [Point2::new(40.0, 40.0), Point2::new(60.0, 30.0)];
        for (p, tracked) in points.iter().zip(lk.track(&img, &img, &points)) {
            let tracked = tracked.unwrap();
            assert!((tracked - p).norm() < 1e-6);
        }
    }

    #[test]
    fn recovers_uniform_translation() {
        let (prev, next) = shifted_pair(160, 120, 6, 3, 11);
        let lk = LucasKanade::new(&FlowConfig::default());
        let points: Vec<_> = [(50.0, 50.0), (80.0, 60.0), (110.0, 70.0)]
            .iter()
            .map(|&(x, y)| Point2::new(x, y))
            .collect();
        for (p, tracked) in points.iter().zip(lk.track(&prev, &next, &points)) {
            let d = tracked.unwrap() - p;
            assert!((d.x + 6.0).abs() < 0.5, "dx = {}", d.x);
            assert!((d.y + 3.0).abs() < 0.5, "dy = {}", d.y);
        }
    }

    #[test]
    fn flat_region_is_untrackable() {
        let img = GrayImage::from_pixel(64, 64, Luma([90]));
        let lk = LucasKanade::new(&FlowConfig::default());
        assert_eq!(lk.track(&img, &img, &[Point2::new(32.0, 32.0)]), vec![None]);
    }

    #[test]
    fn points_outside_the_frame_fail() {
        let img = textured_canvas(64, 64, 1);
        let lk = LucasKanade::new(&FlowConfig::default());
        assert_eq!(lk.track(&img, &img, &[Point2::new(-3.0, 10.0)]), vec![None]);
    }
}
