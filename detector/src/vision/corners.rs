//! Shi–Tomasi "good features to track".

use image::GrayImage;
use nalgebra::Point2;

use super::raster::FloatImage;

/// Detect up to `max_corners` corners ranked by the minimum eigenvalue of the
/// 3x3 structure tensor.
///
/// Corners weaker than `quality_level` times the strongest response are
/// dropped, only 3x3 local maxima survive, and a corner closer than
/// `min_distance` to a stronger accepted corner is discarded. `max_corners == 0`
/// means no limit.
pub fn good_features_to_track(
    image: &GrayImage,
    max_corners: usize,
    quality_level: f64,
    min_distance: f64,
) -> Vec<Point2<f64>> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if width < 3 || height < 3 {
        return Vec::new();
    }

    let response = min_eigen_response(&FloatImage::from_gray(image));
    let max_response = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| response.get(x, y))
        .fold(0.0f32, f32::max);
    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = (max_response as f64 * quality_level) as f32;

    let mut candidates = Vec::new();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let r = response.get(x, y);
            if r <= threshold || r <= 0.0 {
                continue;
            }
            let is_peak = (-1isize..=1).all(|dy| {
                (-1isize..=1).all(|dx| response.get_clamped(x as isize + dx, y as isize + dy) <= r)
            });
            if is_peak {
                candidates.push((x, y, r));
            }
        }
    }
    // Stable sort keeps raster order among equal responses.
    candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut grid = MinDistanceGrid::new(width, height, min_distance);
    let mut corners = Vec::new();
    for (x, y, _) in candidates {
        if max_corners > 0 && corners.len() >= max_corners {
            break;
        }
        let p = Point2::new(x as f64, y as f64);
        if grid.try_insert(p) {
            corners.push(p);
        }
    }
    corners
}

/// Minimum eigenvalue of the gradient covariance summed over a 3x3 block.
fn min_eigen_response(image: &FloatImage) -> FloatImage {
    let (gx, gy) = image.sobel_gradients();
    let (width, height) = (image.width(), image.height());
    let mut out = FloatImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let (mut sxx, mut syy, mut sxy) = (0.0f64, 0.0f64, 0.0f64);
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    let ix = gx.get_clamped(x as isize + dx, y as isize + dy) as f64;
                    let iy = gy.get_clamped(x as isize + dx, y as isize + dy) as f64;
                    sxx += ix * ix;
                    syy += iy * iy;
                    sxy += ix * iy;
                }
            }
            let half_trace = 0.5 * (sxx + syy);
            let disc = (0.25 * (sxx - syy).powi(2) + sxy * sxy).sqrt();
            out.set(x, y, (half_trace - disc).max(0.0) as f32);
        }
    }
    out
}

/// Bucketed accepted corners so the distance check only visits nearby cells.
struct MinDistanceGrid {
    cell: f64,
    cols: usize,
    rows: usize,
    min_dist_sq: f64,
    cells: Vec<Vec<Point2<f64>>>,
}

impl MinDistanceGrid {
    fn new(width: usize, height: usize, min_distance: f64) -> Self {
        let cell = min_distance.max(1.0);
        let cols = ((width as f64) / cell).ceil() as usize + 1;
        let rows = ((height as f64) / cell).ceil() as usize + 1;
        Self {
            cell,
            cols,
            rows,
            min_dist_sq: min_distance.max(0.0).powi(2),
            cells: vec![Vec::new(); cols * rows],
        }
    }

    fn try_insert(&mut self, p: Point2<f64>) -> bool {
        let cx = (p.x / self.cell) as usize;
        let cy = (p.y / self.cell) as usize;
        for y in cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1) {
            for x in cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1) {
                let crowded = self.cells[y * self.cols + x]
                    .iter()
                    .any(|q| (p - q).norm_squared() < self.min_dist_sq);
                if crowded {
                    return false;
                }
            }
        }
        self.cells[cy * self.cols + cx].push(p);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn checkerboard() -> GrayImage {
        GrayImage::from_fn(60, 60, |x, y| {
            if ((x / 15) + (y / 15)) % 2 == 0 {
                Luma([230])
            } else {
                Luma([20])
            }
        })
    }

    #[test]
    fn uniform_image_has_no_corners() {
        let img = GrayImage::from_pixel(40, 40, Luma([128]));
        assert!(good_features_to_track(&img, 100, 0.01, 5.0).is_empty());
    }

    #[test]
    fn finds_checkerboard_junctions() {
        let corners = good_features_to_track(&checkerboard(), 100, 0.01, 5.0);
        assert!(!corners.is_empty());
        // Every interior junction sits near a multiple of 15.
        let near_junction = |v: f64| {
            let r = v % 15.0;
            r <= 2.0 || r >= 13.0
        };
        assert!(corners.iter().all(|p| near_junction(p.x) && near_junction(p.y)));
    }

    #[test]
    fn respects_max_corners() {
        assert!(good_features_to_track(&checkerboard(), 3, 0.01, 1.0).len() <= 3);
    }

    #[test]
    fn respects_min_distance() {
        let corners = good_features_to_track(&checkerboard(), 0, 0.001, 10.0);
        for (i, a) in corners.iter().enumerate() {
            for b in &corners[i + 1..] {
                assert!((a - b).norm() >= 10.0);
            }
        }
    }

    #[test]
    fn higher_quality_level_keeps_fewer_corners() {
        let low = good_features_to_track(&checkerboard(), 0, 0.001, 3.0);
        let high = good_features_to_track(&checkerboard(), 0, 0.5, 3.0);
        assert!(low.len() >= high.len());
    }
}
