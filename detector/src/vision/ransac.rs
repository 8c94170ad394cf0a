//! Random sample consensus over point correspondences.

use camera_motion_common::config::RansacConfig;
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use tracing::trace;

/// A point in the previous frame and where it was found in the current one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub src: Point2<f64>,
    pub dst: Point2<f64>,
}

impl Correspondence {
    pub fn new(src: Point2<f64>, dst: Point2<f64>) -> Self {
        Self { src, dst }
    }
}

/// A model family RANSAC can fit.
pub trait RobustModel {
    type Model: Clone;

    /// Correspondences needed for a minimal fit.
    fn min_sample_size(&self) -> usize;

    /// Least-squares fit; `None` for degenerate input.
    fn estimate(&self, data: &[Correspondence]) -> Option<Self::Model>;

    /// Reprojection error of one correspondence, in pixels.
    fn error(&self, model: &Self::Model, c: &Correspondence) -> f64;
}

#[derive(Debug, Clone)]
pub struct RansacFit<M> {
    pub model: M,
    /// Inlier mask, index-aligned with the input correspondences.
    pub inliers: Vec<bool>,
}

impl<M> RansacFit<M> {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&i| i).count()
    }

    pub fn outlier_count(&self) -> usize {
        self.inliers.len() - self.inlier_count()
    }
}

/// Fit `estimator` to `data`, refining the best consensus set with a final
/// least-squares fit over its inliers. Sampling is seeded from `config.seed`.
pub fn run<E: RobustModel>(
    estimator: &E,
    data: &[Correspondence],
    config: &RansacConfig,
) -> Option<RansacFit<E::Model>> {
    let sample_size = estimator.min_sample_size();
    if data.len() < sample_size || sample_size == 0 {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut subset = Vec::with_capacity(sample_size);
    let mut best: Option<(E::Model, Vec<bool>, usize)> = None;
    let mut max_iterations = config.max_iterations;
    let mut iteration = 0;

    while iteration < max_iterations {
        iteration += 1;
        subset.clear();
        subset.extend(index::sample(&mut rng, data.len(), sample_size).iter().map(|i| data[i]));

        let Some(model) = estimator.estimate(&subset) else {
            continue;
        };
        let (mask, count) = consensus(estimator, &model, data, config.reproj_threshold);
        if best.as_ref().is_some_and(|(_, _, best_count)| count <= *best_count) {
            continue;
        }
        let outlier_ratio = (data.len() - count) as f64 / data.len() as f64;
        max_iterations = max_iterations.min(update_iterations(
            config.confidence,
            outlier_ratio,
            sample_size,
            max_iterations,
        ));
        best = Some((model, mask, count));
    }

    let (model, mask, count) = best?;
    trace!(iterations = iteration, inliers = count, total = data.len(), "RANSAC finished");

    let inlier_data: Vec<Correspondence> = data
        .iter()
        .zip(&mask)
        .filter_map(|(c, &inlier)| inlier.then_some(*c))
        .collect();
    if let Some(refined) = estimator.estimate(&inlier_data) {
        let (refined_mask, refined_count) = consensus(estimator, &refined, data, config.reproj_threshold);
        if refined_count >= count {
            return Some(RansacFit {
                model: refined,
                inliers: refined_mask,
            });
        }
    }
    Some(RansacFit {
        model,
        inliers: mask,
    })
}

fn consensus<E: RobustModel>(
    estimator: &E,
    model: &E::Model,
    data: &[Correspondence],
    threshold: f64,
) -> (Vec<bool>, usize) {
    let mask: Vec<bool> = data.iter().map(|c| estimator.error(model, c) <= threshold).collect();
    let count = mask.iter().filter(|&&i| i).count();
    (mask, count)
}

/// Iterations needed to draw one all-inlier sample with probability
/// `confidence`, given the current outlier ratio. Never exceeds `max_iterations`.
fn update_iterations(confidence: f64, outlier_ratio: f64, sample_size: usize, max_iterations: usize) -> usize {
    let confidence = confidence.clamp(0.0, 1.0);
    let outlier_ratio = outlier_ratio.clamp(0.0, 1.0);

    let num = (1.0 - confidence).max(f64::MIN_POSITIVE);
    let denom = 1.0 - (1.0 - outlier_ratio).powi(sample_size as i32);
    if denom < f64::MIN_POSITIVE {
        return 0;
    }
    let (num, denom) = (num.ln(), denom.ln());
    if denom >= 0.0 || -num >= max_iterations as f64 * -denom {
        max_iterations
    } else {
        (num / denom).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pure translation, the simplest model to exercise the loop with.
    struct Shift;

    impl RobustModel for Shift {
        type Model = (f64, f64);

        fn min_sample_size(&self) -> usize {
            1
        }

        fn estimate(&self, data: &[Correspondence]) -> Option<(f64, f64)> {
            let n = data.len() as f64;
            let (sx, sy) = data
                .iter()
                .fold((0.0, 0.0), |(sx, sy), c| (sx + c.dst.x - c.src.x, sy + c.dst.y - c.src.y));
            Some((sx / n, sy / n))
        }

        fn error(&self, model: &(f64, f64), c: &Correspondence) -> f64 {
            ((c.src.x + model.0 - c.dst.x).powi(2) + (c.src.y + model.1 - c.dst.y).powi(2)).sqrt()
        }
    }

    fn shifted(points: usize, dx: f64, dy: f64) -> Vec<Correspondence> {
        (0..points)
            .map(|i| {
                let src = Point2::new((i * 7 % 53) as f64, (i * 13 % 41) as f64);
                Correspondence::new(src, Point2::new(src.x + dx, src.y + dy))
            })
            .collect()
    }

    #[test]
    fn rejects_outliers() {
        let mut data = shifted(30, 4.0, -2.0);
        for c in data.iter_mut().take(8) {
            c.dst.x += 40.0;
        }
        let fit = run(&Shift, &data, &RansacConfig::default()).unwrap();
        assert_eq!(fit.inlier_count(), 22);
        assert_eq!(fit.outlier_count(), 8);
        assert!((fit.model.0 - 4.0).abs() < 1e-9);
        assert!((fit.model.1 + 2.0).abs() < 1e-9);
        assert!(fit.inliers[8..].iter().all(|&i| i));
    }

    #[test]
    fn too_few_points_fails() {
        struct NeedsThree;
        impl RobustModel for NeedsThree {
            type Model = ();
            fn min_sample_size(&self) -> usize {
                3
            }
            fn estimate(&self, _: &[Correspondence]) -> Option<()> {
                Some(())
            }
            fn error(&self, _: &(), _: &Correspondence) -> f64 {
                0.0
            }
        }
        assert!(run(&NeedsThree, &shifted(2, 0.0, 0.0), &RansacConfig::default()).is_none());
    }

    #[test]
    fn same_seed_same_result() {
        let mut data = shifted(40, 1.5, 0.5);
        for c in data.iter_mut().step_by(3) {
            c.dst.y -= 25.0;
        }
        let config = RansacConfig::default();
        let a = run(&Shift, &data, &config).unwrap();
        let b = run(&Shift, &data, &config).unwrap();
        assert_eq!(a.inliers, b.inliers);
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn iteration_bound_shrinks_with_inliers() {
        assert_eq!(update_iterations(0.99, 0.0, 4, 2000), 0);
        let half = update_iterations(0.99, 0.5, 4, 2000);
        assert!(half > 50 && half < 100, "got {}", half);
        assert_eq!(update_iterations(0.99, 0.999, 4, 2000), 2000);
    }
}
