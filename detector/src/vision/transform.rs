//! Global motion models fitted between consecutive frames.

use nalgebra::{Matrix3, Point2, SMatrix, SVector, SymmetricEigen, Vector3};

use super::ransac::{Correspondence, RobustModel};

const EPS: f64 = 1e-10;

/// 4-DOF similarity (rotation, uniform scale, translation):
/// `u = a*x - b*y + tx`, `v = b*x + a*y + ty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub a: f64,
    pub b: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Similarity {
    pub const IDENTITY: Similarity = Similarity {
        a: 1.0,
        b: 0.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Closed-form least-squares fit. Needs two distinct source points.
    pub fn fit(data: &[Correspondence]) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }
        let n = data.len() as f64;
        let (mut sx, mut sy, mut su, mut sv) = (0.0, 0.0, 0.0, 0.0);
        for c in data {
            sx += c.src.x;
            sy += c.src.y;
            su += c.dst.x;
            sv += c.dst.y;
        }
        let (mx, my, mu, mv) = (sx / n, sy / n, su / n, sv / n);

        let (mut norm, mut dot, mut cross) = (0.0, 0.0, 0.0);
        for c in data {
            let (x, y) = (c.src.x - mx, c.src.y - my);
            let (u, v) = (c.dst.x - mu, c.dst.y - mv);
            norm += x * x + y * y;
            dot += x * u + y * v;
            cross += x * v - y * u;
        }
        if norm < EPS {
            return None;
        }
        let a = dot / norm;
        let b = cross / norm;
        Some(Self {
            a,
            b,
            tx: mu - (a * mx - b * my),
            ty: mv - (b * mx + a * my),
        })
    }

    pub fn apply(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.a * p.x - self.b * p.y + self.tx,
            self.b * p.x + self.a * p.y + self.ty,
        )
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.b.atan2(self.a).to_degrees()
    }

    /// Translation magnitude plus absolute rotation in degrees. Scale is ignored.
    pub fn motion_score(&self) -> f64 {
        self.tx.hypot(self.ty) + self.rotation_degrees().abs()
    }
}

pub struct SimilarityEstimator;

impl RobustModel for SimilarityEstimator {
    type Model = Similarity;

    fn min_sample_size(&self) -> usize {
        2
    }

    fn estimate(&self, data: &[Correspondence]) -> Option<Similarity> {
        Similarity::fit(data)
    }

    fn error(&self, model: &Similarity, c: &Correspondence) -> f64 {
        nalgebra::distance(&model.apply(&c.src), &c.dst)
    }
}

/// Projective transform normalised so that `H[(2, 2)] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(pub Matrix3<f64>);

impl Homography {
    /// Normalised DLT over at least four correspondences.
    pub fn fit(data: &[Correspondence]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        if data.len() == 4 && (has_collinear_triple(data, |c| c.src) || has_collinear_triple(data, |c| c.dst)) {
            return None;
        }
        let src_norm = normalisation(data.iter().map(|c| c.src))?;
        let dst_norm = normalisation(data.iter().map(|c| c.dst))?;

        let mut ata = SMatrix::<f64, 9, 9>::zeros();
        for c in data {
            let s = src_norm.transform(&c.src);
            let d = dst_norm.transform(&c.dst);
            let rows = [
                SVector::<f64, 9>::from_column_slice(&[
                    -s.x, -s.y, -1.0, 0.0, 0.0, 0.0, d.x * s.x, d.x * s.y, d.x,
                ]),
                SVector::<f64, 9>::from_column_slice(&[
                    0.0, 0.0, 0.0, -s.x, -s.y, -1.0, d.y * s.x, d.y * s.y, d.y,
                ]),
            ];
            for r in rows {
                ata += r * r.transpose();
            }
        }

        let eigen = SymmetricEigen::new(ata);
        let h = eigen.eigenvectors.column(eigen.eigenvalues.imin());
        let normalised = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
        let m = dst_norm.inverse() * normalised * src_norm.matrix();

        let scale = m[(2, 2)];
        if scale.abs() < EPS {
            return None;
        }
        let m = m / scale;
        m.iter().all(|v| v.is_finite()).then_some(Self(m))
    }

    /// Maps `p`; `None` when it lands on the line at infinity.
    pub fn apply(&self, p: &Point2<f64>) -> Option<Point2<f64>> {
        let q = self.0 * Vector3::new(p.x, p.y, 1.0);
        (q.z.abs() > EPS).then(|| Point2::new(q.x / q.z, q.y / q.z))
    }

    pub fn translation(&self) -> (f64, f64) {
        (self.0[(0, 2)], self.0[(1, 2)])
    }

    /// Magnitude of the translation column.
    pub fn motion_score(&self) -> f64 {
        let (tx, ty) = self.translation();
        tx.hypot(ty)
    }
}

pub struct HomographyEstimator;

impl RobustModel for HomographyEstimator {
    type Model = Homography;

    fn min_sample_size(&self) -> usize {
        4
    }

    fn estimate(&self, data: &[Correspondence]) -> Option<Homography> {
        Homography::fit(data)
    }

    fn error(&self, model: &Homography, c: &Correspondence) -> f64 {
        model
            .apply(&c.src)
            .map_or(f64::INFINITY, |p| nalgebra::distance(&p, &c.dst))
    }
}

/// Similarity moving the centroid to the origin with mean distance sqrt(2).
struct Normalisation {
    scale: f64,
    cx: f64,
    cy: f64,
}

impl Normalisation {
    fn transform(&self, p: &Point2<f64>) -> Point2<f64> {
        Point2::new((p.x - self.cx) * self.scale, (p.y - self.cy) * self.scale)
    }

    fn matrix(&self) -> Matrix3<f64> {
        let s = self.scale;
        Matrix3::new(s, 0.0, -s * self.cx, 0.0, s, -s * self.cy, 0.0, 0.0, 1.0)
    }

    fn inverse(&self) -> Matrix3<f64> {
        let s = 1.0 / self.scale;
        Matrix3::new(s, 0.0, self.cx, 0.0, s, self.cy, 0.0, 0.0, 1.0)
    }
}

fn normalisation(points: impl Iterator<Item = Point2<f64>> + Clone) -> Option<Normalisation> {
    let n = points.clone().count() as f64;
    let (sx, sy) = points.clone().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);
    let mean_dist = points.map(|p| (p.x - cx).hypot(p.y - cy)).sum::<f64>() / n;
    if mean_dist < EPS {
        return None;
    }
    Some(Normalisation {
        scale: std::f64::consts::SQRT_2 / mean_dist,
        cx,
        cy,
    })
}

fn has_collinear_triple(data: &[Correspondence], pick: impl Fn(&Correspondence) -> Point2<f64>) -> bool {
    let pts: Vec<Point2<f64>> = data.iter().map(pick).collect();
    for i in 0..pts.len() {
        for j in i + 1..pts.len() {
            for k in j + 1..pts.len() {
                let (a, b, c) = (pts[i], pts[j], pts[k]);
                let area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
                let scale = (b - a).norm() * (c - a).norm();
                if area.abs() <= 1e-6 * scale.max(EPS) {
                    return true;
                }
            }
        }
    }
    false
}
