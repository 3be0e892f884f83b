//! Planar homography estimation.
//!
//! Normalized DLT on four or more correspondences, wrapped in a seeded RANSAC
//! loop that refits on the final inlier set.

use nalgebra::{DMatrix, Matrix3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HomographyError {
    #[error("too few correspondences: need 4, got {0}")]
    TooFewPoints(usize),
    #[error("degenerate point configuration")]
    Degenerate,
    #[error("only {found} inliers, need {needed}")]
    InsufficientInliers { needed: usize, found: usize },
}

/// A 3×3 projective transform mapping source points to destination points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography(pub Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Homography(Matrix3::identity())
    }

    /// Maps a point; `None` when it lands on the line at infinity.
    pub fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let p = self.0 * Vector3::new(x, y, 1.0);
        if p[2].abs() < 1e-12 {
            return None;
        }
        Some((p[0] / p[2], p[1] / p[2]))
    }

    pub fn inverse(&self) -> Option<Homography> {
        self.0.try_inverse().map(|m| Homography(normalize_scale(m)))
    }

    /// Distance between the projection of `src` and `dst`.
    pub fn transfer_error(&self, src: [f64; 2], dst: [f64; 2]) -> f64 {
        match self.project(src[0], src[1]) {
            Some((u, v)) => ((u - dst[0]).powi(2) + (v - dst[1]).powi(2)).sqrt(),
            None => f64::INFINITY,
        }
    }

    /// Row-major coefficients as `f32`.
    pub fn to_row_major_f32(&self) -> [f32; 9] {
        let m = &self.0;
        [
            m[(0, 0)] as f32,
            m[(0, 1)] as f32,
            m[(0, 2)] as f32,
            m[(1, 0)] as f32,
            m[(1, 1)] as f32,
            m[(1, 2)] as f32,
            m[(2, 0)] as f32,
            m[(2, 1)] as f32,
            m[(2, 2)] as f32,
        ]
    }
}

fn normalize_scale(m: Matrix3<f64>) -> Matrix3<f64> {
    let s = m[(2, 2)];
    if s.abs() < 1e-12 { m } else { m / s }
}

/// Similarity transform moving the centroid to the origin with mean
/// distance sqrt(2).
fn conditioning(points: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let spread = points
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if spread > 1e-12 {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let conditioned = points
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();
    (t, conditioned)
}

/// Direct linear transform from `src` to `dst`.
pub fn estimate_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Homography, HomographyError> {
    let n = src.len().min(dst.len());
    if n < 4 {
        return Err(HomographyError::TooFewPoints(n));
    }

    let (t_src, s) = conditioning(&src[..n]);
    let (t_dst, d) = conditioning(&dst[..n]);

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for i in 0..n {
        let [sx, sy] = s[i];
        let [dx, dy] = d[i];
        let r = 2 * i;
        a[(r, 3)] = -sx;
        a[(r, 4)] = -sy;
        a[(r, 5)] = -1.0;
        a[(r, 6)] = dy * sx;
        a[(r, 7)] = dy * sy;
        a[(r, 8)] = dy;
        a[(r + 1, 0)] = sx;
        a[(r + 1, 1)] = sy;
        a[(r + 1, 2)] = 1.0;
        a[(r + 1, 6)] = -dx * sx;
        a[(r + 1, 7)] = -dx * sy;
        a[(r + 1, 8)] = -dx;
    }

    // Null vector of A is the eigenvector of AᵀA with the smallest eigenvalue.
    let eig = nalgebra::SymmetricEigen::new(a.transpose() * &a);
    let (min_idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))
        .ok_or(HomographyError::Degenerate)?;
    let h = eig.eigenvectors.column(min_idx);
    let h_cond = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst.try_inverse().ok_or(HomographyError::Degenerate)?;
    let m = normalize_scale(t_dst_inv * h_cond * t_src);
    if m.iter().any(|v| !v.is_finite()) {
        return Err(HomographyError::Degenerate);
    }
    Ok(Homography(m))
}

#[derive(Clone, Debug)]
pub struct RansacParams {
    pub max_iters: usize,
    /// Inlier threshold on the transfer error, in pixels.
    pub threshold: f64,
    pub min_inliers: usize,
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            threshold: 5.0,
            min_inliers: 4,
            seed: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RansacFit {
    pub homography: Homography,
    pub inliers: Vec<bool>,
    pub inlier_count: usize,
}

/// Robust homography fit. Deterministic for a given seed.
pub fn fit_ransac(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    params: &RansacParams,
) -> Result<RansacFit, HomographyError> {
    let n = src.len().min(dst.len());
    if n < 4 {
        return Err(HomographyError::TooFewPoints(n));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let count_inliers = |h: &Homography| -> Vec<bool> {
        (0..n)
            .map(|i| h.transfer_error(src[i], dst[i]) < params.threshold)
            .collect()
    };

    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    for _ in 0..params.max_iters {
        let sample = sample_distinct(&mut rng, n);
        let s: Vec<[f64; 2]> = sample.iter().map(|&i| src[i]).collect();
        let d: Vec<[f64; 2]> = sample.iter().map(|&i| dst[i]).collect();
        let Ok(h) = estimate_dlt(&s, &d) else {
            continue;
        };

        let mask = count_inliers(&h);
        let count = mask.iter().filter(|&&m| m).count();
        if best.as_ref().is_none_or(|b| count > b.2) {
            best = Some((h, mask, count));
            if count * 10 > n * 9 {
                break;
            }
        }
    }

    let (h, mask, count) = best.ok_or(HomographyError::Degenerate)?;
    if count < params.min_inliers {
        return Err(HomographyError::InsufficientInliers {
            needed: params.min_inliers,
            found: count,
        });
    }

    let in_src: Vec<[f64; 2]> = (0..n).filter(|&i| mask[i]).map(|i| src[i]).collect();
    let in_dst: Vec<[f64; 2]> = (0..n).filter(|&i| mask[i]).map(|i| dst[i]).collect();
    let refit = estimate_dlt(&in_src, &in_dst).unwrap_or(h);

    let inliers = count_inliers(&refit);
    let inlier_count = inliers.iter().filter(|&&m| m).count();
    Ok(RansacFit {
        homography: refit,
        inliers,
        inlier_count,
    })
}

fn sample_distinct(rng: &mut StdRng, n: usize) -> [usize; 4] {
    let mut picked = [usize::MAX; 4];
    let mut filled = 0;
    while filled < 4 {
        let i = rng.gen_range(0..n);
        if !picked[..filled].contains(&i) {
            picked[filled] = i;
            filled += 1;
        }
    }
    picked
}
