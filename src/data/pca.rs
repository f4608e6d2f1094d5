//! Colour statistics for PCA-based stain augmentation.

use rand::Rng;

use crate::error::{Result, SolverError};
use crate::math::image_batch::ImageBatch;
use crate::math::matrix::{sample_standard_normal, Matrix};

/// Upper bound on pixels used to estimate the colour covariance.
const MAX_FIT_PIXELS: usize = 200_000;

/// Principal axes of the pixel colour distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPca {
    /// Eigenvalues of the channel covariance, descending.
    pub eigenvalues: Vec<f64>,
    /// Matching eigenvectors as columns.
    pub eigenvectors: Matrix,
}

impl ColorPca {
    /// Estimates the channel covariance over (a stride-subsample of) every
    /// pixel in `images` and decomposes it.
    pub fn fit<'a>(images: impl IntoIterator<Item = &'a ImageBatch>) -> Result<ColorPca> {
        let images: Vec<&ImageBatch> = images.into_iter().collect();
        let channels = images.first()
            .map(|b| b.channels)
            .ok_or_else(|| SolverError::dataset("cannot fit colour statistics on an empty set"))?;
        let total: usize = images.iter().map(|b| b.n * b.height * b.width).sum();
        let stride = (total / MAX_FIT_PIXELS).max(1);

        let mut sum = vec![0.0; channels];
        let mut outer = Matrix::zeros(channels, channels);
        let mut count = 0usize;
        let mut pixel = vec![0.0; channels];
        let mut seen = 0usize;
        for batch in &images {
            if batch.channels != channels {
                return Err(SolverError::dataset("images disagree on channel count"));
            }
            for i in 0..batch.n {
                for y in 0..batch.height {
                    for x in 0..batch.width {
                        seen += 1;
                        if seen % stride != 0 {
                            continue;
                        }
                        for (c, v) in pixel.iter_mut().enumerate() {
                            *v = batch.at(i, c, y, x);
                        }
                        for a in 0..channels {
                            sum[a] += pixel[a];
                            for b in 0..channels {
                                outer.data[a * channels + b] += pixel[a] * pixel[b];
                            }
                        }
                        count += 1;
                    }
                }
            }
        }
        if count < 2 {
            return Err(SolverError::dataset("too few pixels to estimate colour covariance"));
        }

        let n = count as f64;
        let mut cov = Matrix::zeros(channels, channels);
        for a in 0..channels {
            for b in 0..channels {
                let v = (outer.get(a, b) - sum[a] * sum[b] / n) / (n - 1.0);
                cov.set(a, b, v);
            }
        }
        let (eigenvalues, eigenvectors) = symmetric_eigen(&cov);
        Ok(ColorPca { eigenvalues, eigenvectors })
    }

    /// Random colour shift: `Σ_k v_k · α_k · sqrt(λ_k)` with `α_k ~ N(0, sigma)`.
    pub fn sample_shift<R: Rng + ?Sized>(&self, rng: &mut R, sigma: f64) -> Vec<f64> {
        let channels = self.eigenvectors.rows;
        let mut shift = vec![0.0; channels];
        for (k, &lambda) in self.eigenvalues.iter().enumerate() {
            let alpha = sample_standard_normal(rng) * sigma * lambda.max(0.0).sqrt();
            for (c, s) in shift.iter_mut().enumerate() {
                *s += self.eigenvectors.get(c, k) * alpha;
            }
        }
        shift
    }
}

/// Adds a per-channel offset to every pixel and clamps to [0, 1].
pub fn shift_colors(image: &ImageBatch, shift: &[f64]) -> ImageBatch {
    let plane = image.height * image.width;
    let mut out = image.clone();
    for (idx, v) in out.data.iter_mut().enumerate() {
        let c = (idx / plane) % image.channels;
        *v = (*v + shift[c]).clamp(0.0, 1.0);
    }
    out
}

/// Cyclic Jacobi eigen-decomposition of a small symmetric matrix.
/// Returns eigenvalues in descending order with eigenvectors as columns.
pub fn symmetric_eigen(m: &Matrix) -> (Vec<f64>, Matrix) {
    let n = m.rows;
    let mut a = m.clone();
    let mut v = Matrix::identity(n);

    for _sweep in 0..64 {
        let off: f64 = (0..n)
            .flat_map(|p| (0..n).filter(move |&q| q != p).map(move |q| (p, q)))
            .map(|(p, q)| a.get(p, q).powi(2))
            .sum();
        if off < 1e-24 {
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                let apq = a.get(p, q);
                if apq.abs() < 1e-300 {
                    continue;
                }
                let theta = (a.get(q, q) - a.get(p, p)) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a.get(k, p), a.get(k, q));
                    a.set(k, p, c * akp - s * akq);
                    a.set(k, q, s * akp + c * akq);
                }
                for k in 0..n {
                    let (apk, aqk) = (a.get(p, k), a.get(q, k));
                    a.set(p, k, c * apk - s * aqk);
                    a.set(q, k, s * apk + c * aqk);
                }
                for k in 0..n {
                    let (vkp, vkq) = (v.get(k, p), v.get(k, q));
                    v.set(k, p, c * vkp - s * vkq);
                    v.set(k, q, s * vkp + c * vkq);
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a.get(j, j).partial_cmp(&a.get(i, i)).unwrap_or(std::cmp::Ordering::Equal));
    let eigenvalues = order.iter().map(|&i| a.get(i, i)).collect();
    let mut vectors = Matrix::zeros(n, n);
    for (col, &i) in order.iter().enumerate() {
        for k in 0..n {
            vectors.set(k, col, v.get(k, i));
        }
    }
    (eigenvalues, vectors)
}
