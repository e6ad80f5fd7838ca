//! FastICA separation of per-region channels.
//!
//! Symmetric FastICA with the log-cosh contrast on PCA-whitened data. The
//! unmixing matrix starts at identity, so results are deterministic.
//! Directions whose variance falls below a relative floor are dropped during
//! whitening, which yields fewer components than channels for rank-deficient
//! input.

use crate::{
    constants::{EPSILON, ICA_MAX_ITERATIONS, ICA_TOLERANCE, WHITENING_EPSILON},
    utils::safe_cast::count_to_f64,
    Error, Result,
};
use log::debug;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use num_complex::Complex64;
use rustfft::FftPlanner;

/// Separated components of one window
#[derive(Debug, Clone)]
pub struct IcaResult {
    /// One row per independent component, one column per sample
    pub components: DMatrix<f64>,
    /// Fixed-point iterations run
    pub iterations: usize,
    /// Whether the unmixing matrix converged within tolerance
    pub converged: bool,
}

impl IcaResult {
    /// Number of components
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.nrows()
    }

    /// Whether no component was extracted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.nrows() == 0
    }

    /// Copy one component out as a series
    #[must_use]
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.components.row(index).iter().copied().collect()
    }
}

/// Symmetric FastICA
#[derive(Debug, Clone)]
pub struct FastIca {
    max_iterations: usize,
    tolerance: f64,
}

impl Default for FastIca {
    fn default() -> Self {
        Self {
            max_iterations: ICA_MAX_ITERATIONS,
            tolerance: ICA_TOLERANCE,
        }
    }
}

impl FastIca {
    /// Create with explicit iteration budget and tolerance
    #[must_use]
    pub const fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }

    /// Separate equally long channels into independent components
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for no channels or unequal lengths and
    /// `DegenerateSignal` when every channel is constant
    pub fn fit(&self, channels: &[Vec<f64>]) -> Result<IcaResult> {
        let m = channels.len();
        let n = channels.first().map_or(0, Vec::len);
        if m == 0 || n < 2 {
            return Err(Error::InvalidInput("ICA needs at least one channel of two samples".to_string()));
        }
        if channels.iter().any(|c| c.len() != n) {
            return Err(Error::InvalidInput("ICA channels differ in length".to_string()));
        }

        let nf = count_to_f64(n);
        let mut x = DMatrix::from_fn(m, n, |i, j| channels[i][j]);
        for mut row in x.row_iter_mut() {
            let mean = row.mean();
            row.add_scalar_mut(-mean);
        }

        let z = whiten(&x, nf)?;
        let r = z.nrows();

        let mut w = DMatrix::<f64>::identity(r, r);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;

            let wz = &w * &z;
            let g = wz.map(f64::tanh);
            let g_prime_mean = DVector::from_iterator(
                r,
                g.row_iter().map(|row| row.iter().map(|v| v.mul_add(-v, 1.0)).sum::<f64>() / nf),
            );

            let update = (&g * z.transpose()) / nf - DMatrix::from_diagonal(&g_prime_mean) * &w;
            let next = symmetric_decorrelation(update);

            let change = (&next * w.transpose())
                .diagonal()
                .iter()
                .map(|d| (d.abs() - 1.0).abs())
                .fold(0.0, f64::max);
            w = next;

            if change < self.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            debug!("FastICA stopped after {iterations} iterations without converging");
        }

        Ok(IcaResult {
            components: &w * &z,
            iterations,
            converged,
        })
    }
}

/// PCA whitening, dropping directions below the relative variance floor
fn whiten(x: &DMatrix<f64>, nf: f64) -> Result<DMatrix<f64>> {
    let covariance = (x * x.transpose()) / nf;
    let eigen = SymmetricEigen::new(covariance);

    let max_eig = eigen.eigenvalues.iter().copied().fold(0.0, f64::max);
    if !(max_eig > EPSILON) {
        return Err(Error::DegenerateSignal { std_dev: max_eig.max(0.0).sqrt() });
    }

    // Largest variance first
    let mut kept: Vec<usize> = (0..eigen.eigenvalues.len())
        .filter(|&i| eigen.eigenvalues[i] > WHITENING_EPSILON * max_eig)
        .collect();
    kept.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let k = DMatrix::from_fn(kept.len(), x.nrows(), |row, col| {
        let i = kept[row];
        eigen.eigenvectors[(col, i)] / eigen.eigenvalues[i].sqrt()
    });

    Ok(k * x)
}

/// `(W Wᵀ)^{-1/2} W`
fn symmetric_decorrelation(w: DMatrix<f64>) -> DMatrix<f64> {
    let eigen = SymmetricEigen::new(&w * w.transpose());
    let inv_sqrt = eigen.eigenvalues.map(|d| 1.0 / d.max(EPSILON).sqrt());
    let e = &eigen.eigenvectors;
    e * DMatrix::from_diagonal(&inv_sqrt) * e.transpose() * w
}

/// Index of the component with the largest share of power inside the band
///
/// Shares are taken over the non-negative frequency bins, excluding DC.
/// Ties go to the lowest index. Returns `None` for an empty result.
#[must_use]
pub fn select_pulse_component(result: &IcaResult, sample_rate: f64, low_hz: f64, high_hz: f64) -> Option<usize> {
    let n = result.components.ncols();
    if result.is_empty() || n == 0 {
        return None;
    }
    let fft = FftPlanner::new().plan_fft_forward(n);
    let nf = count_to_f64(n);

    let mut best: Option<(usize, f64)> = None;
    for (index, row) in result.components.row_iter().enumerate() {
        let mut buffer: Vec<Complex64> = row.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        fft.process(&mut buffer);

        let (in_band, total) = buffer
            .iter()
            .enumerate()
            .take(n / 2 + 1)
            .skip(1)
            .fold((0.0, 0.0), |(in_band, total), (k, c)| {
                let power = c.norm_sqr();
                let freq = count_to_f64(k) * sample_rate / nf;
                let in_band = if (low_hz..=high_hz).contains(&freq) { in_band + power } else { in_band };
                (in_band, total + power)
            });

        let share = if total > EPSILON { in_band / total } else { 0.0 };
        if best.map_or(true, |(_, s)| share > s) {
            best = Some((index, share));
        }
    }

    best.map(|(index, _)| index)
}
