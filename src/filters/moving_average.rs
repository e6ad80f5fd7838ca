use super::SignalFilter;
use crate::{utils::safe_cast::count_to_f64, Error, Result};

/// Subtracts a centred moving average from each sample
///
/// Near the window edges the average covers only the samples that exist.
/// Runs in linear time with a running sum.
pub struct MovingAverageDetrend {
    window_size: usize,
}

impl MovingAverageDetrend {
    /// Create a detrend with an odd averaging window
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an even or zero window size
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size == 0 || window_size % 2 == 0 {
            return Err(Error::ConfigError(format!(
                "Moving average window must be odd and positive, got {window_size}"
            )));
        }
        Ok(Self { window_size })
    }
}

impl SignalFilter for MovingAverageDetrend {
    fn apply(&self, signal: &[f64]) -> Result<Vec<f64>> {
        let mut out = Vec::new();
        out.try_reserve_exact(signal.len())?;

        let n = signal.len();
        let half = self.window_size / 2;

        // Running sum over signal[lo..hi]
        let mut sum = 0.0;
        let mut lo = 0;
        let mut hi = 0;
        for (i, &value) in signal.iter().enumerate() {
            let want_hi = (i + half + 1).min(n);
            let want_lo = i.saturating_sub(half);
            while hi < want_hi {
                sum += signal[hi];
                hi += 1;
            }
            while lo < want_lo {
                sum -= signal[lo];
                lo += 1;
            }
            out.push(value - sum / count_to_f64(hi - lo));
        }

        Ok(out)
    }

    fn name(&self) -> &str {
        "MovingAverageDetrend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_even_window() {
        assert!(MovingAverageDetrend::new(4).is_err());
        assert!(MovingAverageDetrend::new(0).is_err());
        assert!(MovingAverageDetrend::new(5).is_ok());
    }

    #[test]
    fn test_moving_average() {
        let filter = MovingAverageDetrend::new(3).unwrap();
        let out = filter.apply(&[10.0, 20.0, 30.0, 40.0]).unwrap();

        // Edge windows are truncated: [10,20] and [30,40]
        assert_eq!(out[0], 10.0 - 15.0);
        assert_eq!(out[1], 20.0 - 20.0);
        assert_eq!(out[2], 30.0 - 30.0);
        assert_eq!(out[3], 40.0 - 35.0);
    }

    #[test]
    fn test_constant_becomes_zero() {
        let filter = MovingAverageDetrend::new(31).unwrap();
        let out = filter.apply(&[4.2; 150]).unwrap();
        assert!(out.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_window_larger_than_signal() {
        let filter = MovingAverageDetrend::new(101).unwrap();
        let out = filter.apply(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(out, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_removes_slow_drift_keeps_fast_oscillation() {
        // Window of 15 spans exactly three periods of the fast component
        let filter = MovingAverageDetrend::new(15).unwrap();
        let signal: Vec<f64> = (0..150)
            .map(|i| {
                let t = f64::from(i);
                0.05 * t + (2.0 * std::f64::consts::PI * t / 5.0).sin()
            })
            .collect();
        let out = filter.apply(&signal).unwrap();
        for i in 10..140 {
            let expected = (2.0 * std::f64::consts::PI * f64::from(i as u32) / 5.0).sin();
            assert!((out[i] - expected).abs() < 1e-9, "sample {i}");
        }
    }
}
