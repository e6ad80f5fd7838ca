//! Window conditioning: detrend, then standardize.

use crate::{
    config::SignalConfig,
    filters::{create_detrend, SignalFilter},
    utils::calculate_stats,
    Result,
};
use ndarray::Array1;

/// A detrended, standardized window
#[derive(Debug, Clone)]
pub struct ConditionedSignal {
    /// Zero mean, unit variance samples (all zero when degenerate)
    pub values: Array1<f64>,
    /// Standard deviation of the detrended window
    pub std_dev: f64,
    /// Set when `std_dev` fell below the floor
    pub degenerate: bool,
}

impl ConditionedSignal {
    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the signal holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Detrends and standardizes windows
pub struct SignalConditioner {
    detrend: Box<dyn SignalFilter>,
    epsilon: f64,
}

impl SignalConditioner {
    /// Create a conditioner with the configured detrend method
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the detrend parameters are invalid
    pub fn new(config: &SignalConfig) -> Result<Self> {
        Ok(Self {
            detrend: create_detrend(config)?,
            epsilon: config.degenerate_epsilon,
        })
    }

    /// Name of the detrend filter in use
    #[must_use]
    pub fn detrend_name(&self) -> &str {
        self.detrend.name()
    }

    /// Condition one window
    ///
    /// A (near) constant window never divides: it yields a zero vector with
    /// `degenerate` set.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if buffers cannot be allocated
    pub fn condition(&self, window: &[f64]) -> Result<ConditionedSignal> {
        let detrended = self.detrend.apply(window)?;

        let (mean, std_dev) = calculate_stats(&detrended).map_or((0.0, 0.0), |s| (s.mean, s.std_dev));

        if !(std_dev.is_finite() && std_dev > self.epsilon) {
            return Ok(ConditionedSignal {
                values: Array1::zeros(detrended.len()),
                std_dev,
                degenerate: true,
            });
        }

        let values = Array1::from(detrended).mapv_into(|x| (x - mean) / std_dev);
        Ok(ConditionedSignal {
            values,
            std_dev,
            degenerate: false,
        })
    }
}
