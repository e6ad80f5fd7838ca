//! Per-window signal filters.
//!
//! Every filter here maps one complete window to a new series of the same
//! length and keeps no state between windows.

/// Least-squares linear detrend
pub mod detrend;

/// Centred moving-average detrend
pub mod moving_average;

/// Butterworth band-pass as cascaded second-order sections
pub mod butterworth;

use crate::{config::SignalConfig, Error, Result};

/// Trait for all window filters
pub trait SignalFilter: Send + Sync {
    /// Filter one window
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if the output cannot be allocated
    fn apply(&self, signal: &[f64]) -> Result<Vec<f64>>;

    /// Get filter name
    fn name(&self) -> &str;
}

/// Filter that passes the window through unchanged
pub struct NoFilter;

impl SignalFilter for NoFilter {
    fn apply(&self, signal: &[f64]) -> Result<Vec<f64>> {
        let mut out = Vec::new();
        out.try_reserve_exact(signal.len())?;
        out.extend_from_slice(signal);
        Ok(out)
    }

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Create a window filter by type name
///
/// # Errors
///
/// Returns `ConfigError` for an unknown name or parameters the filter
/// rejects
pub fn create_filter(filter_type: &str, config: &SignalConfig) -> Result<Box<dyn SignalFilter>> {
    match filter_type.to_lowercase().as_str() {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "linear" | "detrend" => Ok(Box::new(detrend::LinearDetrend)),
        "moving_average" | "movingaverage" => Ok(Box::new(moving_average::MovingAverageDetrend::new(
            config.detrend_window,
        )?)),
        "bandpass" | "butterworth" => Ok(Box::new(butterworth::ButterworthBandpass::new(
            config.filter_order,
            config.low_cut_hz,
            config.high_cut_hz,
            config.sample_rate_hz,
        )?)),
        _ => Err(Error::ConfigError(format!("Unknown filter type: {filter_type}"))),
    }
}

/// Create the detrend filter selected by the configuration
///
/// # Errors
///
/// Returns `ConfigError` if the detrend parameters are invalid
pub fn create_detrend(config: &SignalConfig) -> Result<Box<dyn SignalFilter>> {
    create_filter(config.detrend.name(), config)
}
