//! One estimation cycle: window → conditioner → (ICA) → spectral filter → estimator.

use crate::{
    config::{ChannelMode, SignalConfig, TimingMode},
    conditioner::SignalConditioner,
    estimator::{PulseEstimate, PulseEstimator},
    history::Window,
    ica::{select_pulse_component, FastIca},
    spectrum::SpectralFilter,
    utils::calculate_stats,
    Error, Result,
};
use log::debug;
use std::borrow::Cow;

/// Runs the per-window DSP chain
pub struct EstimationEngine {
    signal: SignalConfig,
    channel_mode: ChannelMode,
    conditioner: SignalConditioner,
    spectral: SpectralFilter,
    estimator: PulseEstimator,
    ica: FastIca,
}

impl EstimationEngine {
    /// Build the chain for the configured window and band
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the filter parameters are invalid
    pub fn new(signal: &SignalConfig, channel_mode: ChannelMode) -> Result<Self> {
        Ok(Self {
            conditioner: SignalConditioner::new(signal)?,
            spectral: SpectralFilter::new(
                signal.window_len,
                signal.filter_order,
                signal.low_cut_hz,
                signal.high_cut_hz,
                signal.sample_rate_hz,
            )?,
            estimator: PulseEstimator::new(signal),
            ica: FastIca::default(),
            signal: signal.clone(),
            channel_mode,
        })
    }

    /// Window length the engine expects
    #[must_use]
    pub const fn window_len(&self) -> usize {
        self.signal.window_len
    }

    /// Estimate the pulse rate of one window
    ///
    /// # Errors
    ///
    /// - `DegenerateSignal` if the window (or every region channel) is flat
    /// - `OutOfBandResult` if nothing in-band rises above the noise floor
    /// - `InvalidInput` if the window has the wrong length or its measured
    ///   rate cannot hold the band
    /// - `ResourceExhausted` if buffers cannot be allocated
    pub fn run(&self, window: &Window) -> Result<PulseEstimate> {
        if window.len() != self.signal.window_len {
            return Err(Error::InvalidInput(format!(
                "Expected a window of {} samples, got {}",
                self.signal.window_len,
                window.len()
            )));
        }

        let (window, sample_rate) = self.timed_window(window);

        let series = match self.channel_mode {
            ChannelMode::Combined => {
                let conditioned = self.conditioner.condition(&window.combined)?;
                if conditioned.degenerate {
                    return Err(Error::DegenerateSignal {
                        std_dev: conditioned.std_dev,
                    });
                }
                conditioned.values.to_vec()
            }
            ChannelMode::PerRegion => self.separate(&window.regions, sample_rate)?,
        };

        let spectrum = if (sample_rate - self.spectral.sample_rate()).abs() < f64::EPSILON {
            self.spectral.process(&series)?
        } else {
            self.spectral
                .retuned(sample_rate)
                .map_err(|e| Error::InvalidInput(format!("Measured rate {sample_rate:.2} Hz unusable: {e}")))?
                .process(&series)?
        };

        let estimate = self.estimator.estimate(&spectrum)?;
        debug!(
            "Cycle estimate {:.1} BPM (bin {}, {:.1} dB) at {:.2} Hz",
            estimate.bpm, estimate.bin, estimate.snr_db, sample_rate
        );
        Ok(estimate)
    }

    /// Window and sample rate per the timing model
    fn timed_window<'a>(&self, window: &'a Window) -> (Cow<'a, Window>, f64) {
        match self.signal.timing {
            TimingMode::Nominal => (Cow::Borrowed(window), self.signal.sample_rate_hz),
            TimingMode::Measured => match window.resample_uniform() {
                Some((resampled, rate)) => (Cow::Owned(resampled), rate),
                None => {
                    debug!("Window timestamps unusable, assuming {} Hz", self.signal.sample_rate_hz);
                    (Cow::Borrowed(window), self.signal.sample_rate_hz)
                }
            },
        }
    }

    /// Condition each region, unmix with ICA and keep the pulse component
    fn separate(&self, regions: &[Vec<f64>; 3], sample_rate: f64) -> Result<Vec<f64>> {
        let mut channels = Vec::with_capacity(regions.len());
        let mut max_std = 0.0_f64;
        for region in regions {
            let conditioned = self.conditioner.condition(region)?;
            max_std = max_std.max(conditioned.std_dev);
            if !conditioned.degenerate {
                channels.push(conditioned.values.to_vec());
            }
        }

        match channels.len() {
            0 => Err(Error::DegenerateSignal { std_dev: max_std }),
            1 => Ok(channels.swap_remove(0)),
            _ => {
                let result = self.ica.fit(&channels)?;
                let index = select_pulse_component(
                    &result,
                    sample_rate,
                    self.signal.low_cut_hz,
                    self.signal.high_cut_hz,
                )
                .ok_or(Error::DegenerateSignal { std_dev: max_std })?;
                debug!(
                    "ICA picked component {index} of {} after {} iterations",
                    result.len(),
                    result.iterations
                );
                standardize(result.component(index), self.signal.degenerate_epsilon)
            }
        }
    }
}

fn standardize(mut values: Vec<f64>, epsilon: f64) -> Result<Vec<f64>> {
    let (mean, std_dev) = calculate_stats(&values).map_or((0.0, 0.0), |s| (s.mean, s.std_dev));
    if !(std_dev.is_finite() && std_dev > epsilon) {
        return Err(Error::DegenerateSignal { std_dev });
    }
    for v in &mut values {
        *v = (*v - mean) / std_dev;
    }
    Ok(values)
}
