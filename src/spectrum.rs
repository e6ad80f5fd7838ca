//! Band-pass filtering and power spectrum of a conditioned window.

use crate::{
    filters::{butterworth::ButterworthBandpass, SignalFilter},
    utils::{energy, safe_cast::count_to_f64},
    Error, Result,
};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Spectrum of one filtered window
#[derive(Debug, Clone)]
pub struct SpectralResult {
    /// `|X_k|^2` for `k = 0..W`
    pub power: Vec<f64>,
    /// Frequency of bin `k`, `k * fs / W`
    pub frequencies: Vec<f64>,
    /// Band-pass output, length W
    pub filtered: Vec<f64>,
    /// Energy of the band-pass output
    pub filtered_energy: f64,
    /// Energy of the conditioned input
    pub input_energy: f64,
    /// Sample rate the bins were computed for
    pub sample_rate: f64,
}

impl SpectralResult {
    /// Number of bins
    #[must_use]
    pub fn len(&self) -> usize {
        self.power.len()
    }

    /// Whether the spectrum is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }

    /// Share of input energy retained by the band-pass
    #[must_use]
    pub fn passband_ratio(&self) -> f64 {
        if self.input_energy > 0.0 {
            self.filtered_energy / self.input_energy
        } else {
            0.0
        }
    }
}

/// Band-pass filter plus a forward FFT planned for one window length
pub struct SpectralFilter {
    bandpass: ButterworthBandpass,
    fft: Arc<dyn Fft<f64>>,
    len: usize,
}

impl SpectralFilter {
    /// Design the filter and plan the transform
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the band does not fit the sample rate and
    /// `InvalidInput` for a zero window length
    pub fn new(len: usize, order: usize, low_hz: f64, high_hz: f64, sample_rate: f64) -> Result<Self> {
        if len == 0 {
            return Err(Error::InvalidInput("Spectral window length must be positive".to_string()));
        }
        let bandpass = ButterworthBandpass::new(order, low_hz, high_hz, sample_rate)?;
        let fft = FftPlanner::new().plan_fft_forward(len);
        Ok(Self { bandpass, fft, len })
    }

    /// Same window and band redesigned for another sample rate
    ///
    /// The transform plan depends only on the window length and is shared.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the band does not fit `sample_rate`
    pub fn retuned(&self, sample_rate: f64) -> Result<Self> {
        let (low_hz, high_hz) = self.bandpass.band();
        Ok(Self {
            bandpass: ButterworthBandpass::new(self.bandpass.sections().len(), low_hz, high_hz, sample_rate)?,
            fft: Arc::clone(&self.fft),
            len: self.len,
        })
    }

    /// Window length the transform was planned for
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the planned length is zero (never true for a built filter)
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sample rate the band-pass was designed for
    #[must_use]
    pub const fn sample_rate(&self) -> f64 {
        self.bandpass.sample_rate()
    }

    /// The band-pass in use
    #[must_use]
    pub const fn bandpass(&self) -> &ButterworthBandpass {
        &self.bandpass
    }

    /// Filter a conditioned window and compute its power spectrum
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the window length differs from the planned
    /// length and `ResourceExhausted` if buffers cannot be allocated
    pub fn process(&self, signal: &[f64]) -> Result<SpectralResult> {
        if signal.len() != self.len {
            return Err(Error::InvalidInput(format!(
                "Expected a window of {} samples, got {}",
                self.len,
                signal.len()
            )));
        }

        let filtered = self.bandpass.apply(signal)?;

        let mut buffer: Vec<Complex64> = Vec::new();
        buffer.try_reserve_exact(self.len)?;
        buffer.extend(filtered.iter().map(|&x| Complex64::new(x, 0.0)));
        self.fft.process(&mut buffer);

        let mut power = Vec::new();
        power.try_reserve_exact(self.len)?;
        power.extend(buffer.iter().map(Complex64::norm_sqr));

        let sample_rate = self.sample_rate();
        let n = count_to_f64(self.len);
        let mut frequencies = Vec::new();
        frequencies.try_reserve_exact(self.len)?;
        frequencies.extend((0..self.len).map(|k| count_to_f64(k) * sample_rate / n));

        Ok(SpectralResult {
            power,
            frequencies,
            filtered_energy: energy(&filtered),
            input_energy: energy(signal),
            filtered,
            sample_rate,
        })
    }
}
