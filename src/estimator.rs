//! Dominant in-band frequency to beats per minute.

use crate::{
    config::SignalConfig,
    constants::{EPSILON, SECONDS_PER_MINUTE},
    spectrum::SpectralResult,
    Error, Result,
};
use serde::Serialize;

/// Pulse rate estimate of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PulseEstimate {
    /// Pulse rate in beats per minute
    pub bpm: f64,
    /// Frequency of the selected bin (Hz)
    pub frequency_hz: f64,
    /// Index of the selected bin
    pub bin: usize,
    /// Power of the selected bin
    pub peak_power: f64,
    /// Peak power over the rest of the in-band power, in dB
    pub snr_db: f64,
}

/// Picks the strongest bin inside the pulse band
#[derive(Debug, Clone)]
pub struct PulseEstimator {
    low_hz: f64,
    high_hz: f64,
    min_passband_energy: f64,
}

impl PulseEstimator {
    /// Create an estimator for the configured band
    #[must_use]
    pub const fn new(config: &SignalConfig) -> Self {
        Self {
            low_hz: config.low_cut_hz,
            high_hz: config.high_cut_hz,
            min_passband_energy: config.min_passband_energy,
        }
    }

    /// Pulse band (Hz)
    #[must_use]
    pub const fn band(&self) -> (f64, f64) {
        (self.low_hz, self.high_hz)
    }

    /// Estimate the pulse rate from one spectrum
    ///
    /// Only non-negative frequency bins (`k <= W/2`) inside the band are
    /// considered; ties go to the lowest frequency. The result always lies
    /// within the band converted to BPM.
    ///
    /// # Errors
    ///
    /// Returns `OutOfBandResult` when the band-pass kept too little energy
    /// to be above the noise floor, no bin lies inside the band, or the
    /// in-band spectrum is empty
    pub fn estimate(&self, spectrum: &SpectralResult) -> Result<PulseEstimate> {
        let ratio = spectrum.passband_ratio();
        if ratio < self.min_passband_energy {
            return Err(Error::OutOfBandResult(format!(
                "Band-pass kept {:.2}% of the signal energy",
                ratio * 100.0
            )));
        }

        let half = spectrum.len() / 2;
        let mut peak: Option<usize> = None;
        let mut in_band_total = 0.0;
        for (k, (&freq, &power)) in spectrum.frequencies.iter().zip(&spectrum.power).enumerate().take(half + 1) {
            if freq < self.low_hz || freq > self.high_hz {
                continue;
            }
            in_band_total += power;
            if peak.map_or(true, |p| power > spectrum.power[p]) {
                peak = Some(k);
            }
        }

        let Some(bin) = peak else {
            return Err(Error::OutOfBandResult(format!(
                "No frequency bin inside {}..{} Hz",
                self.low_hz, self.high_hz
            )));
        };

        let peak_power = spectrum.power[bin];
        if !(peak_power > EPSILON) {
            return Err(Error::OutOfBandResult("In-band spectrum is empty".to_string()));
        }

        let noise = in_band_total - peak_power;
        let snr_db = if noise > EPSILON * peak_power {
            10.0 * (peak_power / noise).log10()
        } else {
            f64::INFINITY
        };

        let frequency_hz = spectrum.frequencies[bin];
        Ok(PulseEstimate {
            bpm: frequency_hz * SECONDS_PER_MINUTE,
            frequency_hz,
            bin,
            peak_power,
            snr_db,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::safe_cast::count_to_f64;

    fn spectrum(power: Vec<f64>, fs: f64) -> SpectralResult {
        let n = power.len();
        let frequencies = (0..n).map(|k| count_to_f64(k) * fs / count_to_f64(n)).collect();
        SpectralResult {
            power,
            frequencies,
            filtered: vec![1.0; n],
            filtered_energy: count_to_f64(n),
            input_energy: count_to_f64(n),
            sample_rate: fs,
        }
    }

    fn estimator() -> PulseEstimator {
        PulseEstimator::new(&SignalConfig::default())
    }

    #[test]
    fn test_selects_in_band_peak() {
        let mut power = vec![0.1; 150];
        power[0] = 1000.0; // DC is out of band
        power[6] = 50.0;
        power[144] = 50.0; // mirror bin is ignored
        let estimate = estimator().estimate(&spectrum(power, 30.0)).unwrap();
        assert_eq!(estimate.bin, 6);
        assert!((estimate.bpm - 72.0).abs() < 1e-9);
        assert!(estimate.snr_db > 0.0);
    }

    #[test]
    fn test_tie_goes_to_lowest_frequency() {
        let mut power = vec![0.0; 150];
        power[8] = 10.0;
        power[12] = 10.0;
        let estimate = estimator().estimate(&spectrum(power, 30.0)).unwrap();
        assert_eq!(estimate.bin, 8);
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        let mut power = vec![0.0; 150];
        power[20] = 5.0; // exactly 4.0 Hz
        let estimate = estimator().estimate(&spectrum(power, 30.0)).unwrap();
        assert!((estimate.bpm - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_peak_outside_band_ignored() {
        let mut power = vec![0.01; 150];
        power[30] = 100.0; // 6 Hz
        power[10] = 1.0;
        let estimate = estimator().estimate(&spectrum(power, 30.0)).unwrap();
        assert_eq!(estimate.bin, 10);
        assert!(estimate.bpm >= 45.0 && estimate.bpm <= 240.0);
    }

    #[test]
    fn test_no_in_band_bin() {
        // Bins every 5 Hz cannot land in 0.75..4.0
        let result = estimator().estimate(&spectrum(vec![1.0; 6], 30.0));
        assert!(matches!(result, Err(Error::OutOfBandResult(_))));
    }

    #[test]
    fn test_low_passband_energy_is_out_of_band() {
        let mut s = spectrum(vec![1.0; 150], 30.0);
        s.filtered_energy = 0.001 * s.input_energy;
        assert!(matches!(estimator().estimate(&s), Err(Error::OutOfBandResult(_))));
    }

    #[test]
    fn test_flat_zero_spectrum() {
        let result = estimator().estimate(&spectrum(vec![0.0; 150], 30.0));
        assert!(matches!(result, Err(Error::OutOfBandResult(_))));
    }

    #[test]
    fn test_single_in_band_bin_has_infinite_snr() {
        let mut power = vec![0.0; 150];
        power[7] = 3.0;
        let estimate = estimator().estimate(&spectrum(power, 30.0)).unwrap();
        assert!(estimate.snr_db.is_infinite());
    }
}
