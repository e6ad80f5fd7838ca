//! Tests for filter and estimator accuracy against known responses

use proptest::prelude::*;
use rppg_pulse::{
    conditioner::SignalConditioner,
    config::{DetrendMethod, SignalConfig},
    estimator::PulseEstimator,
    filters::{
        butterworth::ButterworthBandpass, create_filter, detrend::LinearDetrend,
        moving_average::MovingAverageDetrend, SignalFilter,
    },
    spectrum::SpectralFilter,
    utils::{calculate_stats, safe_cast::count_to_f64},
};
use std::f64::consts::{FRAC_1_SQRT_2, PI};

fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| (2.0 * PI * freq * count_to_f64(i) / fs).sin()).collect()
}

fn peak(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |m, v| m.max(v.abs()))
}

/// Frequency response of the default band-pass
#[test]
fn test_bandpass_frequency_response() {
    let filter = ButterworthBandpass::new(4, 0.75, 4.0, 30.0).unwrap();
    assert_eq!(filter.sections().len(), 4);

    // -3 dB exactly at both cutoffs
    assert!((filter.magnitude(0.75) - FRAC_1_SQRT_2).abs() < 1e-9);
    assert!((filter.magnitude(4.0) - FRAC_1_SQRT_2).abs() < 1e-9);

    // Unity at the geometric centre, flat across typical pulse rates
    assert!((filter.magnitude((0.75_f64 * 4.0).sqrt()) - 1.0).abs() < 1e-9);
    assert!(filter.magnitude(1.2) > 0.99);

    // Steep roll-off outside the band
    assert!(filter.magnitude(0.1) < 1e-3);
    assert!(filter.magnitude(0.3) < 0.02);
    assert!(filter.magnitude(8.0) < 0.02);
    assert!(filter.magnitude(14.9) < 1e-6);
}

/// Time-domain behaviour after the start-up transient
#[test]
fn test_bandpass_time_domain() {
    let filter = ButterworthBandpass::new(4, 0.75, 4.0, 30.0).unwrap();

    let pass = filter.apply(&sine(1.2, 30.0, 600)).unwrap();
    assert!((peak(&pass[450..]) - 1.0).abs() < 0.01);

    let slow = filter.apply(&sine(0.1, 30.0, 600)).unwrap();
    assert!(peak(&slow[450..]) < 1e-3);

    let fast = filter.apply(&sine(10.0, 30.0, 600)).unwrap();
    assert!(peak(&fast[450..]) < 0.01);
}

/// A constant input starts (and stays) at steady state
#[test]
fn test_bandpass_constant_input_has_no_transient() {
    let filter = ButterworthBandpass::new(4, 0.75, 4.0, 30.0).unwrap();
    let out = filter.apply(&[42.0; 300]).unwrap();
    assert!(peak(&out) < 1e-9);
}

#[test]
fn test_linear_detrend_removes_ramp() {
    let ramp: Vec<f64> = (0..150).map(|i| 0.5f64.mul_add(count_to_f64(i), 3.0)).collect();
    let out = LinearDetrend.apply(&ramp).unwrap();
    assert!(peak(&out) < 1e-9);
}

#[test]
fn test_moving_average_detrend() {
    let filter = MovingAverageDetrend::new(5).unwrap();

    let out = filter.apply(&[7.0; 40]).unwrap();
    assert!(peak(&out) < 1e-12);

    // A centred average reproduces a ramp away from the edges
    let ramp: Vec<f64> = (0..40).map(count_to_f64).collect();
    let out = filter.apply(&ramp).unwrap();
    assert!(peak(&out[2..38]) < 1e-9);
    // Truncated at the edges: mean of [0, 1, 2] is 1
    assert!((out[0] - -1.0).abs() < 1e-12);
}

#[test]
fn test_factory_names() {
    let signal = SignalConfig::default();
    assert_eq!(create_filter("linear", &signal).unwrap().name(), "LinearDetrend");
    assert_eq!(create_filter("moving_average", &signal).unwrap().name(), "MovingAverageDetrend");
    assert_eq!(create_filter("bandpass", &signal).unwrap().name(), "ButterworthBandpass");
    assert_eq!(create_filter("none", &signal).unwrap().name(), "NoFilter");
}

/// Full chain on a known window: detrend, normalise, filter, estimate
#[test]
fn test_chain_estimates_known_rate() {
    let signal = SignalConfig::default();
    let conditioner = SignalConditioner::new(&signal).unwrap();
    let spectral = SpectralFilter::new(150, 4, 0.75, 4.0, 30.0).unwrap();
    let estimator = PulseEstimator::new(&signal);

    let window: Vec<f64> = sine(1.2, 30.0, 150)
        .iter()
        .enumerate()
        .map(|(i, v)| 0.02f64.mul_add(count_to_f64(i), 5.0 * v + 40.0))
        .collect();

    let conditioned = conditioner.condition(&window).unwrap();
    let stats = calculate_stats(conditioned.values.as_slice().unwrap()).unwrap();
    assert!(stats.mean.abs() < 1e-9);
    assert!((stats.std_dev - 1.0).abs() < 1e-9);

    let spectrum = spectral.process(conditioned.values.as_slice().unwrap()).unwrap();
    let estimate = estimator.estimate(&spectrum).unwrap();
    assert_eq!(estimate.bin, 6);
    assert!((estimate.bpm - 72.0).abs() < 1e-9);
    assert!(estimate.snr_db > 0.0);
}

#[test]
fn test_moving_average_conditioning_estimates_known_rate() {
    let signal = SignalConfig {
        detrend: DetrendMethod::MovingAverage,
        ..SignalConfig::default()
    };
    let conditioner = SignalConditioner::new(&signal).unwrap();
    assert_eq!(conditioner.detrend_name(), "MovingAverageDetrend");

    let spectral = SpectralFilter::new(150, 4, 0.75, 4.0, 30.0).unwrap();
    let conditioned = conditioner.condition(&sine(1.5, 30.0, 150)).unwrap();
    let spectrum = spectral.process(conditioned.values.as_slice().unwrap()).unwrap();
    let estimate = PulseEstimator::new(&signal).estimate(&spectrum).unwrap();
    // 1.5 Hz falls between bins 7 and 8
    assert!((estimate.bpm - 90.0).abs() <= 6.0 + 1e-9, "bpm {}", estimate.bpm);
}

proptest! {
    /// Any on-bin in-band sine is found exactly, whatever the offset,
    /// drift, amplitude and phase
    #[test]
    fn prop_on_bin_sine_is_found(
        bin in 4usize..=19,
        phase in 0.0..(2.0 * PI),
        amplitude in 0.1f64..100.0,
        offset in -100.0f64..100.0,
        slope in -1.0f64..1.0,
    ) {
        let signal = SignalConfig::default();
        let conditioner = SignalConditioner::new(&signal).unwrap();
        let spectral = SpectralFilter::new(150, 4, 0.75, 4.0, 30.0).unwrap();

        let k = count_to_f64(bin);
        let window: Vec<f64> = (0..150)
            .map(|i| {
                let t = count_to_f64(i);
                amplitude.mul_add((2.0 * PI * k * t / 150.0 + phase).sin(), slope.mul_add(t, offset))
            })
            .collect();

        let conditioned = conditioner.condition(&window).unwrap();
        prop_assert!(!conditioned.degenerate);
        let spectrum = spectral.process(conditioned.values.as_slice().unwrap()).unwrap();
        let estimate = PulseEstimator::new(&signal).estimate(&spectrum).unwrap();
        prop_assert_eq!(estimate.bin, bin);
        prop_assert!((estimate.bpm - k * 12.0).abs() < 1e-9);
    }

    /// Linear detrend leaves zero mean and zero slope
    #[test]
    fn prop_linear_detrend_is_flat(values in prop::collection::vec(-1e3f64..1e3, 2..200)) {
        let out = LinearDetrend.apply(&values).unwrap();
        let n = count_to_f64(out.len());
        let mean = out.iter().sum::<f64>() / n;
        let x_mean = (n - 1.0) / 2.0;
        let slope: f64 = out.iter().enumerate().map(|(i, v)| (count_to_f64(i) - x_mean) * v).sum();
        prop_assert!(mean.abs() < 1e-6);
        prop_assert!(slope.abs() < 1e-3 * n * n);
    }

    /// Filters keep length and finiteness
    #[test]
    fn prop_filters_keep_shape(values in prop::collection::vec(-1e3f64..1e3, 0..300)) {
        let signal = SignalConfig::default();
        for name in ["linear", "moving_average", "bandpass"] {
            let out = create_filter(name, &signal).unwrap().apply(&values).unwrap();
            prop_assert_eq!(out.len(), values.len());
            prop_assert!(out.iter().all(|v| v.is_finite()));
        }
    }
}
