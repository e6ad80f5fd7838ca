//! Benchmarks for the per-window DSP chain

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use rppg_pulse::{
    conditioner::SignalConditioner,
    config::{ChannelMode, SignalConfig},
    engine::EstimationEngine,
    estimator::PulseEstimator,
    filters::create_filter,
    history::Window,
    ica::FastIca,
    spectrum::SpectralFilter,
};
use std::f64::consts::PI;

/// Noisy skin-hue window: 72 BPM pulse, slow drift and per-region mixing
fn noisy_window(len: usize) -> Window {
    let mut rng = rand::thread_rng();
    let mut window = Window {
        times: Vec::with_capacity(len),
        combined: Vec::with_capacity(len),
        regions: [Vec::with_capacity(len), Vec::with_capacity(len), Vec::with_capacity(len)],
    };
    for i in 0..len {
        let t = i as f64 / 30.0;
        let pulse = (2.0 * PI * 1.2 * t).sin();
        let drift = 0.4 * t;
        let regions = [
            20.0 + pulse + drift + 0.3 * rng.gen::<f64>(),
            21.0 + 0.6 * pulse + 0.5 * drift + 0.3 * rng.gen::<f64>(),
            19.5 + 0.8 * pulse - 0.2 * drift + 0.3 * rng.gen::<f64>(),
        ];
        window.times.push(t);
        window.combined.push(regions.iter().sum::<f64>() / 3.0);
        for (channel, value) in window.regions.iter_mut().zip(regions) {
            channel.push(value);
        }
    }
    window
}

fn benchmark_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filters");
    let signal = SignalConfig::default();
    let data = noisy_window(signal.window_len).combined;

    for name in ["linear", "moving_average", "bandpass"] {
        let filter = create_filter(name, &signal).unwrap();
        group.bench_with_input(BenchmarkId::new("window_150", name), &data, |b, data| {
            b.iter(|| black_box(filter.apply(black_box(data)).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");
    let signal = SignalConfig::default();
    let window = noisy_window(signal.window_len);

    let conditioner = SignalConditioner::new(&signal).unwrap();
    group.bench_function("condition", |b| {
        b.iter(|| black_box(conditioner.condition(black_box(&window.combined)).unwrap()));
    });

    let conditioned = conditioner.condition(&window.combined).unwrap().values.to_vec();
    let spectral = SpectralFilter::new(
        signal.window_len,
        signal.filter_order,
        signal.low_cut_hz,
        signal.high_cut_hz,
        signal.sample_rate_hz,
    )
    .unwrap();
    group.bench_function("spectrum", |b| {
        b.iter(|| black_box(spectral.process(black_box(&conditioned)).unwrap()));
    });

    let spectrum = spectral.process(&conditioned).unwrap();
    let estimator = PulseEstimator::new(&signal);
    group.bench_function("estimate", |b| {
        b.iter(|| black_box(estimator.estimate(black_box(&spectrum))));
    });

    let channels: Vec<Vec<f64>> = window
        .regions
        .iter()
        .map(|r| conditioner.condition(r).unwrap().values.to_vec())
        .collect();
    let ica = FastIca::default();
    group.bench_function("fast_ica_3x150", |b| {
        b.iter(|| black_box(ica.fit(black_box(&channels))));
    });

    group.finish();
}

fn benchmark_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");

    for window_len in [150, 300, 600] {
        let signal = SignalConfig {
            window_len,
            ..SignalConfig::default()
        };
        let window = noisy_window(window_len);

        for (mode_name, mode) in [("combined", ChannelMode::Combined), ("per_region", ChannelMode::PerRegion)] {
            let engine = EstimationEngine::new(&signal, mode).unwrap();
            group.bench_with_input(BenchmarkId::new(mode_name, window_len), &window, |b, window| {
                b.iter(|| black_box(engine.run(black_box(window))));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_filters, benchmark_stages, benchmark_engine);
criterion_main!(benches);
