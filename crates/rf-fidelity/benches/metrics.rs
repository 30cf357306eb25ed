//! Fidelity metric benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rf_fidelity::scalogram::cwt_magnitude;
use rf_fidelity::spectral::welch_psd;
use rf_fidelity::{quick_distances, SignalBatch};

const SAMPLE_RATE: f64 = 2048.0;

fn tone(len: usize, freq: f64) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 + 0.4 * (2.0 * std::f64::consts::PI * freq * i as f64 / SAMPLE_RATE).sin())
        .collect()
}

fn bench_welch(c: &mut Criterion) {
    let series = tone(8192, 10.0);

    c.bench_function("welch_psd_8192", |b| {
        b.iter(|| welch_psd(black_box(&series), SAMPLE_RATE, 2048))
    });
}

fn bench_cwt(c: &mut Criterion) {
    let series = tone(2048, 10.0);
    let scales: Vec<f64> = (1..=30).map(|f| SAMPLE_RATE / f as f64).collect();

    c.bench_function("cwt_magnitude_30x2048", |b| {
        b.iter(|| cwt_magnitude(black_box(&series), &scales, 5.0))
    });
}

fn bench_distances(c: &mut Criterion) {
    let reference =
        SignalBatch::from_series((0..8).map(|k| tone(2048, 8.0 + k as f64)).collect(), SAMPLE_RATE)
            .unwrap();
    let candidate =
        SignalBatch::from_series((0..8).map(|k| tone(2048, 9.0 + k as f64)).collect(), SAMPLE_RATE)
            .unwrap();

    c.bench_function("distances_8x8", |b| {
        b.iter(|| quick_distances(black_box(&reference), black_box(&candidate)))
    });
}

criterion_group!(benches, bench_welch, bench_cwt, bench_distances);
criterion_main!(benches);
