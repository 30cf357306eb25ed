//! Morlet scalograms and cross-scalogram similarity

use crate::config::ScalogramConfig;
use crate::input::SignalBatch;
use crate::stats::pearson;
use crate::{FidelityError, Result};
use ndarray::{s, Array2, Zip};
use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// SSIM stabilizer constants
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

/// Complex Morlet wavelet of (possibly fractional) length `m` at `scale`.
///
/// `π^(-1/4) · e^{iω₀x} · e^{-x²/2} · √(1/s)`, with `x = (k - (m-1)/2) / s`.
pub fn morlet2(m: f64, scale: f64, omega0: f64) -> Vec<Complex64> {
    let count = m.ceil().max(1.0) as usize;
    let centre = (m - 1.0) / 2.0;
    let norm = PI.powf(-0.25) * (1.0 / scale).sqrt();

    (0..count)
        .map(|k| {
            let x = (k as f64 - centre) / scale;
            Complex64::from_polar(norm * (-0.5 * x * x).exp(), omega0 * x)
        })
        .collect()
}

/// CWT magnitude, one row per scale, same length as `series`.
///
/// Each row is the centred ("same") part of the convolution of the series with
/// the conjugated, time-reversed wavelet, truncated to `min(10·scale, n)` taps.
pub fn cwt_magnitude(series: &[f64], scales: &[f64], omega0: f64) -> Result<Array2<f64>> {
    let n = series.len();
    if n == 0 {
        return Err(FidelityError::Shape("cannot transform an empty series".into()));
    }
    if let Some(bad) = scales.iter().find(|s| !s.is_finite() || **s <= 0.0) {
        return Err(FidelityError::Config(format!("scale must be positive, got {}", bad)));
    }

    // Kernels are at most n taps, so 2n covers the full linear convolution
    let fft_size = (2 * n).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_size);
    let inverse = planner.plan_fft_inverse(fft_size);

    let mut signal_fft = vec![Complex64::new(0.0, 0.0); fft_size];
    for (dst, &x) in signal_fft.iter_mut().zip(series.iter()) {
        *dst = Complex64::new(x, 0.0);
    }
    forward.process(&mut signal_fft);

    let norm = 1.0 / fft_size as f64;
    let rows: Vec<Vec<f64>> = scales
        .par_iter()
        .map(|&scale| {
            let wavelet = morlet2((10.0 * scale).min(n as f64), scale, omega0);
            let taps = wavelet.len();

            let mut kernel = vec![Complex64::new(0.0, 0.0); fft_size];
            for (dst, w) in kernel.iter_mut().zip(wavelet.iter().rev()) {
                *dst = w.conj();
            }
            forward.process(&mut kernel);

            for (k, s) in kernel.iter_mut().zip(signal_fft.iter()) {
                *k *= s;
            }
            inverse.process(&mut kernel);

            let offset = (taps - 1) / 2;
            kernel[offset..offset + n].iter().map(|c| c.norm() * norm).collect()
        })
        .collect();

    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((scales.len(), n), flat).map_err(|e| FidelityError::Shape(e.to_string()))
}

/// CWT magnitude of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scalogram {
    /// Row frequencies (Hz)
    pub frequencies: Vec<f64>,

    /// Wavelet scale used for each row
    pub scales: Vec<f64>,

    /// Sample rate of the source series (Hz)
    pub sample_rate: f64,

    /// Magnitude, frequency × time
    pub magnitude: Array2<f64>,
}

impl Scalogram {
    pub fn compute(series: &[f64], sample_rate: f64, config: &ScalogramConfig) -> Result<Self> {
        config.validate()?;
        let scales: Vec<f64> = config.frequencies.iter().map(|f| sample_rate / f).collect();
        let magnitude = cwt_magnitude(series, &scales, config.omega0)?;

        Ok(Self {
            frequencies: config.frequencies.clone(),
            scales,
            sample_rate,
            magnitude,
        })
    }

    /// (frequencies, time samples)
    pub fn shape(&self) -> (usize, usize) {
        self.magnitude.dim()
    }

    /// Time axis in seconds
    pub fn times(&self) -> Vec<f64> {
        (0..self.magnitude.ncols())
            .map(|i| i as f64 / self.sample_rate)
            .collect()
    }

    /// Largest minus smallest magnitude
    pub fn span(&self) -> f64 {
        let (min, max) = self
            .magnitude
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        max - min
    }

    /// Row-wise mean magnitude
    pub fn mean_per_frequency(&self) -> Vec<f64> {
        self.magnitude
            .rows()
            .into_iter()
            .map(|row| row.mean().unwrap_or(0.0))
            .collect()
    }
}

/// Reference and candidate scalograms of matching shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalogramPair {
    pub series_index: usize,
    pub reference: Scalogram,
    pub candidate: Scalogram,
}

impl ScalogramPair {
    /// Similarity scores between the two grids
    pub fn similarity(&self, ssim_window: usize) -> Result<ScalogramSimilarity> {
        let a = &self.reference.magnitude;
        let b = &self.candidate.magnitude;
        if a.dim() != b.dim() {
            return Err(FidelityError::Shape(format!(
                "scalogram shapes differ: {:?} vs {:?}",
                a.dim(),
                b.dim()
            )));
        }

        let mse = Zip::from(a).and(b).fold(0.0, |acc, &x, &y| acc + (x - y).powi(2)) / a.len() as f64;

        let flat_a: Vec<f64> = a.iter().copied().collect();
        let flat_b: Vec<f64> = b.iter().copied().collect();
        let correlation = pearson(&flat_a, &flat_b).unwrap_or(f64::NAN);

        let dot: f64 = Zip::from(a).and(b).fold(0.0, |acc, &x, &y| acc + x * y);
        let norms = a.iter().map(|x| x * x).sum::<f64>().sqrt() * b.iter().map(|y| y * y).sum::<f64>().sqrt();
        let cosine_similarity = if norms > 0.0 { dot / norms } else { f64::NAN };

        let data_range = self.reference.span().max(self.candidate.span());
        let ssim = structural_similarity(a, b, data_range, ssim_window)?;

        Ok(ScalogramSimilarity {
            mse,
            correlation,
            cosine_similarity,
            ssim,
        })
    }
}

/// Four similarity scores between two scalograms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalogramSimilarity {
    /// Mean squared error
    pub mse: f64,

    /// Pearson correlation of the flattened grids
    #[serde(with = "crate::float_serde")]
    pub correlation: f64,

    /// Dot product over the product of L2 norms
    #[serde(with = "crate::float_serde")]
    pub cosine_similarity: f64,

    /// Structural similarity index
    #[serde(with = "crate::float_serde")]
    pub ssim: f64,
}

/// Mean SSIM with a uniform `win × win` window and sample covariance.
///
/// Only windows lying fully inside the grid contribute to the mean.
pub fn structural_similarity(
    a: &Array2<f64>,
    b: &Array2<f64>,
    data_range: f64,
    win: usize,
) -> Result<f64> {
    if a.dim() != b.dim() {
        return Err(FidelityError::Shape(format!(
            "SSIM inputs differ in shape: {:?} vs {:?}",
            a.dim(),
            b.dim()
        )));
    }
    let (rows, cols) = a.dim();
    if rows < win || cols < win {
        return Err(FidelityError::Shape(format!(
            "SSIM window {} exceeds grid {}x{}",
            win, rows, cols
        )));
    }
    if data_range == 0.0 {
        return Ok(if a == b { 1.0 } else { 0.0 });
    }

    let np = (win * win) as f64;
    let cov_norm = np / (np - 1.0);
    let c1 = (SSIM_K1 * data_range).powi(2);
    let c2 = (SSIM_K2 * data_range).powi(2);

    let ux = window_means(a, win);
    let uy = window_means(b, win);
    let uxx = window_means(&(a * a), win);
    let uyy = window_means(&(b * b), win);
    let uxy = window_means(&(a * b), win);

    let mut total = 0.0;
    Zip::from(&ux)
        .and(&uy)
        .and(&uxx)
        .and(&uyy)
        .and(&uxy)
        .for_each(|&mx, &my, &mxx, &myy, &mxy| {
            let vx = cov_norm * (mxx - mx * mx);
            let vy = cov_norm * (myy - my * my);
            let vxy = cov_norm * (mxy - mx * my);
            total += ((2.0 * mx * my + c1) * (2.0 * vxy + c2))
                / ((mx * mx + my * my + c1) * (vx + vy + c2));
        });

    Ok(total / ux.len() as f64)
}

/// Mean of every fully-contained `win × win` window
fn window_means(grid: &Array2<f64>, win: usize) -> Array2<f64> {
    let (rows, cols) = grid.dim();
    let out_rows = rows - win + 1;
    let out_cols = cols - win + 1;

    // Separable box sum: along columns, then along rows
    let mut horizontal = Array2::<f64>::zeros((rows, out_cols));
    for r in 0..rows {
        let row = grid.row(r);
        for c in 0..out_cols {
            horizontal[[r, c]] = row.slice(s![c..c + win]).sum();
        }
    }

    let area = (win * win) as f64;
    let mut means = Array2::<f64>::zeros((out_rows, out_cols));
    for c in 0..out_cols {
        let column = horizontal.column(c);
        for r in 0..out_rows {
            means[[r, c]] = column.slice(s![r..r + win]).sum() / area;
        }
    }
    means
}

/// Compute-then-query state of a [`TimeFrequencyAnalyzer`]
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ScalogramState {
    #[default]
    Uncomputed,
    Computed(ScalogramPair),
}

/// Computes paired scalograms and scores their similarity
#[derive(Debug, Clone, Default)]
pub struct TimeFrequencyAnalyzer {
    config: ScalogramConfig,
    state: ScalogramState,
}

impl TimeFrequencyAnalyzer {
    pub fn new(config: ScalogramConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: ScalogramState::Uncomputed,
        })
    }

    pub fn config(&self) -> &ScalogramConfig {
        &self.config
    }

    pub fn state(&self) -> &ScalogramState {
        &self.state
    }

    /// Scalograms of series `series_index` from both batches
    pub fn compute_scalogram(
        &mut self,
        reference: &SignalBatch,
        candidate: &SignalBatch,
        series_index: usize,
    ) -> Result<&ScalogramPair> {
        let ref_series = reference.series_at(series_index)?;
        let cand_series = candidate.series_at(series_index)?;

        if ref_series.len() != cand_series.len() {
            return Err(FidelityError::Shape(format!(
                "series {} lengths differ: {} vs {}",
                series_index,
                ref_series.len(),
                cand_series.len()
            )));
        }
        if reference.sample_rate() != candidate.sample_rate() {
            return Err(FidelityError::Shape(format!(
                "sample rates differ: {} Hz vs {} Hz",
                reference.sample_rate(),
                candidate.sample_rate()
            )));
        }

        let pair = ScalogramPair {
            series_index,
            reference: Scalogram::compute(ref_series, reference.sample_rate(), &self.config)?,
            candidate: Scalogram::compute(cand_series, candidate.sample_rate(), &self.config)?,
        };
        log::debug!(
            "Scalograms for series {}: {:?}",
            series_index,
            pair.reference.shape()
        );

        self.state = ScalogramState::Computed(pair);
        self.scalograms()
    }

    /// Stored scalograms, for plotting
    pub fn scalograms(&self) -> Result<&ScalogramPair> {
        match &self.state {
            ScalogramState::Computed(pair) => Ok(pair),
            ScalogramState::Uncomputed => Err(FidelityError::PrecomputeRequired(
                "compute_scalogram must run before scalograms are available",
            )),
        }
    }

    /// MSE, correlation, cosine similarity and SSIM of the stored pair
    pub fn similarity_metrics(&self) -> Result<ScalogramSimilarity> {
        let similarity = self.scalograms()?.similarity(self.config.ssim_window)?;
        log::debug!(
            "Scalogram MSE {:.6}, correlation {:.6}, cosine {:.6}, SSIM {:.6}",
            similarity.mse,
            similarity.correlation,
            similarity.cosine_similarity,
            similarity.ssim
        );
        Ok(similarity)
    }

    pub fn reset(&mut self) {
        self.state = ScalogramState::Uncomputed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(freq: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    fn batch(series: Vec<f64>, sample_rate: f64) -> SignalBatch {
        SignalBatch::new(series.into(), sample_rate).unwrap()
    }

    #[test]
    fn test_morlet_shape() {
        let w = morlet2(11.0, 2.0, 5.0);
        assert_eq!(w.len(), 11);
        // Centre sample is purely real with peak envelope
        assert_abs_diff_eq!(w[5].im, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[5].re, PI.powf(-0.25) / 2.0_f64.sqrt(), epsilon = 1e-12);
        // Symmetric envelope
        assert_abs_diff_eq!(w[0].norm(), w[10].norm(), epsilon = 1e-12);

        assert_eq!(morlet2(6.5, 1.0, 5.0).len(), 7);
    }

    #[test]
    fn test_cwt_shape_and_sign() {
        let mag = cwt_magnitude(&sine(8.0, 128.0, 256), &[16.0, 8.0, 4.0], 5.0).unwrap();
        assert_eq!(mag.dim(), (3, 256));
        assert!(mag.iter().all(|&v| v >= 0.0 && v.is_finite()));
    }

    #[test]
    fn test_cwt_rejects_bad_input() {
        assert!(cwt_magnitude(&[], &[1.0], 5.0).is_err());
        assert!(cwt_magnitude(&[1.0, 2.0], &[0.0], 5.0).is_err());
    }

    #[test]
    fn test_scalogram_peaks_near_tone() {
        let fs = 256.0;
        let scalogram = Scalogram::compute(&sine(10.0, fs, 1024), fs, &ScalogramConfig::default()).unwrap();
        assert_eq!(scalogram.shape(), (30, 1024));

        // Centre columns avoid edge effects
        let centre = scalogram.magnitude.slice(s![.., 256..768]);
        let energies: Vec<f64> = centre.rows().into_iter().map(|r| r.sum()).collect();
        let peak = energies
            .iter()
            .enumerate()
            .fold(0, |best, (i, &e)| if e > energies[best] { i } else { best });

        // scale = fs/f with ω₀ = 5 puts a 10 Hz tone at f ≈ 4π
        let peak_freq = scalogram.frequencies[peak];
        assert!((11.0..=14.0).contains(&peak_freq), "peak at {} Hz", peak_freq);
    }

    #[test]
    fn test_similarity_requires_compute() {
        let analyzer = TimeFrequencyAnalyzer::default();
        assert!(matches!(
            analyzer.similarity_metrics(),
            Err(FidelityError::PrecomputeRequired(_))
        ));
        assert!(analyzer.scalograms().is_err());
    }

    #[test]
    fn test_identical_series_are_perfectly_similar() {
        let fs = 128.0;
        let series = sine(6.0, fs, 512);
        let reference = batch(series.clone(), fs);
        let candidate = batch(series, fs);

        let mut analyzer = TimeFrequencyAnalyzer::default();
        analyzer.compute_scalogram(&reference, &candidate, 0).unwrap();
        let sim = analyzer.similarity_metrics().unwrap();

        assert_abs_diff_eq!(sim.mse, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sim.correlation, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sim.cosine_similarity, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sim.ssim, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_different_tones_score_lower() {
        let fs = 128.0;
        let reference = batch(sine(4.0, fs, 512), fs);
        let candidate = batch(sine(20.0, fs, 512), fs);

        let mut analyzer = TimeFrequencyAnalyzer::default();
        analyzer.compute_scalogram(&reference, &candidate, 0).unwrap();
        let sim = analyzer.similarity_metrics().unwrap();

        assert!(sim.mse > 0.0);
        assert!(sim.ssim < 0.9);
        assert!(sim.correlation < 0.9);
        assert!((0.0..1.0).contains(&sim.cosine_similarity));
    }

    #[test]
    fn test_compute_validates_selection() {
        let fs = 128.0;
        let long = batch(sine(4.0, fs, 256), fs);
        let short = batch(sine(4.0, fs, 128), fs);
        let other_rate = batch(sine(4.0, 64.0, 256), 64.0);

        let mut analyzer = TimeFrequencyAnalyzer::default();
        assert!(matches!(
            analyzer.compute_scalogram(&long, &long, 1),
            Err(FidelityError::Shape(_))
        ));
        assert!(matches!(
            analyzer.compute_scalogram(&long, &short, 0),
            Err(FidelityError::Shape(_))
        ));
        assert!(matches!(
            analyzer.compute_scalogram(&long, &other_rate, 0),
            Err(FidelityError::Shape(_))
        ));
        assert_eq!(analyzer.state(), &ScalogramState::Uncomputed);
    }

    #[test]
    fn test_reset_returns_to_uncomputed() {
        let fs = 128.0;
        let b = batch(sine(4.0, fs, 256), fs);
        let mut analyzer = TimeFrequencyAnalyzer::default();

        let pair = analyzer.compute_scalogram(&b, &b, 0).unwrap();
        assert_eq!(pair.series_index, 0);
        assert!(analyzer.scalograms().is_ok());

        analyzer.reset();
        assert!(matches!(
            analyzer.similarity_metrics(),
            Err(FidelityError::PrecomputeRequired(_))
        ));
    }

    #[test]
    fn test_ssim_edge_cases() {
        let a = Array2::from_elem((8, 8), 0.5);
        let b = Array2::from_elem((8, 8), 0.25);
        assert_eq!(structural_similarity(&a, &a, 0.0, 7).unwrap(), 1.0);
        assert_eq!(structural_similarity(&a, &b, 0.0, 7).unwrap(), 0.0);

        let small = Array2::<f64>::zeros((5, 5));
        assert!(structural_similarity(&small, &small, 1.0, 7).is_err());
        assert!(structural_similarity(&a, &small, 1.0, 7).is_err());
    }

    #[test]
    fn test_ssim_penalizes_noise() {
        let a = Array2::from_shape_fn((16, 16), |(r, c)| ((r * 16 + c) as f64 * 0.1).sin());
        let b = Array2::from_shape_fn((16, 16), |(r, c)| {
            ((r * 16 + c) as f64 * 0.1).sin() + if (r + c) % 2 == 0 { 0.3 } else { -0.3 }
        });
        let same = structural_similarity(&a, &a, 2.0, 7).unwrap();
        let noisy = structural_similarity(&a, &b, 2.0, 7).unwrap();
        assert_abs_diff_eq!(same, 1.0, epsilon = 1e-12);
        assert!(noisy < same);
    }
}
