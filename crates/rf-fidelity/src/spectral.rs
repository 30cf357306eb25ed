//! Welch PSD and relative band power

use crate::config::SpectralConfig;
use crate::input::{AnalysisKind, SignalBatch};
use crate::{FidelityError, Result};
use num_complex::Complex64;
use rayon::prelude::*;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

/// Number of labelled results kept by [`SpectralAnalyzer`]
const CACHE_SLOTS: usize = 2;

/// Named frequency interval, half-open `[low_hz, high_hz)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub name: String,
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyBand {
    pub fn new(name: impl Into<String>, low_hz: f64, high_hz: f64) -> Result<Self> {
        let band = Self {
            name: name.into(),
            low_hz,
            high_hz,
        };
        band.validate()?;
        Ok(band)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.low_hz.is_finite() || !self.high_hz.is_finite() || self.low_hz >= self.high_hz {
            return Err(FidelityError::Config(format!(
                "band '{}' must satisfy low < high, got [{}, {})",
                self.name, self.low_hz, self.high_hz
            )));
        }
        Ok(())
    }

    pub fn contains(&self, freq: f64) -> bool {
        freq >= self.low_hz && freq < self.high_hz
    }
}

/// slow, delta, theta, alpha and beta
pub fn canonical_bands() -> Vec<FrequencyBand> {
    [
        ("slow", 0.5, 2.0),
        ("delta", 2.0, 4.0),
        ("theta", 4.0, 8.0),
        ("alpha", 8.0, 13.0),
        ("beta", 13.0, 30.0),
    ]
    .into_iter()
    .map(|(name, low_hz, high_hz)| FrequencyBand {
        name: name.into(),
        low_hz,
        high_hz,
    })
    .collect()
}

/// Numerical integration rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Integration {
    /// Composite trapezoid. Adjacent band integrals never exceed the total.
    Trapezoid,
    /// Composite Simpson, averaging both trapezoid-ended variants for an even point count
    Simpson,
}

/// One-sided power spectral density
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsdResult {
    /// Frequencies (Hz), from 0 upward
    pub freqs: Vec<f64>,

    /// Power density (units²/Hz)
    pub power: Vec<f64>,
}

impl PsdResult {
    /// Frequency spacing
    pub fn resolution(&self) -> f64 {
        if self.freqs.len() > 1 {
            self.freqs[1] - self.freqs[0]
        } else {
            0.0
        }
    }

    /// Frequency of the largest PSD value
    pub fn peak_frequency(&self) -> f64 {
        let mut best = 0;
        for (i, &p) in self.power.iter().enumerate() {
            if p > self.power[best] {
                best = i;
            }
        }
        self.freqs.get(best).copied().unwrap_or(0.0)
    }

    /// Integral of the PSD over the frequencies selected by `mask`
    pub fn integrate_where(&self, mask: impl Fn(f64) -> bool, rule: Integration) -> f64 {
        let selected: Vec<f64> = self
            .freqs
            .iter()
            .zip(self.power.iter())
            .filter(|(f, _)| mask(**f))
            .map(|(_, p)| *p)
            .collect();
        integrate(&selected, self.resolution(), rule)
    }
}

/// Welch PSD: periodic Hann window, 50 % overlap, constant detrend, density scaling
pub fn welch_psd(series: &[f64], sample_rate: f64, nperseg: usize) -> Result<PsdResult> {
    if nperseg < 2 {
        return Err(FidelityError::InsufficientSamples {
            needed: 2,
            got: nperseg,
        });
    }
    if series.len() < nperseg {
        return Err(FidelityError::InsufficientSamples {
            needed: nperseg,
            got: series.len(),
        });
    }

    let noverlap = nperseg / 2;
    let step = nperseg - noverlap;
    let num_segments = (series.len() - nperseg) / step + 1;

    let window: Vec<f64> = (0..nperseg)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / nperseg as f64).cos())
        .collect();
    let window_power: f64 = window.iter().map(|w| w * w).sum();

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);
    let mut input = fft.make_input_vec();
    let mut spectrum: Vec<Complex64> = fft.make_output_vec();
    let num_bins = spectrum.len();
    let mut accum = vec![0.0; num_bins];

    for seg in 0..num_segments {
        let segment = &series[seg * step..seg * step + nperseg];
        let mean = segment.iter().sum::<f64>() / nperseg as f64;
        for ((dst, &x), &w) in input.iter_mut().zip(segment.iter()).zip(window.iter()) {
            *dst = (x - mean) * w;
        }

        fft.process(&mut input, &mut spectrum)
            .map_err(|e| FidelityError::Fft(e.to_string()))?;

        for (acc, bin) in accum.iter_mut().zip(spectrum.iter()) {
            *acc += bin.norm_sqr();
        }
    }

    let scale = 1.0 / (sample_rate * window_power * num_segments as f64);
    let has_nyquist = nperseg % 2 == 0;
    let power: Vec<f64> = accum
        .iter()
        .enumerate()
        .map(|(k, &p)| {
            let one_sided = k != 0 && !(has_nyquist && k == num_bins - 1);
            if one_sided { 2.0 * p * scale } else { p * scale }
        })
        .collect();

    let freqs = (0..num_bins)
        .map(|k| k as f64 * sample_rate / nperseg as f64)
        .collect();

    Ok(PsdResult { freqs, power })
}

/// Integrate uniformly spaced samples
pub fn integrate(values: &[f64], dx: f64, rule: Integration) -> f64 {
    match rule {
        Integration::Trapezoid => trapezoid(values, dx),
        Integration::Simpson => simpson(values, dx),
    }
}

fn trapezoid(values: &[f64], dx: f64) -> f64 {
    values.windows(2).map(|w| 0.5 * (w[0] + w[1]) * dx).sum()
}

fn simpson(values: &[f64], dx: f64) -> f64 {
    let n = values.len();
    match n {
        0 | 1 => 0.0,
        2 => trapezoid(values, dx),
        _ if n % 2 == 1 => simpson_odd(values, dx),
        _ => {
            let last = simpson_odd(&values[..n - 1], dx) + trapezoid(&values[n - 2..], dx);
            let first = trapezoid(&values[..2], dx) + simpson_odd(&values[1..], dx);
            0.5 * (last + first)
        }
    }
}

/// Composite Simpson over an odd number of points
fn simpson_odd(values: &[f64], dx: f64) -> f64 {
    let n = values.len();
    if n < 3 {
        return trapezoid(values, dx);
    }
    let interior: f64 = values[1..n - 1]
        .iter()
        .enumerate()
        .map(|(i, &v)| if i % 2 == 0 { 4.0 * v } else { 2.0 * v })
        .sum();
    dx / 3.0 * (values[0] + interior + values[n - 1])
}

/// Relative power of one band across a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPowers {
    pub band: FrequencyBand,

    /// One value per series, fraction of the series' total power
    pub relative: Vec<f64>,
}

/// Mean and standard deviation of a per-series quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStat {
    pub name: String,
    #[serde(with = "crate::float_serde")]
    pub mean: f64,
    #[serde(with = "crate::float_serde")]
    pub std: f64,
}

/// Relative band power and dominant frequency for every series of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPowerSummary {
    /// Sample or dataset analysis
    pub kind: AnalysisKind,

    /// Sample rate of the analysed batch (Hz)
    pub sample_rate: f64,

    /// Welch segment length actually used
    pub window_samples: usize,

    /// Relative power per band, in configuration order
    pub per_band: Vec<BandPowers>,

    /// Integral over [0, Nyquist] per series
    pub total_power: Vec<f64>,

    /// Frequency of the PSD maximum per series (Hz)
    pub dominant_freq: Vec<f64>,

    /// Mean Welch periodogram across the batch
    pub mean_psd: PsdResult,
}

impl BandPowerSummary {
    /// Per-series relative power of the band called `name`
    pub fn relative_power(&self, name: &str) -> Option<&[f64]> {
        self.per_band
            .iter()
            .find(|b| b.band.name == name)
            .map(|b| b.relative.as_slice())
    }

    pub fn num_series(&self) -> usize {
        self.dominant_freq.len()
    }

    /// Mean/std of every band, in configuration order
    pub fn band_stats(&self) -> Vec<BandStat> {
        self.per_band
            .iter()
            .map(|b| {
                let (mean, std) = mean_std(&b.relative);
                BandStat {
                    name: b.band.name.clone(),
                    mean,
                    std,
                }
            })
            .collect()
    }

    /// Mean/std of the dominant frequency
    pub fn dominant_stats(&self) -> BandStat {
        let (mean, std) = mean_std(&self.dominant_freq);
        BandStat {
            name: "dominant_frequency".into(),
            mean,
            std,
        }
    }

    /// Band with the largest mean relative power
    pub fn strongest_band(&self) -> Option<&FrequencyBand> {
        self.band_stats()
            .iter()
            .zip(self.per_band.iter())
            .fold(None::<(f64, &FrequencyBand)>, |best, (stat, b)| match best {
                Some((m, _)) if m >= stat.mean => best,
                _ => Some((stat.mean, &b.band)),
            })
            .map(|(_, band)| band)
    }
}

/// Side-by-side band statistics of two cached summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandComparison {
    pub real_label: String,
    pub synthetic_label: String,
    pub real: Vec<BandStat>,
    pub synthetic: Vec<BandStat>,
    pub real_dominant: BandStat,
    pub synthetic_dominant: BandStat,
}

impl BandComparison {
    /// Absolute difference of mean relative power per band
    pub fn mean_differences(&self) -> Vec<(String, f64)> {
        self.real
            .iter()
            .zip(self.synthetic.iter())
            .map(|(r, s)| (r.name.clone(), (r.mean - s.mean).abs()))
            .collect()
    }
}

/// Computes band power and keeps the last two labelled results
#[derive(Debug, Clone, Default)]
pub struct SpectralAnalyzer {
    config: SpectralConfig,
    cache: Vec<(String, BandPowerSummary)>,
}

impl SpectralAnalyzer {
    pub fn new(config: SpectralConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: Vec::with_capacity(CACHE_SLOTS),
        })
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    /// Relative band power of every series in `batch`, cached under `label`
    pub fn compute_relative_power(
        &mut self,
        batch: &SignalBatch,
        label: &str,
    ) -> Result<BandPowerSummary> {
        let sample_rate = batch.sample_rate();
        let mut nperseg = self.config.window_samples(sample_rate);
        let len = batch.series_len();

        if len < nperseg {
            if !self.config.clamp_window {
                return Err(FidelityError::InsufficientSamples {
                    needed: nperseg,
                    got: len,
                });
            }
            log::warn!(
                "{}: series of {} samples shorter than {} sample Welch window, clamping",
                label,
                len,
                nperseg
            );
            nperseg = len;
        }

        let config = &self.config;
        let per_series: Vec<SeriesBands> = batch
            .series()
            .par_iter()
            .enumerate()
            .map(|(idx, series)| analyze_series(label, idx, series, sample_rate, nperseg, config))
            .collect::<Result<Vec<_>>>()?;

        let summary = summarize(batch.kind(), sample_rate, nperseg, &self.config, per_series);

        for stat in summary.band_stats() {
            log::debug!(
                "{} mean relative {} power: {:.3} (std {:.3})",
                label,
                stat.name,
                stat.mean,
                stat.std
            );
        }
        let dominant = summary.dominant_stats();
        log::debug!(
            "{} dominant frequency: {:.3} Hz (std {:.3})",
            label,
            dominant.mean,
            dominant.std
        );

        self.store(label, summary.clone());
        Ok(summary)
    }

    /// Cached summary for `label`
    pub fn band_powers(&self, label: &str) -> Result<&BandPowerSummary> {
        self.cache
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, s)| s)
            .ok_or(FidelityError::PrecomputeRequired(
                "compute_relative_power has not run for this label",
            ))
    }

    /// Most recently stored summary
    pub fn last_summary(&self) -> Option<&BandPowerSummary> {
        self.cache.last().map(|(_, s)| s)
    }

    /// Labels currently cached, oldest first
    pub fn cached_labels(&self) -> Vec<&str> {
        self.cache.iter().map(|(l, _)| l.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Band statistics of two cached batches side by side
    pub fn compare(&self, real_label: &str, synthetic_label: &str) -> Result<BandComparison> {
        let real = self.band_powers(real_label)?;
        let synthetic = self.band_powers(synthetic_label)?;

        Ok(BandComparison {
            real_label: real_label.into(),
            synthetic_label: synthetic_label.into(),
            real: real.band_stats(),
            synthetic: synthetic.band_stats(),
            real_dominant: real.dominant_stats(),
            synthetic_dominant: synthetic.dominant_stats(),
        })
    }

    fn store(&mut self, label: &str, summary: BandPowerSummary) {
        self.cache.retain(|(l, _)| l != label);
        if self.cache.len() == CACHE_SLOTS {
            self.cache.remove(0);
        }
        self.cache.push((label.to_string(), summary));
    }
}

struct SeriesBands {
    psd: PsdResult,
    total: f64,
    relative: Vec<f64>,
    dominant: f64,
}

fn analyze_series(
    label: &str,
    idx: usize,
    series: &[f64],
    sample_rate: f64,
    nperseg: usize,
    config: &SpectralConfig,
) -> Result<SeriesBands> {
    let psd = welch_psd(series, sample_rate, nperseg)?;
    let nyquist = sample_rate / 2.0;

    let total = psd.integrate_where(|f| (0.0..=nyquist).contains(&f), config.integration);
    if !(total > 0.0) {
        return Err(FidelityError::DegenerateDistribution(format!(
            "{}: series {} has no spectral power",
            label, idx
        )));
    }

    let relative = config
        .bands
        .iter()
        .map(|band| psd.integrate_where(|f| band.contains(f), config.integration) / total)
        .collect();
    let dominant = psd.peak_frequency();

    Ok(SeriesBands {
        psd,
        total,
        relative,
        dominant,
    })
}

fn summarize(
    kind: AnalysisKind,
    sample_rate: f64,
    window_samples: usize,
    config: &SpectralConfig,
    per_series: Vec<SeriesBands>,
) -> BandPowerSummary {
    let per_band = config
        .bands
        .iter()
        .enumerate()
        .map(|(b, band)| BandPowers {
            band: band.clone(),
            relative: per_series.iter().map(|s| s.relative[b]).collect(),
        })
        .collect();

    let count = per_series.len() as f64;
    let freqs = per_series[0].psd.freqs.clone();
    let mut mean_power = vec![0.0; freqs.len()];
    for s in &per_series {
        for (acc, p) in mean_power.iter_mut().zip(s.psd.power.iter()) {
            *acc += p / count;
        }
    }

    BandPowerSummary {
        kind,
        sample_rate,
        window_samples,
        per_band,
        total_power: per_series.iter().map(|s| s.total).collect(),
        dominant_freq: per_series.iter().map(|s| s.dominant).collect(),
        mean_psd: PsdResult {
            freqs,
            power: mean_power,
        },
    }
}

/// Mean and population standard deviation
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
