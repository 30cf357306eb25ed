//! Descriptive statistics and real-vs-synthetic summaries

use crate::input::{AnalysisKind, SignalBatch};
use crate::{FidelityError, Result};
use serde::{Deserialize, Serialize};

/// Summary statistics of a pooled set of samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,

    /// Smallest most frequent value, `None` when undefined
    pub mode: Option<f64>,

    pub min: f64,
    pub max: f64,
    pub range: f64,

    /// Population variance
    pub variance: f64,
    pub std: f64,

    /// 75th minus 25th percentile
    pub iqr: f64,

    /// Biased sample skewness
    #[serde(with = "crate::float_serde")]
    pub skewness: f64,

    /// Biased excess (Fisher) kurtosis
    #[serde(with = "crate::float_serde")]
    pub kurtosis: f64,
}

impl DescriptiveStats {
    /// Statistics over every sample of every series in the batch
    pub fn compute(batch: &SignalBatch) -> Result<Self> {
        let stats = Self::from_values(&batch.pooled_vec())?;
        log::debug!(
            "{}: mean {:.6}, std {:.6} over {} samples",
            batch.kind().label(),
            stats.mean,
            stats.std,
            stats.count
        );
        Ok(stats)
    }

    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(FidelityError::InsufficientSamples { needed: 1, got: 0 });
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let moments = CentralMoments::of(values, mean);
        let min = sorted[0];
        let max = sorted[count - 1];

        Ok(Self {
            count,
            mean,
            median: percentile_sorted(&sorted, 50.0),
            mode: mode_sorted(&sorted),
            min,
            max,
            range: max - min,
            variance: moments.m2,
            std: moments.m2.sqrt(),
            iqr: percentile_sorted(&sorted, 75.0) - percentile_sorted(&sorted, 25.0),
            skewness: moments.skewness(),
            kurtosis: moments.excess_kurtosis(),
        })
    }
}

/// Second to fourth central moments (divided by n)
struct CentralMoments {
    m2: f64,
    m3: f64,
    m4: f64,
}

impl CentralMoments {
    fn of(values: &[f64], mean: f64) -> Self {
        let n = values.len() as f64;
        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for &v in values {
            let d = v - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }
        Self {
            m2: m2 / n,
            m3: m3 / n,
            m4: m4 / n,
        }
    }

    // NaN for constant data, as there is no spread to normalize by
    fn skewness(&self) -> f64 {
        if self.m2 == 0.0 {
            return f64::NAN;
        }
        self.m3 / self.m2.powf(1.5)
    }

    fn excess_kurtosis(&self) -> f64 {
        if self.m2 == 0.0 {
            return f64::NAN;
        }
        self.m4 / (self.m2 * self.m2) - 3.0
    }
}

/// Per-side shape statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideSummary {
    pub mean: f64,
    pub std: f64,
    pub max: f64,
    pub min: f64,
    #[serde(with = "crate::float_serde")]
    pub skewness: f64,
    #[serde(with = "crate::float_serde")]
    pub kurtosis: f64,
}

impl SideSummary {
    fn of(values: &[f64]) -> Result<Self> {
        let stats = DescriptiveStats::from_values(values)?;
        Ok(Self {
            mean: stats.mean,
            std: stats.std,
            max: stats.max,
            min: stats.min,
            skewness: stats.skewness,
            kurtosis: stats.kurtosis,
        })
    }
}

/// Side-by-side time-domain summary of real and synthetic data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedSummary {
    pub kind: AnalysisKind,
    pub real: SideSummary,
    pub synthetic: SideSummary,

    /// Pearson coefficient between two equal-length lone samples
    pub correlation: Option<f64>,

    /// Set when the inputs did not allow a correlation
    pub correlation_skipped: bool,
}

impl PairedSummary {
    /// Datasets are reduced to their ensemble mean wave first
    pub fn compute(real: &SignalBatch, synthetic: &SignalBatch) -> Result<Self> {
        let real_wave = representative_wave(real)?;
        let synthetic_wave = representative_wave(synthetic)?;

        let both_samples =
            real.kind() == AnalysisKind::Sample && synthetic.kind() == AnalysisKind::Sample;
        let correlation = if both_samples && real_wave.len() == synthetic_wave.len() {
            pearson(&real_wave, &synthetic_wave)
        } else {
            None
        };
        if correlation.is_none() {
            log::debug!("Correlation skipped for {} inputs", real.kind().label());
        }

        let kind = if real.is_dataset() || synthetic.is_dataset() {
            AnalysisKind::Dataset
        } else {
            AnalysisKind::Sample
        };

        Ok(Self {
            kind,
            real: SideSummary::of(&real_wave)?,
            synthetic: SideSummary::of(&synthetic_wave)?,
            correlation,
            correlation_skipped: correlation.is_none(),
        })
    }
}

fn representative_wave(batch: &SignalBatch) -> Result<Vec<f64>> {
    match batch.kind() {
        AnalysisKind::Dataset => Ok(ensemble_mean(batch)?.mean),
        AnalysisKind::Sample => Ok(batch.series_at(0)?.to_vec()),
    }
}

/// Per-sample mean and spread across the series of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWave {
    pub mean: Vec<f64>,

    /// Population std across series at each sample
    pub std: Vec<f64>,
}

/// Average wave of a batch, sample by sample
pub fn ensemble_mean(batch: &SignalBatch) -> Result<EnsembleWave> {
    let len = batch.series_len();
    let n = batch.num_series();
    if n == 0 || len == 0 {
        return Err(FidelityError::Shape("ensemble of an empty batch".into()));
    }

    let mut mean = vec![0.0; len];
    for series in batch.series() {
        for (m, &x) in mean.iter_mut().zip(series.iter()) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= n as f64;
    }

    let mut std = vec![0.0; len];
    for series in batch.series() {
        for ((s, &m), &x) in std.iter_mut().zip(mean.iter()).zip(series.iter()) {
            *s += (x - m).powi(2);
        }
    }
    for s in &mut std {
        *s = (*s / n as f64).sqrt();
    }

    Ok(EnsembleWave { mean, std })
}

/// Linearly interpolated percentile, `q` in `[0, 100]`. NaN for empty input.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, q)
}

fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn mode_sorted(sorted: &[f64]) -> Option<f64> {
    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let mut j = i + 1;
        while j < sorted.len() && sorted[j] == value {
            j += 1;
        }
        // Strictly greater keeps the smallest value on ties
        if !value.is_nan() && best.is_none_or(|(_, count)| j - i > count) {
            best = Some((value, j - i));
        }
        i = j;
    }
    best.map(|(value, _)| value)
}

/// Pearson correlation coefficient.
///
/// `None` when lengths differ, fewer than two points, or either side is constant.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom > 0.0 {
        Some((cov / denom).clamp(-1.0, 1.0))
    } else {
        None
    }
}
