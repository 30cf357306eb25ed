//! Binned amplitude distributions

use crate::config::HistogramConfig;
use crate::input::SignalBatch;
use crate::stats::percentile;
use crate::{FidelityError, Result};
use serde::{Deserialize, Serialize};

/// Normalized probability mass over fixed, equal-width bins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramDistribution {
    /// Bin edges, `num_bins + 1` values
    pub bin_edges: Vec<f64>,

    /// Probability mass per bin (sums to 1)
    pub density: Vec<f64>,

    /// Raw in-range counts per bin
    pub counts: Vec<u64>,
}

impl HistogramDistribution {
    /// Pool every sample of the batch, bin once, smooth with epsilon and normalize
    pub fn pooled(batch: &SignalBatch, config: &HistogramConfig) -> Result<Self> {
        config.validate()?;
        let counts = bin_counts(batch.pooled(), config);
        Self::from_counts(counts, config)
    }

    /// Histogram of a raw slice with the same contract as [`Self::pooled`]
    pub fn from_values(values: &[f64], config: &HistogramConfig) -> Result<Self> {
        config.validate()?;
        let counts = bin_counts(values.iter().copied(), config);
        Self::from_counts(counts, config)
    }

    fn from_counts(counts: Vec<u64>, config: &HistogramConfig) -> Result<Self> {
        let mut density = raw_density(&counts, config.bin_width()).ok_or_else(|| {
            FidelityError::DegenerateDistribution(format!(
                "no samples inside range ({}, {})",
                config.range.0, config.range.1
            ))
        })?;

        for d in &mut density {
            *d += config.epsilon;
        }
        let total: f64 = density.iter().sum();
        if !(total > 0.0) || !total.is_finite() {
            return Err(FidelityError::DegenerateDistribution(format!(
                "histogram mass {} after smoothing",
                total
            )));
        }
        for d in &mut density {
            *d /= total;
        }

        Ok(Self {
            bin_edges: bin_edges(config),
            density,
            counts,
        })
    }

    pub fn num_bins(&self) -> usize {
        self.density.len()
    }

    /// Centre of each bin
    pub fn midpoints(&self) -> Vec<f64> {
        self.bin_edges.windows(2).map(|e| (e[0] + e[1]) / 2.0).collect()
    }

    /// Total number of samples that fell inside the range
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Equally spaced edges over the configured range
pub(crate) fn bin_edges(config: &HistogramConfig) -> Vec<f64> {
    let (lo, hi) = config.range;
    let n = config.num_bins;
    (0..=n)
        .map(|i| if i == n { hi } else { lo + (hi - lo) * i as f64 / n as f64 })
        .collect()
}

/// Counts per bin. Values outside the range are dropped; the last bin is closed.
pub(crate) fn bin_counts(values: impl Iterator<Item = f64>, config: &HistogramConfig) -> Vec<u64> {
    let (lo, hi) = config.range;
    let n = config.num_bins;
    let mut counts = vec![0u64; n];
    let scale = n as f64 / (hi - lo);

    for v in values {
        if !(v >= lo && v <= hi) {
            continue;
        }
        let idx = (((v - lo) * scale) as usize).min(n - 1);
        counts[idx] += 1;
    }
    counts
}

/// Density (`count / (total * width)`), `None` when no sample landed in range
pub(crate) fn raw_density(counts: &[u64], bin_width: f64) -> Option<Vec<f64>> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return None;
    }
    let norm = total as f64 * bin_width;
    Some(counts.iter().map(|&c| c as f64 / norm).collect())
}

/// Bin count from the Freedman-Diaconis rule, between 1 and the number of values
pub fn freedman_diaconis_bins(values: &[f64]) -> usize {
    if values.len() < 2 {
        return 1;
    }
    let iqr = percentile(values, 75.0) - percentile(values, 25.0);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    let bin_width = 2.0 * iqr / (values.len() as f64).cbrt();
    if !(bin_width > 0.0) || !(span > 0.0) {
        return 1;
    }
    // A narrow IQR next to a far outlier would otherwise ask for billions of bins
    let bins = (span / bin_width).ceil();
    if bins >= values.len() as f64 {
        return values.len();
    }
    (bins as usize).max(1)
}
