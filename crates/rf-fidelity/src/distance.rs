//! Histogram-based probability distances
//!
//! KL, JS, Hellinger and Bhattacharyya pool every sample of a batch into one
//! histogram. Wasserstein is the exception: it is evaluated for every
//! (reference series, candidate series) pair and summarized.

use crate::config::HistogramConfig;
use crate::histogram::{bin_counts, bin_edges, raw_density, HistogramDistribution};
use crate::input::{AnalysisKind, SignalBatch};
use crate::{FidelityError, Result};
use serde::{Deserialize, Serialize};

/// Mean and spread of the pairwise earth mover's distances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WassersteinSummary {
    /// Mean over all series pairs
    pub mean: f64,

    /// Population standard deviation over all series pairs
    pub std: f64,

    /// Number of pairs evaluated
    pub pairs: usize,
}

/// All five distances for one reference/candidate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceReport {
    pub reference_kind: AnalysisKind,
    pub candidate_kind: AnalysisKind,
    pub wasserstein: WassersteinSummary,
    #[serde(with = "crate::float_serde")]
    pub kl_divergence: f64,
    #[serde(with = "crate::float_serde")]
    pub js_distance: f64,
    #[serde(with = "crate::float_serde")]
    pub hellinger: f64,
    #[serde(with = "crate::float_serde")]
    pub bhattacharyya: f64,
    pub config: HistogramConfig,
}

impl DistanceReport {
    pub fn compute(
        reference: &SignalBatch,
        candidate: &SignalBatch,
        config: &HistogramConfig,
    ) -> Result<Self> {
        config.validate()?;

        let p = HistogramDistribution::pooled(reference, config)?;
        let q = HistogramDistribution::pooled(candidate, config)?;

        let report = Self {
            reference_kind: reference.kind(),
            candidate_kind: candidate.kind(),
            wasserstein: wasserstein_distance(reference, candidate, config)?,
            kl_divergence: kl_from_pmf(&p.density, &q.density),
            js_distance: js_from_pmf(&p.density, &q.density),
            hellinger: hellinger_from_pmf(&p.density, &q.density),
            bhattacharyya: bhattacharyya_distance(reference, candidate, config)?,
            config: config.clone(),
        };

        log::debug!(
            "{}: WD {:.6} (std {:.6}), KL {:.6}, JS {:.6}, Hellinger {:.6}, Bhattacharyya {:.6}",
            reference.kind().label(),
            report.wasserstein.mean,
            report.wasserstein.std,
            report.kl_divergence,
            report.js_distance,
            report.hellinger,
            report.bhattacharyya
        );

        Ok(report)
    }
}

/// Mean earth mover's distance over every reference × candidate series pair.
///
/// Each series gets its own (unsmoothed) density histogram; the bin midpoints
/// are the shared support and the densities act as mass weights.
pub fn wasserstein_distance(
    reference: &SignalBatch,
    candidate: &SignalBatch,
    config: &HistogramConfig,
) -> Result<WassersteinSummary> {
    config.validate()?;

    let edges = bin_edges(config);
    let midpoints: Vec<f64> = edges.windows(2).map(|e| (e[0] + e[1]) / 2.0).collect();

    let ref_weights = series_weights(reference, config)?;
    let cand_weights = series_weights(candidate, config)?;

    let mut distances = Vec::with_capacity(ref_weights.len() * cand_weights.len());
    for u in &ref_weights {
        for v in &cand_weights {
            distances.push(emd_1d(&midpoints, u, v));
        }
    }

    let pairs = distances.len();
    let mean = distances.iter().sum::<f64>() / pairs as f64;
    let var = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / pairs as f64;

    Ok(WassersteinSummary {
        mean,
        std: var.sqrt(),
        pairs,
    })
}

/// Kullback-Leibler divergence D(reference ‖ candidate) in nats. Not symmetric.
pub fn kl_divergence(
    reference: &SignalBatch,
    candidate: &SignalBatch,
    config: &HistogramConfig,
) -> Result<f64> {
    let (p, q) = pooled_pair(reference, candidate, config)?;
    Ok(kl_from_pmf(&p.density, &q.density))
}

/// Jensen-Shannon distance (square root of the base-2 divergence), in [0, 1]
pub fn js_distance(
    reference: &SignalBatch,
    candidate: &SignalBatch,
    config: &HistogramConfig,
) -> Result<f64> {
    let (p, q) = pooled_pair(reference, candidate, config)?;
    Ok(js_from_pmf(&p.density, &q.density))
}

/// Hellinger distance, in [0, 1]
pub fn hellinger_distance(
    reference: &SignalBatch,
    candidate: &SignalBatch,
    config: &HistogramConfig,
) -> Result<f64> {
    let (p, q) = pooled_pair(reference, candidate, config)?;
    Ok(hellinger_from_pmf(&p.density, &q.density))
}

/// Bhattacharyya distance over the pooled density histograms.
///
/// The coefficient uses the bin width of the combined data span,
/// `(max - min) / num_bins`. A coefficient of exactly zero yields `+inf`.
pub fn bhattacharyya_distance(
    reference: &SignalBatch,
    candidate: &SignalBatch,
    config: &HistogramConfig,
) -> Result<f64> {
    config.validate()?;

    let width = config.bin_width();
    let p = raw_density(&bin_counts(reference.pooled(), config), width)
        .ok_or_else(|| out_of_range("reference", config))?;
    let q = raw_density(&bin_counts(candidate.pooled(), config), width)
        .ok_or_else(|| out_of_range("candidate", config))?;

    let (min, max) = reference
        .pooled()
        .chain(candidate.pooled())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let data_width = (max - min) / config.num_bins as f64;

    let coefficient: f64 = p
        .iter()
        .zip(q.iter())
        .map(|(a, b)| (a * b).sqrt() * data_width)
        .sum();

    if coefficient == 0.0 {
        log::debug!("Bhattacharyya coefficient is zero, distributions do not overlap");
        return Ok(f64::INFINITY);
    }
    Ok(-coefficient.ln())
}

fn pooled_pair(
    reference: &SignalBatch,
    candidate: &SignalBatch,
    config: &HistogramConfig,
) -> Result<(HistogramDistribution, HistogramDistribution)> {
    Ok((
        HistogramDistribution::pooled(reference, config)?,
        HistogramDistribution::pooled(candidate, config)?,
    ))
}

fn series_weights(batch: &SignalBatch, config: &HistogramConfig) -> Result<Vec<Vec<f64>>> {
    let width = config.bin_width();
    batch
        .series()
        .iter()
        .enumerate()
        .map(|(idx, series)| {
            raw_density(&bin_counts(series.iter().copied(), config), width).ok_or_else(|| {
                FidelityError::DegenerateDistribution(format!(
                    "series {} has no samples inside range ({}, {})",
                    idx, config.range.0, config.range.1
                ))
            })
        })
        .collect()
}

fn out_of_range(side: &str, config: &HistogramConfig) -> FidelityError {
    FidelityError::DegenerateDistribution(format!(
        "{} has no samples inside range ({}, {})",
        side, config.range.0, config.range.1
    ))
}

/// 1-D earth mover's distance between two weightings of the same sorted support
fn emd_1d(support: &[f64], u: &[f64], v: &[f64]) -> f64 {
    let u_total: f64 = u.iter().sum();
    let v_total: f64 = v.iter().sum();

    let mut u_cdf = 0.0;
    let mut v_cdf = 0.0;
    let mut distance = 0.0;
    for i in 0..support.len().saturating_sub(1) {
        u_cdf += u[i] / u_total;
        v_cdf += v[i] / v_total;
        distance += (u_cdf - v_cdf).abs() * (support[i + 1] - support[i]);
    }
    distance
}

pub(crate) fn kl_from_pmf(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q.iter())
        .map(|(&pi, &qi)| rel_entr(pi, qi))
        .sum()
}

pub(crate) fn js_from_pmf(p: &[f64], q: &[f64]) -> f64 {
    let divergence: f64 = p
        .iter()
        .zip(q.iter())
        .map(|(&pi, &qi)| {
            let mi = 0.5 * (pi + qi);
            0.5 * (rel_entr(pi, mi) + rel_entr(qi, mi))
        })
        .sum::<f64>()
        / std::f64::consts::LN_2;

    divergence.max(0.0).sqrt()
}

pub(crate) fn hellinger_from_pmf(p: &[f64], q: &[f64]) -> f64 {
    let sum_sq: f64 = p
        .iter()
        .zip(q.iter())
        .map(|(&pi, &qi)| (pi.sqrt() - qi.sqrt()).powi(2))
        .sum();
    sum_sq.sqrt() / std::f64::consts::SQRT_2
}

/// Elementwise relative entropy `x ln(x / y)` with the usual zero conventions
fn rel_entr(x: f64, y: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else if y == 0.0 {
        f64::INFINITY
    } else {
        x * (x / y).ln()
    }
}
