//! # rf-fidelity
//!
//! Fidelity metrics for comparing a batch of real time series against a batch
//! of synthetic (generator-produced) time series.
//!
//! ## Features
//!
//! - **Distribution Metrics**: Wasserstein, KL, Jensen-Shannon, Hellinger and
//!   Bhattacharyya distances over binned amplitude histograms
//! - **Spectral Analysis**: Welch PSD, relative band power, dominant frequency
//! - **Time-Frequency**: Morlet scalograms and cross-scalogram similarity (MSE,
//!   correlation, cosine, SSIM)
//! - **Descriptive Statistics**: moments, percentiles and paired summaries
//! - **Report Generation**: JSON, Markdown and plain-text fidelity reports
//!
//! ## Example
//!
//! ```rust,ignore
//! use rf_fidelity::{FidelityConfig, FidelityReport, SignalBatch};
//!
//! let real = SignalBatch::new(real_series.into(), 2048.0)?;
//! let synthetic = SignalBatch::new(synthetic_series.into(), 2048.0)?;
//!
//! let report = FidelityReport::evaluate(&real, &synthetic, &FidelityConfig::default())?;
//! println!("{}", report.summary());
//! ```

pub mod config;
pub mod distance;
mod float_serde;
pub mod histogram;
pub mod input;
pub mod report;
pub mod scalogram;
pub mod spectral;
pub mod stats;

pub use config::{FidelityConfig, HistogramConfig, ScalogramConfig, SpectralConfig};
pub use distance::{
    bhattacharyya_distance, hellinger_distance, js_distance, kl_divergence, wasserstein_distance,
    DistanceReport, WassersteinSummary,
};
pub use histogram::{freedman_diaconis_bins, HistogramDistribution};
pub use input::{AnalysisKind, SampleGenerator, SignalBatch, SignalInput, DEFAULT_SAMPLE_RATE};
pub use report::{FidelityReport, ReportFormat};
pub use scalogram::{
    Scalogram, ScalogramPair, ScalogramSimilarity, ScalogramState, TimeFrequencyAnalyzer,
};
pub use spectral::{
    canonical_bands, BandComparison, BandPowerSummary, FrequencyBand, Integration, PsdResult,
    SpectralAnalyzer,
};
pub use stats::{DescriptiveStats, EnsembleWave, PairedSummary};

use thiserror::Error;

/// Errors that can occur while scoring real against synthetic series
#[derive(Error, Debug)]
pub enum FidelityError {
    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Insufficient samples: need {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    #[error("Result not computed yet: {0}")]
    PrecomputeRequired(&'static str),

    #[error("Degenerate distribution: {0}")]
    DegenerateDistribution(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("FFT error: {0}")]
    Fft(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FidelityError>;

/// Score two batches with default settings
pub fn quick_evaluate(real: &SignalBatch, synthetic: &SignalBatch) -> Result<FidelityReport> {
    FidelityReport::evaluate(real, synthetic, &FidelityConfig::default())
}

/// All five histogram distances with the default binning
pub fn quick_distances(reference: &SignalBatch, candidate: &SignalBatch) -> Result<DistanceReport> {
    DistanceReport::compute(reference, candidate, &HistogramConfig::default())
}
