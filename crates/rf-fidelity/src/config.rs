//! Configuration for fidelity scoring

use crate::histogram::freedman_diaconis_bins;
use crate::input::{SignalBatch, DEFAULT_SAMPLE_RATE};
use crate::spectral::{canonical_bands, FrequencyBand, Integration};
use crate::{FidelityError, Result};
use serde::{Deserialize, Serialize};

/// Binning used by the histogram distances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    /// Number of equal-width bins
    pub num_bins: usize,

    /// Lower and upper edge of the binned value range
    pub range: (f64, f64),

    /// Added to every bin before normalization
    pub epsilon: f64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            num_bins: 30,
            range: (0.0, 1.0),
            epsilon: 1e-10,
        }
    }
}

impl HistogramConfig {
    pub fn new(num_bins: usize, range: (f64, f64)) -> Self {
        Self {
            num_bins,
            range,
            ..Default::default()
        }
    }

    /// Bins from the Freedman-Diaconis rule over both batches, range spanning their values
    pub fn auto(reference: &SignalBatch, candidate: &SignalBatch) -> Self {
        let values: Vec<f64> = reference.pooled().chain(candidate.pooled()).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = if max > min { (min, max) } else { (min - 0.5, min + 0.5) };

        Self {
            num_bins: freedman_diaconis_bins(&values),
            range,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_bins == 0 {
            return Err(FidelityError::Config("num_bins must be at least 1".into()));
        }
        let (lo, hi) = self.range;
        if !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(FidelityError::Config(format!(
                "histogram range must be finite and increasing, got ({}, {})",
                lo, hi
            )));
        }
        if !(self.epsilon >= 0.0) {
            return Err(FidelityError::Config("epsilon must be non-negative".into()));
        }
        Ok(())
    }

    /// Width of one bin
    pub fn bin_width(&self) -> f64 {
        (self.range.1 - self.range.0) / self.num_bins as f64
    }

    /// Builder pattern: set bin count
    pub fn with_bins(mut self, num_bins: usize) -> Self {
        self.num_bins = num_bins;
        self
    }

    /// Builder pattern: set value range
    pub fn with_range(mut self, lo: f64, hi: f64) -> Self {
        self.range = (lo, hi);
        self
    }

    /// Builder pattern: set smoothing epsilon
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

/// Welch PSD and band-power settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralConfig {
    /// Welch segment length in seconds
    pub window_seconds: f64,

    /// Shrink the segment to the series length instead of failing
    pub clamp_window: bool,

    /// Numerical integration rule for band power
    pub integration: Integration,

    /// Bands reported as relative power
    pub bands: Vec<FrequencyBand>,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            window_seconds: 4.0,
            clamp_window: true,
            integration: Integration::Trapezoid,
            bands: canonical_bands(),
        }
    }
}

impl SpectralConfig {
    /// Segment length in samples at `sample_rate`
    pub fn window_samples(&self, sample_rate: f64) -> usize {
        (self.window_seconds * sample_rate).round() as usize
    }

    pub fn validate(&self) -> Result<()> {
        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(FidelityError::Config(format!(
                "window_seconds must be positive, got {}",
                self.window_seconds
            )));
        }
        if self.bands.is_empty() {
            return Err(FidelityError::Config("at least one band is required".into()));
        }
        for band in &self.bands {
            band.validate()?;
        }
        Ok(())
    }

    /// Builder pattern: set Welch window length
    pub fn with_window_seconds(mut self, seconds: f64) -> Self {
        self.window_seconds = seconds;
        self
    }

    /// Builder pattern: fail on short series instead of clamping
    pub fn strict_window(mut self) -> Self {
        self.clamp_window = false;
        self
    }

    /// Builder pattern: set integration rule
    pub fn with_integration(mut self, integration: Integration) -> Self {
        self.integration = integration;
        self
    }

    /// Builder pattern: replace the band list
    pub fn with_bands(mut self, bands: Vec<FrequencyBand>) -> Self {
        self.bands = bands;
        self
    }
}

/// Scalogram settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalogramConfig {
    /// Target frequencies (Hz), one scalogram row each
    pub frequencies: Vec<f64>,

    /// Morlet shape parameter
    pub omega0: f64,

    /// SSIM window side length (odd)
    pub ssim_window: usize,
}

impl Default for ScalogramConfig {
    fn default() -> Self {
        Self {
            frequencies: linspace(1.0, 30.0, 30),
            omega0: 5.0,
            ssim_window: 7,
        }
    }
}

impl ScalogramConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frequencies.is_empty() {
            return Err(FidelityError::Config("at least one frequency is required".into()));
        }
        if let Some(f) = self.frequencies.iter().find(|f| !f.is_finite() || **f <= 0.0) {
            return Err(FidelityError::Config(format!(
                "scalogram frequencies must be positive, got {}",
                f
            )));
        }
        if self.ssim_window < 3 || self.ssim_window % 2 == 0 {
            return Err(FidelityError::Config(format!(
                "SSIM window must be odd and >= 3, got {}",
                self.ssim_window
            )));
        }
        Ok(())
    }

    /// Builder pattern: evenly spaced frequencies
    pub fn with_frequency_range(mut self, min_hz: f64, max_hz: f64, count: usize) -> Self {
        self.frequencies = linspace(min_hz, max_hz, count);
        self
    }

    /// Builder pattern: set Morlet shape parameter
    pub fn with_omega0(mut self, omega0: f64) -> Self {
        self.omega0 = omega0;
        self
    }
}

/// Top-level configuration for a full fidelity report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FidelityConfig {
    /// Sample rate assumed for raw input (Hz)
    pub sample_rate: f64,

    /// Histogram distance settings
    pub histogram: HistogramConfig,

    /// Band power settings
    pub spectral: SpectralConfig,

    /// Scalogram settings
    pub scalogram: ScalogramConfig,

    /// Series index compared by scalogram; `None` skips the time-frequency stage
    pub scalogram_index: Option<usize>,
}

impl Default for FidelityConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            histogram: HistogramConfig::default(),
            spectral: SpectralConfig::default(),
            scalogram: ScalogramConfig::default(),
            scalogram_index: Some(0),
        }
    }
}

impl FidelityConfig {
    /// Physiological recordings (ECoG/EEG) at 2048 Hz with canonical bands
    pub fn eeg() -> Self {
        Self::default()
    }

    /// Distances and band powers only, no scalogram
    pub fn quick() -> Self {
        Self {
            scalogram_index: None,
            ..Default::default()
        }
    }

    /// Load from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(FidelityError::Config(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        self.histogram.validate()?;
        self.spectral.validate()?;
        self.scalogram.validate()
    }

    /// Builder pattern: set sample rate
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Builder pattern: set histogram bin count
    pub fn with_bins(mut self, num_bins: usize) -> Self {
        self.histogram.num_bins = num_bins;
        self
    }

    /// Builder pattern: set histogram range
    pub fn with_range(mut self, lo: f64, hi: f64) -> Self {
        self.histogram.range = (lo, hi);
        self
    }

    /// Builder pattern: pick the scalogram series
    pub fn with_scalogram_index(mut self, index: Option<usize>) -> Self {
        self.scalogram_index = index;
        self
    }
}

/// `count` evenly spaced values from `start` to `stop` inclusive
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FidelityConfig::default();
        assert_eq!(config.sample_rate, 2048.0);
        assert_eq!(config.histogram.num_bins, 30);
        assert_eq!(config.histogram.range, (0.0, 1.0));
        assert_eq!(config.spectral.window_samples(2048.0), 8192);
        assert_eq!(config.scalogram.frequencies.len(), 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_linspace_endpoints() {
        let f = linspace(1.0, 30.0, 30);
        assert_eq!(f[0], 1.0);
        assert_eq!(f[29], 30.0);
        assert!((f[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_histogram_rejected() {
        assert!(HistogramConfig::default().with_bins(0).validate().is_err());
        assert!(HistogramConfig::default().with_range(1.0, 1.0).validate().is_err());
        assert!(HistogramConfig::default().with_epsilon(-1.0).validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = FidelityConfig::default()
            .with_sample_rate(256.0)
            .with_bins(10)
            .with_range(-1.0, 1.0)
            .with_scalogram_index(None);

        assert_eq!(config.sample_rate, 256.0);
        assert_eq!(config.histogram.num_bins, 10);
        assert_eq!(config.histogram.range, (-1.0, 1.0));
        assert!(config.scalogram_index.is_none());
        assert!((config.histogram.bin_width() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_json_roundtrip_validates() {
        let json = FidelityConfig::quick().to_json().unwrap();
        let parsed = FidelityConfig::from_json(&json).unwrap();
        assert_eq!(parsed, FidelityConfig::quick());

        let broken = json.replace("\"num_bins\": 30", "\"num_bins\": 0");
        assert!(FidelityConfig::from_json(&broken).is_err());
    }

    #[test]
    fn test_auto_bins_span_values() {
        let a = SignalBatch::new(vec![-2.0, -1.0, 0.0, 1.0, 2.0].into(), 8.0).unwrap();
        let b = SignalBatch::new(vec![0.5, 0.25, 3.0].into(), 8.0).unwrap();
        let config = HistogramConfig::auto(&a, &b);
        assert_eq!(config.range, (-2.0, 3.0));
        assert!(config.num_bins >= 1);
        assert!(config.validate().is_ok());
    }
}
