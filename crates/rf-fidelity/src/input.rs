//! Input normalization: one signal or a dataset of signals

use crate::{FidelityError, Result};
use serde::{Deserialize, Serialize};

/// Sample rate used when the caller does not provide one (Hz)
pub const DEFAULT_SAMPLE_RATE: f64 = 2048.0;

/// Raw caller input before validation.
///
/// Deserializing from JSON classifies the value the same way every time: it is
/// a dataset iff its first element is itself an array, otherwise a lone signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalInput {
    /// A single series
    Sample(Vec<f64>),
    /// A collection of equal-length series
    Dataset(Vec<Vec<f64>>),
}

impl SignalInput {
    /// Parse and classify a JSON array
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Which kind of analysis this input triggers
    pub fn kind(&self) -> AnalysisKind {
        match self {
            SignalInput::Sample(_) => AnalysisKind::Sample,
            SignalInput::Dataset(_) => AnalysisKind::Dataset,
        }
    }
}

impl From<Vec<f64>> for SignalInput {
    fn from(series: Vec<f64>) -> Self {
        SignalInput::Sample(series)
    }
}

impl From<&[f64]> for SignalInput {
    fn from(series: &[f64]) -> Self {
        SignalInput::Sample(series.to_vec())
    }
}

impl From<Vec<Vec<f64>>> for SignalInput {
    fn from(series: Vec<Vec<f64>>) -> Self {
        SignalInput::Dataset(series)
    }
}

/// Sample analysis vs dataset analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisKind {
    Sample,
    Dataset,
}

impl AnalysisKind {
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisKind::Sample => "Sample Analysis",
            AnalysisKind::Dataset => "Dataset Analysis",
        }
    }
}

/// Validated batch of equal-length series sharing one sample rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSignalBatch")]
pub struct SignalBatch {
    series: Vec<Vec<f64>>,
    sample_rate: f64,
    kind: AnalysisKind,
}

/// Serialized form of [`SignalBatch`], validated on the way in
#[derive(Deserialize)]
struct RawSignalBatch {
    series: Vec<Vec<f64>>,
    sample_rate: f64,
    kind: AnalysisKind,
}

impl TryFrom<RawSignalBatch> for SignalBatch {
    type Error = FidelityError;

    fn try_from(raw: RawSignalBatch) -> Result<Self> {
        let input = match raw.kind {
            AnalysisKind::Dataset => SignalInput::Dataset(raw.series),
            AnalysisKind::Sample => {
                let mut series = raw.series;
                if series.len() != 1 {
                    return Err(FidelityError::Shape(format!(
                        "sample batch must hold exactly one series, got {}",
                        series.len()
                    )));
                }
                SignalInput::Sample(series.remove(0))
            }
        };
        Self::new(input, raw.sample_rate)
    }
}

impl SignalBatch {
    /// Normalize caller input into a batch
    pub fn new(input: SignalInput, sample_rate: f64) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(FidelityError::Config(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }

        let kind = input.kind();
        let series = match input {
            SignalInput::Sample(series) => vec![series],
            SignalInput::Dataset(series) => series,
        };

        let first_len = match series.first() {
            Some(first) => first.len(),
            None => return Err(FidelityError::Shape("batch contains no series".into())),
        };
        if first_len == 0 {
            return Err(FidelityError::Shape("series must contain at least one sample".into()));
        }
        if let Some((idx, ragged)) = series.iter().enumerate().find(|(_, s)| s.len() != first_len) {
            return Err(FidelityError::Shape(format!(
                "series {} has length {}, expected {}",
                idx,
                ragged.len(),
                first_len
            )));
        }

        log::debug!(
            "{}: {} series x {} samples @ {} Hz",
            kind.label(),
            series.len(),
            first_len,
            sample_rate
        );

        Ok(Self {
            series,
            sample_rate,
            kind,
        })
    }

    /// Build a dataset from a list of series
    pub fn from_series(series: Vec<Vec<f64>>, sample_rate: f64) -> Result<Self> {
        Self::new(SignalInput::Dataset(series), sample_rate)
    }

    /// Normalize input at [`DEFAULT_SAMPLE_RATE`]
    pub fn with_default_rate(input: SignalInput) -> Result<Self> {
        Self::new(input, DEFAULT_SAMPLE_RATE)
    }

    /// Draw `count` series from a generator and validate them
    pub fn generate<G: SampleGenerator + ?Sized>(
        generator: &mut G,
        count: usize,
        latent_dim: usize,
        sample_rate: f64,
    ) -> Result<Self> {
        let input = generator.generate(count, latent_dim)?;
        Self::new(input, sample_rate)
    }

    pub fn series(&self) -> &[Vec<f64>] {
        &self.series
    }

    /// Series at `index`, or a shape error when out of range
    pub fn series_at(&self, index: usize) -> Result<&[f64]> {
        self.series.get(index).map(Vec::as_slice).ok_or_else(|| {
            FidelityError::Shape(format!(
                "series index {} out of range for batch of {}",
                index,
                self.series.len()
            ))
        })
    }

    pub fn num_series(&self) -> usize {
        self.series.len()
    }

    /// Samples per series
    pub fn series_len(&self) -> usize {
        self.series.first().map_or(0, Vec::len)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub fn is_dataset(&self) -> bool {
        self.kind == AnalysisKind::Dataset
    }

    /// Every sample of every series, concatenated in order
    pub fn pooled(&self) -> impl Iterator<Item = f64> + '_ {
        self.series.iter().flat_map(|s| s.iter().copied())
    }

    pub fn pooled_vec(&self) -> Vec<f64> {
        self.pooled().collect()
    }

    /// Total number of samples across all series
    pub fn total_samples(&self) -> usize {
        self.series.len() * self.series_len()
    }
}

/// Producer of synthetic series (e.g. a trained generator network)
pub trait SampleGenerator {
    /// Produce `count` series from `latent_dim`-dimensional latent draws
    fn generate(&mut self, count: usize, latent_dim: usize) -> Result<SignalInput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_wraps_into_singleton() {
        let batch = SignalBatch::new(vec![0.1, 0.2, 0.3].into(), 8.0).unwrap();
        assert_eq!(batch.num_series(), 1);
        assert_eq!(batch.series_len(), 3);
        assert_eq!(batch.kind(), AnalysisKind::Sample);
        assert!(!batch.is_dataset());
    }

    #[test]
    fn test_dataset_kept_as_is() {
        let batch = SignalBatch::from_series(vec![vec![0.0; 4], vec![1.0; 4]], 8.0).unwrap();
        assert_eq!(batch.num_series(), 2);
        assert_eq!(batch.kind(), AnalysisKind::Dataset);
        assert_eq!(batch.pooled_vec(), vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_ragged_dataset_rejected() {
        let err = SignalBatch::from_series(vec![vec![0.0; 4], vec![1.0; 3]], 8.0).unwrap_err();
        assert!(matches!(err, FidelityError::Shape(_)));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(matches!(
            SignalBatch::from_series(vec![], 8.0),
            Err(FidelityError::Shape(_))
        ));
        assert!(matches!(
            SignalBatch::new(SignalInput::Sample(vec![]), 8.0),
            Err(FidelityError::Shape(_))
        ));
    }

    #[test]
    fn test_bad_sample_rate_rejected() {
        assert!(matches!(
            SignalBatch::new(vec![1.0].into(), 0.0),
            Err(FidelityError::Config(_))
        ));
        assert!(matches!(
            SignalBatch::new(vec![1.0].into(), f64::NAN),
            Err(FidelityError::Config(_))
        ));
    }

    #[test]
    fn test_json_classification() {
        let sample = SignalInput::from_json("[0.0, 1.0, 0.5]").unwrap();
        assert_eq!(sample.kind(), AnalysisKind::Sample);

        let dataset = SignalInput::from_json("[[0.0, 1.0], [0.5, 0.25]]").unwrap();
        assert_eq!(dataset.kind(), AnalysisKind::Dataset);

        assert!(SignalInput::from_json("[0.0, [1.0]]").is_err());
    }

    #[test]
    fn test_series_at_out_of_range() {
        let batch = SignalBatch::with_default_rate(vec![1.0, 2.0].into()).unwrap();
        assert_eq!(batch.sample_rate(), DEFAULT_SAMPLE_RATE);
        assert!(batch.series_at(0).is_ok());
        assert!(matches!(batch.series_at(1), Err(FidelityError::Shape(_))));
    }

    #[test]
    fn test_json_batch_round_trip() {
        let batch = SignalBatch::from_series(vec![vec![0.1, 0.2], vec![0.3, 0.4]], 8.0).unwrap();
        let json = serde_json::to_string(&batch).unwrap();
        let back: SignalBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, batch);
    }

    #[test]
    fn test_json_batch_is_validated() {
        let ragged = r#"{"series":[[0.1,0.2],[0.3]],"sample_rate":8.0,"kind":"Dataset"}"#;
        assert!(serde_json::from_str::<SignalBatch>(ragged).is_err());

        let empty = r#"{"series":[],"sample_rate":8.0,"kind":"Dataset"}"#;
        assert!(serde_json::from_str::<SignalBatch>(empty).is_err());

        let negative_rate = r#"{"series":[[0.1,0.2]],"sample_rate":-5.0,"kind":"Dataset"}"#;
        assert!(serde_json::from_str::<SignalBatch>(negative_rate).is_err());

        let two_samples = r#"{"series":[[0.1],[0.2]],"sample_rate":8.0,"kind":"Sample"}"#;
        assert!(serde_json::from_str::<SignalBatch>(two_samples).is_err());
    }

    struct Ramp;

    impl SampleGenerator for Ramp {
        fn generate(&mut self, count: usize, latent_dim: usize) -> Result<SignalInput> {
            Ok(SignalInput::Dataset(
                (0..count)
                    .map(|i| (0..latent_dim).map(|j| (i + j) as f64).collect())
                    .collect(),
            ))
        }
    }

    #[test]
    fn test_generator_output_is_validated() {
        let batch = SignalBatch::generate(&mut Ramp, 3, 5, 100.0).unwrap();
        assert_eq!(batch.num_series(), 3);
        assert_eq!(batch.series_len(), 5);
        assert!(batch.is_dataset());
    }
}
