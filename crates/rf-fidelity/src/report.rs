//! Report generation for fidelity evaluations

use crate::config::FidelityConfig;
use crate::distance::DistanceReport;
use crate::input::{AnalysisKind, SignalBatch, SignalInput};
use crate::scalogram::{ScalogramSimilarity, TimeFrequencyAnalyzer};
use crate::spectral::{BandComparison, SpectralAnalyzer};
use crate::stats::{DescriptiveStats, PairedSummary};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

const REAL_LABEL: &str = "real";
const SYNTHETIC_LABEL: &str = "synthetic";

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Plain text report
    Text,
    /// JSON report
    Json,
    /// Markdown report
    Markdown,
}

/// Every fidelity metric for one real/synthetic pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FidelityReport {
    /// Report title
    pub title: String,

    /// Sample or dataset analysis
    pub kind: AnalysisKind,

    /// Pooled statistics of the real batch
    pub real_stats: DescriptiveStats,

    /// Pooled statistics of the synthetic batch
    pub synthetic_stats: DescriptiveStats,

    /// Time-domain comparison
    pub paired: PairedSummary,

    /// Histogram distances
    pub distances: DistanceReport,

    /// Relative band power of both batches
    pub bands: BandComparison,

    /// Scalogram similarity, when enabled
    pub scalogram: Option<ScalogramSimilarity>,

    /// Series compared by the scalogram stage
    pub scalogram_index: Option<usize>,
}

impl FidelityReport {
    /// Run every analysis stage on the two batches
    pub fn evaluate(
        real: &SignalBatch,
        synthetic: &SignalBatch,
        config: &FidelityConfig,
    ) -> Result<Self> {
        config.validate()?;

        let real_stats = DescriptiveStats::compute(real)?;
        let synthetic_stats = DescriptiveStats::compute(synthetic)?;
        let paired = PairedSummary::compute(real, synthetic)?;
        let distances = DistanceReport::compute(real, synthetic, &config.histogram)?;

        let mut spectral = SpectralAnalyzer::new(config.spectral.clone())?;
        spectral.compute_relative_power(real, REAL_LABEL)?;
        spectral.compute_relative_power(synthetic, SYNTHETIC_LABEL)?;
        let bands = spectral.compare(REAL_LABEL, SYNTHETIC_LABEL)?;

        let scalogram = match config.scalogram_index {
            Some(index) => {
                let mut analyzer = TimeFrequencyAnalyzer::new(config.scalogram.clone())?;
                analyzer.compute_scalogram(real, synthetic, index)?;
                Some(analyzer.similarity_metrics()?)
            }
            None => None,
        };

        let report = Self {
            title: "Fidelity Report".into(),
            kind: paired.kind,
            real_stats,
            synthetic_stats,
            paired,
            distances,
            bands,
            scalogram,
            scalogram_index: config.scalogram_index,
        };
        log::info!("{}", report.summary());
        Ok(report)
    }

    /// Wrap raw inputs at the configured sample rate, then evaluate
    pub fn from_inputs(
        real: SignalInput,
        synthetic: SignalInput,
        config: &FidelityConfig,
    ) -> Result<Self> {
        let real = SignalBatch::new(real, config.sample_rate)?;
        let synthetic = SignalBatch::new(synthetic, config.sample_rate)?;
        Self::evaluate(&real, &synthetic, config)
    }

    /// Builder pattern: set title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// One-line digest of the headline metrics
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: W {:.4}, KL {:.4}, JS {:.4}, Hellinger {:.4}, Bhattacharyya {:.4}",
            self.kind.label(),
            self.distances.wasserstein.mean,
            self.distances.kl_divergence,
            self.distances.js_distance,
            self.distances.hellinger,
            self.distances.bhattacharyya
        );
        if let Some(sim) = &self.scalogram {
            line.push_str(&format!(", SSIM {:.4}", sim.ssim));
        }
        line
    }

    /// Generate report in specified format
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.to_text(),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Markdown => self.to_markdown(),
        }
    }

    /// Save report to file
    pub fn save<P: AsRef<Path>>(&self, path: P, format: ReportFormat) -> Result<()> {
        let content = self.generate(format);
        let mut file = std::fs::File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", self.title));
        output.push_str(&format!("{}\n\n", "=".repeat(self.title.len())));
        output.push_str(&format!("{}\n\n", self.kind.label()));

        output.push_str("Descriptive statistics (real / synthetic):\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for (name, r, s) in stat_rows(&self.real_stats, &self.synthetic_stats) {
            output.push_str(&format!("  {:<20} {:>14.6} {:>14.6}\n", name, r, s));
        }
        let mode = |m: Option<f64>| m.map_or_else(|| "undefined".to_string(), |v| format!("{:.6}", v));
        output.push_str(&format!(
            "  {:<20} {:>14} {:>14}\n\n",
            "mode",
            mode(self.real_stats.mode),
            mode(self.synthetic_stats.mode)
        ));

        match self.paired.correlation {
            Some(c) => output.push_str(&format!("Correlation: {:.6}\n\n", c)),
            None => output.push_str("Correlation: skipped\n\n"),
        }

        output.push_str("Distances:\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format!(
            "  Wasserstein          {:.6} ± {:.6} ({} pairs)\n",
            self.distances.wasserstein.mean,
            self.distances.wasserstein.std,
            self.distances.wasserstein.pairs
        ));
        output.push_str(&format!("  KL divergence        {:.6}\n", self.distances.kl_divergence));
        output.push_str(&format!("  JS distance          {:.6}\n", self.distances.js_distance));
        output.push_str(&format!("  Hellinger            {:.6}\n", self.distances.hellinger));
        output.push_str(&format!("  Bhattacharyya        {:.6}\n\n", self.distances.bhattacharyya));

        output.push_str("Relative band power (real / synthetic):\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        for (r, s) in self.bands.real.iter().zip(self.bands.synthetic.iter()) {
            output.push_str(&format!(
                "  {:<10} {:.4} ± {:.4}   {:.4} ± {:.4}\n",
                r.name, r.mean, r.std, s.mean, s.std
            ));
        }
        output.push_str(&format!(
            "  dominant   {:.2} Hz      {:.2} Hz\n",
            self.bands.real_dominant.mean, self.bands.synthetic_dominant.mean
        ));

        if let (Some(sim), Some(index)) = (&self.scalogram, self.scalogram_index) {
            output.push_str(&format!("\nScalogram similarity (series {}):\n", index));
            output.push_str(&"-".repeat(60));
            output.push('\n');
            output.push_str(&format!("  MSE                  {:.6}\n", sim.mse));
            output.push_str(&format!("  Correlation          {:.6}\n", sim.correlation));
            output.push_str(&format!("  Cosine similarity    {:.6}\n", sim.cosine_similarity));
            output.push_str(&format!("  SSIM                 {:.6}\n", sim.ssim));
        }

        output
    }

    fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into())
    }

    fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", self.title));
        output.push_str(&format!("**Analysis:** {}\n\n", self.kind.label()));

        output.push_str("## Descriptive Statistics\n\n");
        output.push_str("| Metric | Real | Synthetic |\n");
        output.push_str("|--------|------|-----------|\n");
        for (name, r, s) in stat_rows(&self.real_stats, &self.synthetic_stats) {
            output.push_str(&format!("| {} | {:.6} | {:.6} |\n", name, r, s));
        }
        if let Some(c) = self.paired.correlation {
            output.push_str(&format!("\n**Correlation:** {:.6}\n", c));
        }
        output.push('\n');

        output.push_str("## Distances\n\n");
        output.push_str("| Metric | Value |\n");
        output.push_str("|--------|-------|\n");
        output.push_str(&format!(
            "| Wasserstein (mean ± std) | {:.6} ± {:.6} |\n",
            self.distances.wasserstein.mean, self.distances.wasserstein.std
        ));
        output.push_str(&format!("| KL divergence | {:.6} |\n", self.distances.kl_divergence));
        output.push_str(&format!("| JS distance | {:.6} |\n", self.distances.js_distance));
        output.push_str(&format!("| Hellinger | {:.6} |\n", self.distances.hellinger));
        output.push_str(&format!("| Bhattacharyya | {:.6} |\n\n", self.distances.bhattacharyya));

        output.push_str("## Band Power\n\n");
        output.push_str("| Band | Real | Synthetic |\n");
        output.push_str("|------|------|-----------|\n");
        for (r, s) in self.bands.real.iter().zip(self.bands.synthetic.iter()) {
            output.push_str(&format!(
                "| {} | {:.4} ± {:.4} | {:.4} ± {:.4} |\n",
                r.name, r.mean, r.std, s.mean, s.std
            ));
        }
        output.push_str(&format!(
            "| Dominant frequency (Hz) | {:.2} | {:.2} |\n",
            self.bands.real_dominant.mean, self.bands.synthetic_dominant.mean
        ));

        if let Some(sim) = &self.scalogram {
            output.push_str("\n## Scalogram Similarity\n\n");
            output.push_str("| Metric | Value |\n");
            output.push_str("|--------|-------|\n");
            output.push_str(&format!("| MSE | {:.6} |\n", sim.mse));
            output.push_str(&format!("| Correlation | {:.6} |\n", sim.correlation));
            output.push_str(&format!("| Cosine similarity | {:.6} |\n", sim.cosine_similarity));
            output.push_str(&format!("| SSIM | {:.6} |\n", sim.ssim));
        }

        output
    }
}

fn stat_rows(real: &DescriptiveStats, synthetic: &DescriptiveStats) -> Vec<(&'static str, f64, f64)> {
    vec![
        ("mean", real.mean, synthetic.mean),
        ("median", real.median, synthetic.median),
        ("std", real.std, synthetic.std),
        ("variance", real.variance, synthetic.variance),
        ("min", real.min, synthetic.min),
        ("max", real.max, synthetic.max),
        ("range", real.range, synthetic.range),
        ("iqr", real.iqr, synthetic.iqr),
        ("skewness", real.skewness, synthetic.skewness),
        ("kurtosis", real.kurtosis, synthetic.kurtosis),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn wave(freq: f64, phase: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 0.5 + 0.4 * (2.0 * PI * freq * i as f64 / sample_rate + phase).sin())
            .collect()
    }

    fn make_report(scalogram_index: Option<usize>) -> FidelityReport {
        let fs = 128.0;
        let real = SignalBatch::from_series(
            vec![wave(10.0, 0.0, fs, 512), wave(10.0, 0.5, fs, 512)],
            fs,
        )
        .unwrap();
        let synthetic = SignalBatch::from_series(
            vec![wave(11.0, 0.0, fs, 512), wave(9.0, 1.0, fs, 512)],
            fs,
        )
        .unwrap();
        let config = FidelityConfig::default()
            .with_sample_rate(fs)
            .with_scalogram_index(scalogram_index);
        FidelityReport::evaluate(&real, &synthetic, &config).unwrap()
    }

    #[test]
    fn test_evaluate_fills_every_stage() {
        let report = make_report(Some(1));
        assert_eq!(report.kind, AnalysisKind::Dataset);
        assert_eq!(report.distances.wasserstein.pairs, 4);
        assert_eq!(report.bands.real.len(), 5);
        assert!(report.paired.correlation_skipped);
        assert!(report.scalogram.is_some());
        assert_eq!(report.scalogram_index, Some(1));
    }

    #[test]
    fn test_quick_config_skips_scalogram() {
        let report = make_report(None);
        assert!(report.scalogram.is_none());
        assert!(!report.summary().contains("SSIM"));
    }

    #[test]
    fn test_text_report() {
        let text = make_report(Some(0)).with_title("EEG Fidelity").generate(ReportFormat::Text);
        assert!(text.contains("EEG Fidelity\n============"));
        assert!(text.contains("Dataset Analysis"));
        assert!(text.contains("Hellinger"));
        assert!(text.contains("alpha"));
        assert!(text.contains("SSIM"));
    }

    #[test]
    fn test_json_report() {
        let json = make_report(None).generate(ReportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["title"], "Fidelity Report");
        assert!(value["distances"]["js_distance"].is_number());
        assert!(value["scalogram"].is_null());
    }

    #[test]
    fn test_markdown_report() {
        let md = make_report(Some(0)).generate(ReportFormat::Markdown);
        assert!(md.contains("# Fidelity Report"));
        assert!(md.contains("| Metric | Value |"));
        assert!(md.contains("## Scalogram Similarity"));
    }

    #[test]
    fn test_json_keeps_infinite_distance() {
        let fs = 64.0;
        let low: Vec<f64> = (0..256)
            .map(|i| 0.1 + 0.05 * (2.0 * PI * 8.0 * i as f64 / fs).sin())
            .collect();
        let high: Vec<f64> = low.iter().map(|x| x + 0.8).collect();
        let config = FidelityConfig::quick().with_sample_rate(fs).with_bins(2);

        let report = FidelityReport::from_inputs(low.into(), high.into(), &config).unwrap();
        assert!(report.distances.bhattacharyya.is_infinite());

        let json = report.generate(ReportFormat::Json);
        assert!(json.contains(r#""bhattacharyya": "inf""#));

        let back: FidelityReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.distances.bhattacharyya, f64::INFINITY);
        assert_abs_diff_eq!(back.distances.js_distance, report.distances.js_distance, epsilon = 1e-12);
        assert_abs_diff_eq!(back.paired.correlation.unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_save_report() {
        let report = make_report(None);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fidelity.md");

        report.save(&path, ReportFormat::Markdown).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, report.generate(ReportFormat::Markdown));
    }

    #[test]
    fn test_from_inputs_uses_config_rate() {
        let fs = 64.0;
        let config = FidelityConfig::quick().with_sample_rate(fs);
        let report = FidelityReport::from_inputs(
            wave(8.0, 0.0, fs, 256).into(),
            wave(8.0, 0.3, fs, 256).into(),
            &config,
        )
        .unwrap();
        assert_eq!(report.kind, AnalysisKind::Sample);
        assert!(report.paired.correlation.is_some());
    }
}
