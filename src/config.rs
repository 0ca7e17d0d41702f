use crate::error::EcgError;
use crate::wavelet::Wavelet;
use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeadSelection {
    #[default]
    First, // 1: lead1 column (default)
    Second, // 2: lead2 column
}

impl FromStr for LeadSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "lead1" => Ok(LeadSelection::First),
            "2" | "lead2" => Ok(LeadSelection::Second),
            _ => Err(format!(
                "Invalid lead selection: {}. Use 1 for lead1 (default) or 2 for lead2",
                s
            )),
        }
    }
}

/// Extract peak-anchored beat segments from ECG recordings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Recording CSV file, or a directory searched recursively for them
    #[arg(help = "Recording CSV file or directory of recordings")]
    pub input_path: PathBuf,

    /// Output CSV for the normalised segment table
    #[arg(long, default_value = "normalised_data.csv")]
    pub output: PathBuf,

    /// Lead driving detection (1=lead1 [default], 2=lead2)
    #[arg(long, default_value = "1")]
    pub lead: LeadSelection,

    /// Sample rate in Hz, overrides the rate derived from timestamps
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// JSON file with pipeline settings
    #[arg(long, env = "ECG_PIPELINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Wavelet used by the denoiser (haar, db4, db5)
    #[arg(long)]
    pub wavelet: Option<Wavelet>,

    /// Decomposition depth of the denoiser
    #[arg(long)]
    pub levels: Option<usize>,

    /// Number of beats per segment
    #[arg(long)]
    pub beats: Option<usize>,

    /// Samples kept before the first and after the last peak of a sliding segment
    #[arg(long)]
    pub margin: Option<usize>,

    /// Step by whole segments instead of sliding one beat at a time
    #[arg(long)]
    pub no_slide: bool,

    /// Worker threads, defaults to the number of CPUs
    #[arg(long)]
    pub jobs: Option<usize>,
}

impl Args {
    /// Settings from `--config` (or defaults) with command line overrides applied.
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(wavelet) = self.wavelet {
            config.denoise.wavelet = wavelet;
        }
        if let Some(levels) = self.levels {
            config.denoise.levels = levels;
        }
        if let Some(beats) = self.beats {
            config.segment.beats = beats;
        }
        if let Some(margin) = self.margin {
            config.segment.margin = margin;
        }
        if self.no_slide {
            config.segment.slide = false;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Wavelet denoiser settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    pub wavelet: Wavelet,
    pub levels: usize,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            wavelet: Wavelet::Db5,
            levels: 10,
        }
    }
}

/// High-pass stage removing baseline drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub cutoff_hz: f64,
    pub order: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: 0.5,
            order: 4,
        }
    }
}

/// QRS detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub low_hz: f64,
    pub high_hz: f64,
    pub filter_order: usize,
    /// Move each detection onto the largest deflection of the cleaned signal
    pub localize: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            low_hz: 5.0,
            high_hz: 15.0,
            filter_order: 1,
            localize: true,
        }
    }
}

/// Peak-anchored windowing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub beats: usize,
    pub margin: usize,
    pub slide: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            beats: 2,
            margin: 128,
            slide: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub denoise: DenoiseConfig,
    pub baseline: BaselineConfig,
    pub detector: DetectorConfig,
    pub segment: SegmentConfig,
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Checks the values that do not depend on a particular recording.
    pub fn validate(&self) -> Result<(), EcgError> {
        if self.denoise.levels == 0 {
            return Err(EcgError::InvalidParameter(
                "denoise.levels must be at least 1".to_string(),
            ));
        }
        if self.baseline.order == 0 || self.detector.filter_order == 0 {
            return Err(EcgError::InvalidParameter(
                "filter orders must be at least 1".to_string(),
            ));
        }
        if !(self.detector.low_hz > 0.0 && self.detector.low_hz < self.detector.high_hz) {
            return Err(EcgError::InvalidParameter(format!(
                "detector band {}-{} Hz is empty",
                self.detector.low_hz, self.detector.high_hz
            )));
        }
        if self.segment.beats == 0 {
            return Err(EcgError::InvalidParameter(
                "segment.beats must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
