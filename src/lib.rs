pub mod config;
pub mod data_loading;
pub mod denoise;
pub mod error;
pub mod filters;
pub mod output;
pub mod pipeline;
pub mod preprocessing;
pub mod qrs;
pub mod segmentation;
pub mod wavelet;

pub use config::{BaselineConfig, DenoiseConfig, DetectorConfig, PipelineConfig, SegmentConfig};
pub use denoise::denoise;
pub use error::{EcgError, Result};
pub use pipeline::{clean_signal, process_recording, RecordingResult};
pub use qrs::detect_peaks;
pub use segmentation::{segment, Segment};

/// A single-channel recording at a fixed sample rate.
///
/// Stages never mutate a signal in place; each returns a new one that
/// shares the sample rate of its input.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Vec<f64>,
    sample_rate: f64,
}

impl Signal {
    pub fn new(samples: Vec<f64>, sample_rate: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(EcgError::InvalidParameter(format!(
                "sample rate must be positive and finite, got {}",
                sample_rate
            )));
        }
        Ok(Signal {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// New signal at the same sample rate.
    pub fn with_samples(&self, samples: Vec<f64>) -> Signal {
        Signal {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    /// Number of samples spanning `seconds`, rounded to the nearest sample.
    pub fn samples_for(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate).round() as usize
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }
}
