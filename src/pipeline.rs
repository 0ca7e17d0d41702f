use crate::config::PipelineConfig;
use crate::denoise::denoise;
use crate::error::{EcgError, Result};
use crate::preprocessing::remove_baseline_wander;
use crate::qrs::detect_peaks;
use crate::segmentation::{segment, Segment};
use crate::Signal;
use log::debug;

/// Everything derived from one recording.
#[derive(Debug, Clone)]
pub struct RecordingResult {
    pub clean: Signal,
    pub peaks: Vec<usize>,
    pub segments: Vec<Segment>,
}

/// Wavelet denoising followed by baseline wander removal.
pub fn clean_signal(signal: &Signal, config: &PipelineConfig) -> Result<Signal> {
    let denoised = denoise(signal, &config.denoise)?;
    remove_baseline_wander(&denoised, &config.baseline)
}

/// Cleans a recording, detects its R-peaks and cuts it into beat segments.
///
/// A recording that yields no segments is reported as `InsufficientData`
/// so batch callers can skip it.
pub fn process_recording(signal: &Signal, config: &PipelineConfig) -> Result<RecordingResult> {
    let clean = clean_signal(signal, config)?;
    let peaks = detect_peaks(&clean, &config.detector)?;
    let segments = segment(&clean, &peaks, &config.segment);

    if segments.is_empty() {
        return Err(EcgError::InsufficientData(format!(
            "{} peaks detected, need at least {} for one segment",
            peaks.len(),
            config.segment.beats
        )));
    }

    debug!(
        "{} samples -> {} peaks -> {} segments",
        signal.len(),
        peaks.len(),
        segments.len()
    );

    Ok(RecordingResult {
        clean,
        peaks,
        segments,
    })
}
