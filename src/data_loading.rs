use crate::config::LeadSelection;
use crate::Signal;
use anyhow::{bail, Context, Result};
use log::debug;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One row of a recording export: `timestamp,lead1,lead2`.
#[derive(Debug, Deserialize)]
struct RecordingRow {
    timestamp: f64,
    lead1: f64,
    lead2: f64,
}

/// A patient's recording with the selected lead loaded.
#[derive(Debug)]
pub struct Recording {
    pub id: String,
    pub path: PathBuf,
    pub signal: Signal,
}

/// Lists recording CSV files under `root`, sorted by path.
///
/// `root` may also name a single file, which is returned as is.
pub fn find_recordings(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        bail!("Input path does not exist: {}", root.display());
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry =
            entry.with_context(|| format!("Failed to scan directory: {}", root.display()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    debug!("Found {} recordings under {}", paths.len(), root.display());
    Ok(paths)
}

/// Sample rate implied by the first two timestamps, rounded to 1e-6 Hz.
fn rate_from_timestamps(first: f64, second: f64) -> Option<f64> {
    let step = second - first;
    if !(step.is_finite() && step > 0.0) {
        return None;
    }
    Some(((1.0 / step) * 1e6).round() / 1e6)
}

/// Reads one lead of a recording.
///
/// The sample rate comes from `sample_rate` when given, otherwise from the
/// spacing of the first two timestamps.
pub fn read_recording(
    path: &Path,
    lead: LeadSelection,
    sample_rate: Option<f64>,
) -> Result<Recording> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut timestamps = Vec::with_capacity(2);
    let mut samples = Vec::new();
    for (row, result) in rdr.deserialize::<RecordingRow>().enumerate() {
        let record = result
            .with_context(|| format!("Malformed row {} in {}", row + 1, path.display()))?;
        if timestamps.len() < 2 {
            timestamps.push(record.timestamp);
        }
        samples.push(match lead {
            LeadSelection::First => record.lead1,
            LeadSelection::Second => record.lead2,
        });
    }

    let rate = match sample_rate {
        Some(rate) => rate,
        None => match timestamps.as_slice() {
            [first, second] => rate_from_timestamps(*first, *second).with_context(|| {
                format!(
                    "Timestamps {} and {} in {} do not give a sample rate",
                    first,
                    second,
                    path.display()
                )
            })?,
            _ => bail!(
                "{} has fewer than two rows, pass --sample-rate",
                path.display()
            ),
        },
    };

    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("recording")
        .to_string();
    let signal = Signal::new(samples, rate)
        .with_context(|| format!("Invalid recording: {}", path.display()))?;

    debug!(
        "Loaded {} ({} samples at {} Hz, {:?})",
        id,
        signal.len(),
        rate,
        lead
    );

    Ok(Recording {
        id,
        path: path.to_path_buf(),
        signal,
    })
}
