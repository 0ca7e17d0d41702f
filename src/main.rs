use anyhow::{bail, Context, Result};
use clap::Parser;
use ecg_beat_segmenter::config::Args;
use ecg_beat_segmenter::data_loading::{find_recordings, read_recording, Recording};
use ecg_beat_segmenter::output::{write_segments_csv, PatientSegments};
use ecg_beat_segmenter::segmentation::common_length;
use ecg_beat_segmenter::{process_recording, PipelineConfig, RecordingResult};
use log::{debug, warn};
use rayon::prelude::*;
use std::path::Path;

fn process_file(
    path: &Path,
    args: &Args,
    config: &PipelineConfig,
) -> Result<(Recording, RecordingResult)> {
    let recording = read_recording(path, args.lead, args.sample_rate)?;
    let result = process_recording(&recording.signal, config)
        .with_context(|| format!("Failed to process recording {}", recording.id))?;
    Ok((recording, result))
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    let args = Args::parse();
    let config = args.pipeline_config()?;
    debug!("Pipeline config: {:?}", config);

    let paths = find_recordings(&args.input_path)?;
    if paths.is_empty() {
        bail!("No recordings found in {}", args.input_path.display());
    }
    println!("Processing {} recordings", paths.len());

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = args.jobs {
        pool = pool.num_threads(jobs);
    }
    let pool = pool.build().context("Failed to start worker pool")?;

    let processed: Vec<(Recording, RecordingResult)> = pool.install(|| {
        paths
            .par_iter()
            .filter_map(|path| match process_file(path, &args, &config) {
                Ok(done) => Some(done),
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    None
                }
            })
            .collect()
    });

    for (recording, result) in &processed {
        println!(
            "  {} ({}): {} peaks, {} segments",
            recording.id,
            recording.path.display(),
            result.peaks.len(),
            result.segments.len()
        );
    }

    let size = match common_length(processed.iter().flat_map(|(_, r)| r.segments.iter())) {
        Some(size) => size,
        None => bail!("No recording produced any segments"),
    };

    let patients: Vec<PatientSegments> = processed
        .iter()
        .map(|(recording, result)| PatientSegments {
            patient: &recording.id,
            segments: &result.segments,
        })
        .collect();

    let rows = write_segments_csv(&args.output, &patients, size)?;
    println!(
        "Wrote {} segments of {} samples from {} of {} recordings to {}",
        rows,
        size,
        processed.len(),
        paths.len(),
        args.output.display()
    );

    Ok(())
}
