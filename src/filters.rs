use crate::error::{EcgError, Result};
use log::trace;
use sci_rs::signal::filter::design::{
    butter_dyn, DigitalFilter, FilterBandType, FilterOutputType, Sos,
};
use sci_rs::signal::filter::{sosfilt_dyn, sosfiltfilt_dyn};

/// Designs a digital Butterworth filter as second-order sections.
///
/// Corner frequencies are in Hz and must lie strictly between 0 and the
/// Nyquist frequency of `sample_rate`.
pub fn butterworth(
    order: usize,
    corners_hz: &[f64],
    band: FilterBandType,
    sample_rate: f64,
) -> Result<Vec<Sos<f64>>> {
    let nyquist = sample_rate / 2.0;
    if order == 0 {
        return Err(EcgError::InvalidParameter(
            "filter order must be at least 1".to_string(),
        ));
    }
    if let Some(bad) = corners_hz.iter().find(|&&f| !(f > 0.0 && f < nyquist)) {
        return Err(EcgError::InvalidParameter(format!(
            "corner frequency {} Hz outside (0, {}) Hz",
            bad, nyquist
        )));
    }

    let filter = butter_dyn(
        order,
        corners_hz.to_vec(),
        Some(band),
        Some(false),
        Some(FilterOutputType::Sos),
        Some(sample_rate),
    );

    match filter {
        DigitalFilter::Sos(filter) => {
            trace!("designed {} second-order sections", filter.sos.len());
            Ok(filter.sos)
        }
        _ => Err(EcgError::InvalidParameter(
            "filter design did not return second-order sections".to_string(),
        )),
    }
}

/// Shortest input `sosfiltfilt` can pad for the given number of sections.
pub fn filtfilt_min_len(sections: usize) -> usize {
    3 * (2 * sections + 1) + 1
}

/// Zero-phase high-pass filter.
pub fn highpass_zero_phase(
    data: &[f64],
    sample_rate: f64,
    cutoff_hz: f64,
    order: usize,
) -> Result<Vec<f64>> {
    let sos = butterworth(order, &[cutoff_hz], FilterBandType::Highpass, sample_rate)?;

    let min_len = filtfilt_min_len(sos.len());
    if data.len() < min_len {
        return Err(EcgError::InsufficientData(format!(
            "zero-phase filtering needs at least {} samples, got {}",
            min_len,
            data.len()
        )));
    }

    Ok(sosfiltfilt_dyn(data.iter(), &sos))
}

/// Causal band-pass filter starting from rest.
pub fn bandpass_causal(
    data: &[f64],
    sample_rate: f64,
    low_hz: f64,
    high_hz: f64,
    order: usize,
) -> Result<Vec<f64>> {
    let mut sos = butterworth(
        order,
        &[low_hz, high_hz],
        FilterBandType::Bandpass,
        sample_rate,
    )?;
    Ok(sosfilt_dyn(data.iter(), &mut sos))
}
