use crate::config::BaselineConfig;
use crate::error::{EcgError, Result};
use crate::filters::highpass_zero_phase;
use crate::Signal;
use log::debug;

/// Subtracts the arithmetic mean.
pub fn remove_mean(data: &[f64]) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    data.iter().map(|&x| x - mean).collect()
}

/// Values at strict interior local minima and maxima.
fn interior_extrema(data: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut minima = Vec::new();
    let mut maxima = Vec::new();

    for window in data.windows(3) {
        let (pre, cur, nex) = (window[0], window[1], window[2]);
        if cur < pre && cur < nex {
            minima.push(cur);
        }
        if cur > pre && cur > nex {
            maxima.push(cur);
        }
    }

    (minima, maxima)
}

/// Dampens residual spikes left after wavelet denoising.
///
/// The band between the highest local minimum and the lowest local maximum
/// is treated as the normal range. Interior samples inside it are averaged
/// with whichever neighbours are also inside it; samples outside the band and
/// the two endpoints are copied unchanged.
pub fn smooth(data: &[f64]) -> Result<Vec<f64>> {
    let (minima, maxima) = interior_extrema(data);
    if minima.is_empty() || maxima.is_empty() {
        return Err(EcgError::DegenerateInput(format!(
            "no interior local {} in {} samples",
            if minima.is_empty() { "minimum" } else { "maximum" },
            data.len()
        )));
    }

    let mut upmin = minima.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut lmax = maxima.iter().copied().fold(f64::INFINITY, f64::min);
    if lmax < upmin {
        std::mem::swap(&mut lmax, &mut upmin);
    }
    debug!("smoothing band [{:.4}, {:.4}]", upmin, lmax);

    let in_band = |x: f64| upmin <= x && x <= lmax;

    let mut result = Vec::with_capacity(data.len());
    result.push(data[0]);
    for window in data.windows(3) {
        let (pre, cur, nex) = (window[0], window[1], window[2]);
        let value = if in_band(cur) {
            match (in_band(pre), in_band(nex)) {
                (true, true) => (pre + cur + nex) / 3.0,
                (true, false) => (pre + cur) / 2.0,
                (false, true) => (cur + nex) / 2.0,
                (false, false) => cur,
            }
        } else {
            cur
        };
        result.push(value);
    }
    result.push(data[data.len() - 1]);

    Ok(result)
}

/// Removes slow baseline drift with a zero-phase Butterworth high-pass.
pub fn remove_baseline_wander(signal: &Signal, config: &BaselineConfig) -> Result<Signal> {
    let filtered = highpass_zero_phase(
        signal.samples(),
        signal.sample_rate(),
        config.cutoff_hz,
        config.order,
    )?;
    Ok(signal.with_samples(filtered))
}
