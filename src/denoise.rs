//! Wavelet-domain denoising.
//!
//! The signal is decomposed, the number of high-frequency detail bands to
//! treat is chosen from the shape of the band energy curve, those bands are
//! soft-thresholded with the universal threshold, and the result is
//! reconstructed and smoothed.

use crate::config::DenoiseConfig;
use crate::error::{EcgError, Result};
use crate::preprocessing::{remove_mean, smooth};
use crate::wavelet::{CoefficientBands, DetailLevel, Wavelet};
use crate::Signal;
use log::{debug, trace};

/// Scale factor turning the median absolute deviation into a Gaussian sigma
const MAD_TO_SIGMA: f64 = 0.6745;

/// Number of bands denoised when the energy curve has no interior extremum
const FALLBACK_DENOISE_LEVEL: usize = 3;

/// Log-energy of each detail band, finest band first.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyProfile {
    values: Vec<f64>,
}

impl EnergyProfile {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn energy(&self, level: DetailLevel) -> f64 {
        self.values[level.profile_index()]
    }
}

/// Universal threshold of each detail band, finest band first.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdProfile {
    values: Vec<f64>,
}

impl ThresholdProfile {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn threshold(&self, level: DetailLevel) -> f64 {
        self.values[level.profile_index()]
    }
}

/// Decomposition of one signal together with its band statistics.
#[derive(Debug, Clone)]
pub struct BandAnalysis {
    pub bands: CoefficientBands,
    pub energy: EnergyProfile,
    pub thresholds: ThresholdProfile,
}

/// Natural log of the summed squared coefficients.
pub fn band_energy(band: &[f64]) -> Result<f64> {
    let sum: f64 = band.iter().map(|c| c * c).sum();
    if sum == 0.0 {
        return Err(EcgError::DegenerateInput(
            "detail band has zero energy".to_string(),
        ));
    }
    let energy = sum.ln();
    if !energy.is_finite() {
        return Err(EcgError::NumericalInstability(format!(
            "band energy is not finite (sum of squares {})",
            sum
        )));
    }
    Ok(energy)
}

/// VisuShrink threshold `median(|c|) / 0.6745 * sqrt(2 log10(n))`.
///
/// `signal_len` is the length of the decomposed signal, not of the band.
pub fn universal_threshold(band: &[f64], signal_len: usize) -> Result<f64> {
    if band.iter().all(|&c| c == 0.0) {
        return Err(EcgError::NumericalInstability(
            "threshold of an all-zero band is undefined".to_string(),
        ));
    }

    let magnitudes: Vec<f64> = band.iter().map(|c| c.abs()).collect();
    let sigma = median(&magnitudes) / MAD_TO_SIGMA;
    let threshold = sigma * (2.0 * (signal_len as f64).log10()).sqrt();

    if !threshold.is_finite() {
        return Err(EcgError::NumericalInstability(format!(
            "band threshold is not finite (sigma {})",
            sigma
        )));
    }
    Ok(threshold)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Decomposes a signal and computes energy and threshold profiles.
#[derive(Debug, Clone, Copy)]
pub struct WaveletEnergyAnalyzer {
    wavelet: Wavelet,
    levels: usize,
}

impl WaveletEnergyAnalyzer {
    pub fn new(wavelet: Wavelet, levels: usize) -> Self {
        Self { wavelet, levels }
    }

    /// `data` is expected to be zero-centred.
    pub fn analyze(&self, data: &[f64]) -> Result<BandAnalysis> {
        let bands = self.wavelet.wavedec(data, self.levels)?;

        let mut energy = Vec::with_capacity(self.levels);
        let mut thresholds = Vec::with_capacity(self.levels);
        for level in bands.detail_levels() {
            let band = bands.detail(level);
            energy.push(band_energy(band)?);
            thresholds.push(universal_threshold(band, data.len())?);
        }

        trace!("band energies (fine to coarse): {:?}", energy);
        trace!("band thresholds (fine to coarse): {:?}", thresholds);

        Ok(BandAnalysis {
            bands,
            energy: EnergyProfile::new(energy),
            thresholds: ThresholdProfile::new(thresholds),
        })
    }
}

/// Chooses how many of the finest detail bands to denoise.
///
/// The first strict local maximum and the first strict local minimum of the
/// energy curve are located (as 1-based positions). Whichever sits at the
/// earlier position wins; positions beyond 3 are pulled towards the fine
/// end by halving. Without an interior extremum the fallback is 3 bands.
pub fn select_denoise_level(energy: &EnergyProfile) -> usize {
    let values = energy.as_slice();
    let n = values.len();

    let mut max_loc = None;
    let mut min_loc = None;
    for i in 1..n.saturating_sub(1) {
        let (pre, cur, nex) = (values[i - 1], values[i], values[i + 1]);
        if max_loc.is_none() && cur > pre && cur > nex {
            max_loc = Some(i + 1);
        }
        if min_loc.is_none() && cur < pre && cur < nex {
            min_loc = Some(i + 1);
        }
    }

    let location = match (max_loc, min_loc) {
        (Some(mx), Some(mn)) => {
            if mx < mn {
                mx
            } else {
                mn
            }
        }
        (Some(mx), None) => mx,
        (None, Some(mn)) => mn,
        (None, None) => return FALLBACK_DENOISE_LEVEL.min(n),
    };

    let level = if location > 3 {
        (location + 1) / 2
    } else {
        location
    };
    level.min(n)
}

/// Standard soft-threshold shrinkage of one coefficient.
pub fn soft_threshold(coefficient: f64, threshold: f64) -> f64 {
    if coefficient.abs() < threshold {
        0.0
    } else {
        coefficient.signum() * (coefficient.abs() - threshold)
    }
}

/// Shrinks the `bands` finest detail bands and leaves the rest untouched.
#[derive(Debug, Clone, Copy)]
pub struct SoftThresholdDenoiser {
    bands: usize,
}

impl SoftThresholdDenoiser {
    pub fn new(bands: usize) -> Self {
        Self { bands }
    }

    pub fn shrink(
        &self,
        coefficients: &CoefficientBands,
        thresholds: &ThresholdProfile,
    ) -> CoefficientBands {
        coefficients.map_details(|level, band| {
            if level.get() <= self.bands {
                let t = thresholds.threshold(level);
                band.iter().map(|&c| soft_threshold(c, t)).collect()
            } else {
                band.to_vec()
            }
        })
    }

    /// Shrinks and reconstructs a signal of the original length.
    pub fn denoise(
        &self,
        coefficients: &CoefficientBands,
        thresholds: &ThresholdProfile,
    ) -> Result<Vec<f64>> {
        let rebuilt = self.shrink(coefficients, thresholds).reconstruct()?;
        Ok(fit_to_length(rebuilt, coefficients.signal_len()))
    }
}

/// Truncates a reconstruction to `len`, or pads it by repeating its last sample.
pub fn fit_to_length(mut samples: Vec<f64>, len: usize) -> Vec<f64> {
    if samples.len() >= len {
        samples.truncate(len);
    } else {
        let fill = samples.last().copied().unwrap_or(0.0);
        samples.resize(len, fill);
    }
    samples
}

/// Removes high-frequency noise: centre, shrink the selected wavelet bands,
/// reconstruct and smooth.
pub fn denoise(signal: &Signal, config: &DenoiseConfig) -> Result<Signal> {
    let centred = remove_mean(signal.samples());

    let analysis = WaveletEnergyAnalyzer::new(config.wavelet, config.levels).analyze(&centred)?;
    let level = select_denoise_level(&analysis.energy);
    debug!(
        "denoising {} of {} detail bands ({:?})",
        level,
        analysis.bands.levels(),
        config.wavelet
    );

    let denoised =
        SoftThresholdDenoiser::new(level).denoise(&analysis.bands, &analysis.thresholds)?;
    let smoothed = smooth(&denoised)?;

    Ok(signal.with_samples(smoothed))
}
