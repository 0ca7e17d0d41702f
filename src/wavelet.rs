//! Multilevel discrete wavelet transform.
//!
//! Decomposition uses half-sample symmetric boundary extension, so a
//! single level maps `N` samples onto `floor((N + F - 1) / 2)` coefficients
//! per band for a filter of length `F`. Reconstruction of a level yields
//! `2n - F + 2` samples, which can be one sample longer than the input of
//! the matching decomposition step when that input had odd length.

use crate::error::{EcgError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const HAAR_REC_LO: [f64; 2] = [
    std::f64::consts::FRAC_1_SQRT_2,
    std::f64::consts::FRAC_1_SQRT_2,
];

const DB4_REC_LO: [f64; 8] = [
    0.23037781330885523,
    0.7148465705525415,
    0.6308807679295904,
    -0.02798376941698385,
    -0.18703481171888114,
    0.030841381835986965,
    0.032883011666982945,
    -0.010597401784997278,
];

const DB5_REC_LO: [f64; 10] = [
    0.160102397974125,
    0.6038292697974729,
    0.7243085284385744,
    0.13842814590110342,
    -0.24229488706619015,
    -0.03224486958502952,
    0.07757149384006515,
    -0.006241490213011705,
    -0.012580751999015526,
    0.0033357252850015492,
];

/// Orthogonal Daubechies family members supported by the denoiser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wavelet {
    #[serde(alias = "db1")]
    Haar,
    Db4,
    Db5,
}

impl FromStr for Wavelet {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "haar" | "db1" => Ok(Wavelet::Haar),
            "db4" => Ok(Wavelet::Db4),
            "db5" => Ok(Wavelet::Db5),
            _ => Err(format!("Unsupported wavelet: {}. Use haar, db4 or db5", s)),
        }
    }
}

/// Analysis and synthesis filters of one wavelet.
#[derive(Debug, Clone)]
struct FilterBank {
    dec_lo: Vec<f64>,
    dec_hi: Vec<f64>,
    rec_lo: Vec<f64>,
    rec_hi: Vec<f64>,
}

impl Wavelet {
    fn scaling_coefficients(&self) -> &'static [f64] {
        match self {
            Wavelet::Haar => &HAAR_REC_LO,
            Wavelet::Db4 => &DB4_REC_LO,
            Wavelet::Db5 => &DB5_REC_LO,
        }
    }

    pub fn filter_len(&self) -> usize {
        self.scaling_coefficients().len()
    }

    fn filter_bank(&self) -> FilterBank {
        let rec_lo = self.scaling_coefficients().to_vec();
        let dec_lo: Vec<f64> = rec_lo.iter().rev().copied().collect();
        // Quadrature mirror of the scaling filter
        let dec_hi: Vec<f64> = rec_lo
            .iter()
            .enumerate()
            .map(|(i, &c)| if i % 2 == 0 { -c } else { c })
            .collect();
        let rec_hi: Vec<f64> = dec_hi.iter().rev().copied().collect();

        FilterBank {
            dec_lo,
            dec_hi,
            rec_lo,
            rec_hi,
        }
    }

    /// Deepest decomposition that still leaves every band longer than the filter.
    pub fn max_level(&self, signal_len: usize) -> usize {
        let ratio = signal_len / (self.filter_len() - 1);
        if ratio < 1 {
            0
        } else {
            ratio.ilog2() as usize
        }
    }

    /// Single level decomposition into (approximation, detail).
    pub fn dwt(&self, data: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let bank = self.filter_bank();
        let n = data.len();
        let taps = bank.dec_lo.len();
        if n == 0 {
            return (Vec::new(), Vec::new());
        }

        let out_len = (n + taps - 1) / 2;
        let mut approx = Vec::with_capacity(out_len);
        let mut detail = Vec::with_capacity(out_len);

        for o in 0..out_len {
            let centre = (2 * o + 1) as isize;
            let mut a = 0.0;
            let mut d = 0.0;
            for j in 0..taps {
                let x = data[symmetric_index(centre - j as isize, n)];
                a += bank.dec_lo[j] * x;
                d += bank.dec_hi[j] * x;
            }
            approx.push(a);
            detail.push(d);
        }

        (approx, detail)
    }

    /// Single level reconstruction from (approximation, detail).
    pub fn idwt(&self, approx: &[f64], detail: &[f64]) -> Result<Vec<f64>> {
        if approx.len() != detail.len() {
            return Err(EcgError::InvalidParameter(format!(
                "coefficient length mismatch: approximation {} vs detail {}",
                approx.len(),
                detail.len()
            )));
        }

        let bank = self.filter_bank();
        let taps = bank.rec_lo.len();
        let m = approx.len();
        if 2 * m + 2 <= taps {
            return Err(EcgError::InsufficientData(format!(
                "{} coefficients cannot be reconstructed with a {}-tap filter",
                m, taps
            )));
        }

        // Keep the part of the full upsampled convolution aligned with the input
        let mut out = Vec::with_capacity(2 * m + 2 - taps);
        for t in (taps - 2)..(2 * m) {
            let mut acc = 0.0;
            for j in 0..taps {
                if j > t || (t - j) % 2 != 0 {
                    continue;
                }
                let i = (t - j) / 2;
                if i < m {
                    acc += bank.rec_lo[j] * approx[i] + bank.rec_hi[j] * detail[i];
                }
            }
            out.push(acc);
        }

        Ok(out)
    }

    /// Multilevel decomposition to `levels` detail bands.
    pub fn wavedec(&self, data: &[f64], levels: usize) -> Result<CoefficientBands> {
        if levels == 0 {
            return Err(EcgError::InvalidParameter(
                "decomposition depth must be at least 1".to_string(),
            ));
        }
        let max_level = self.max_level(data.len());
        if levels > max_level {
            return Err(EcgError::InsufficientData(format!(
                "{} samples support at most {} {:?} levels, {} requested",
                data.len(),
                max_level,
                self,
                levels
            )));
        }

        let mut details = Vec::with_capacity(levels);
        let mut approx = data.to_vec();
        for _ in 0..levels {
            let (a, d) = self.dwt(&approx);
            details.push(d);
            approx = a;
        }

        // Storage order: approximation, then details coarse to fine
        let mut bands = Vec::with_capacity(levels + 1);
        bands.push(approx);
        bands.extend(details.into_iter().rev());

        Ok(CoefficientBands {
            wavelet: *self,
            signal_len: data.len(),
            bands,
        })
    }
}

/// Half-sample symmetric extension: `x[-1] = x[0]`, `x[n] = x[n - 1]`.
fn symmetric_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let k = i.rem_euclid(period);
    if k >= n {
        (period - 1 - k) as usize
    } else {
        k as usize
    }
}

/// Decomposition level of a detail band, 1 being the finest.
///
/// This is the only place that translates between the storage order of
/// [`CoefficientBands`] (approximation first, then details coarse to fine)
/// and profile order used by the energy and threshold statistics (finest
/// detail first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DetailLevel(usize);

impl DetailLevel {
    pub fn new(level: usize) -> Option<Self> {
        (level >= 1).then_some(DetailLevel(level))
    }

    pub fn from_profile_index(index: usize) -> Self {
        DetailLevel(index + 1)
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn profile_index(self) -> usize {
        self.0 - 1
    }

    pub fn storage_index(self, levels: usize) -> usize {
        levels + 1 - self.0
    }
}

/// Output of [`Wavelet::wavedec`].
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientBands {
    wavelet: Wavelet,
    signal_len: usize,
    bands: Vec<Vec<f64>>,
}

impl CoefficientBands {
    pub fn wavelet(&self) -> Wavelet {
        self.wavelet
    }

    /// Length of the signal that was decomposed.
    pub fn signal_len(&self) -> usize {
        self.signal_len
    }

    /// Number of detail bands.
    pub fn levels(&self) -> usize {
        self.bands.len() - 1
    }

    pub fn approximation(&self) -> &[f64] {
        &self.bands[0]
    }

    pub fn detail(&self, level: DetailLevel) -> &[f64] {
        &self.bands[level.storage_index(self.levels())]
    }

    /// All bands in storage order.
    pub fn bands(&self) -> &[Vec<f64>] {
        &self.bands
    }

    /// Detail levels from finest to coarsest.
    pub fn detail_levels(&self) -> impl Iterator<Item = DetailLevel> {
        (1..=self.levels()).map(DetailLevel)
    }

    /// Returns a copy with every detail band passed through `f`.
    pub fn map_details<F>(&self, mut f: F) -> CoefficientBands
    where
        F: FnMut(DetailLevel, &[f64]) -> Vec<f64>,
    {
        let levels = self.levels();
        let bands = self
            .bands
            .iter()
            .enumerate()
            .map(|(storage, band)| {
                if storage == 0 {
                    band.clone()
                } else {
                    f(DetailLevel(levels + 1 - storage), band)
                }
            })
            .collect();

        CoefficientBands {
            wavelet: self.wavelet,
            signal_len: self.signal_len,
            bands,
        }
    }

    /// Inverse multilevel transform. The result may be one sample longer
    /// than [`signal_len`](Self::signal_len).
    pub fn reconstruct(&self) -> Result<Vec<f64>> {
        let mut approx = self.bands[0].clone();
        for detail in &self.bands[1..] {
            if approx.len() == detail.len() + 1 {
                approx.pop();
            }
            approx = self.wavelet.idwt(&approx, detail)?;
        }
        Ok(approx)
    }
}
