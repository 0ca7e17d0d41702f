use crate::config::DetectorConfig;
use crate::error::{EcgError, Result};
use crate::filters::bandpass_causal;
use crate::Signal;
use log::{debug, trace};

const INTEGRATION_SECONDS: f64 = 0.12;
const STARTUP_SECONDS: f64 = 0.2;
const REFRACTORY_SECONDS: f64 = 0.3;
const MIN_DISTANCE_SECONDS: f64 = 0.25;
const LOCALIZE_SLACK_SECONDS: f64 = 0.05;

const SIGNAL_WEIGHT: f64 = 0.125;
const RR_HISTORY: usize = 8;
const RR_MISSED_FACTOR: f64 = 1.66;

/// Trailing moving average over `window` samples.
///
/// The first `window - 1` outputs average only the samples seen so far.
pub fn moving_window_integration(data: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut result = Vec::with_capacity(data.len());
    let mut running = 0.0;

    for (i, &x) in data.iter().enumerate() {
        running += x;
        if i >= window {
            running -= data[i - window];
        }
        let count = (i + 1).min(window);
        result.push(running / count as f64);
    }

    result
}

/// Band-pass, difference, square and integrate, with the startup transient zeroed.
///
/// Returns the detection signal (one sample shorter than the input) and the
/// integration window that produced it.
pub fn integrated_energy(signal: &Signal, config: &DetectorConfig) -> Result<(Vec<f64>, usize)> {
    if signal.len() < 2 {
        return Err(EcgError::InsufficientData(format!(
            "peak detection needs at least 2 samples, got {}",
            signal.len()
        )));
    }

    let filtered = bandpass_causal(
        signal.samples(),
        signal.sample_rate(),
        config.low_hz,
        config.high_hz,
        config.filter_order,
    )?;

    let squared: Vec<f64> = filtered
        .windows(2)
        .map(|pair| {
            let d = pair[1] - pair[0];
            d * d
        })
        .collect();

    let window = signal.samples_for(INTEGRATION_SECONDS).max(1);
    let mut detection = moving_window_integration(&squared, window);

    let startup = signal.samples_for(STARTUP_SECONDS).min(detection.len());
    detection[..startup].iter_mut().for_each(|x| *x = 0.0);

    Ok((detection, window))
}

/// Indices of strict interior local maxima.
pub fn local_maxima(data: &[f64]) -> Vec<usize> {
    data.windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2])
        .map(|(i, _)| i + 1)
        .collect()
}

/// Timing constraints of the tracker, in samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackRules {
    /// A signal peak must lie strictly more than this past the previous one.
    pub refractory: f64,
    /// Recovered beats keep strictly more than this from both neighbours.
    pub min_distance: usize,
}

impl TrackRules {
    pub fn for_rate(sample_rate: f64) -> Self {
        Self {
            refractory: REFRACTORY_SECONDS * sample_rate,
            min_distance: (MIN_DISTANCE_SECONDS * sample_rate) as usize,
        }
    }
}

/// Outcome of one candidate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakClass {
    Noise,
    Signal { recovered: Option<usize> },
}

/// Adaptive signal/noise levels of the dual-threshold tracker.
///
/// Each candidate consumes the current state and yields the next one; a run
/// starts from `PeakTrack::default()` with both levels and thresholds at zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakTrack {
    spki: f64,
    npki: f64,
    threshold_i1: f64,
    threshold_i2: f64,
    signal_peaks: Vec<usize>,
    rr_missed: Option<usize>,
}

impl PeakTrack {
    pub fn spki(&self) -> f64 {
        self.spki
    }

    pub fn npki(&self) -> f64 {
        self.npki
    }

    pub fn threshold_i1(&self) -> f64 {
        self.threshold_i1
    }

    pub fn threshold_i2(&self) -> f64 {
        self.threshold_i2
    }

    pub fn rr_missed(&self) -> Option<usize> {
        self.rr_missed
    }

    pub fn signal_peaks(&self) -> &[usize] {
        &self.signal_peaks
    }

    pub fn into_peaks(self) -> Vec<usize> {
        self.signal_peaks
    }

    /// Classifies the local maximum at `peak`.
    ///
    /// `candidates` holds every local maximum of `detection` in increasing
    /// order; it is searched for a skipped beat when the gap since the last
    /// confirmed peak is longer than the expected missed interval.
    pub fn observe(
        mut self,
        peak: usize,
        detection: &[f64],
        candidates: &[usize],
        rules: &TrackRules,
    ) -> (Self, PeakClass) {
        let amplitude = detection[peak];
        let last = self.signal_peaks.last().copied().unwrap_or(0);
        let gap = peak.saturating_sub(last);

        let class = if amplitude > self.threshold_i1 && gap as f64 > rules.refractory {
            self.signal_peaks.push(peak);
            self.spki = SIGNAL_WEIGHT * amplitude + (1.0 - SIGNAL_WEIGHT) * self.spki;

            let recovered = match self.rr_missed {
                Some(rr_missed) if gap > rr_missed => {
                    self.search_missed(last, peak, detection, candidates, rules)
                }
                _ => None,
            };
            if let Some(missed) = recovered {
                let at = self.signal_peaks.len() - 1;
                self.signal_peaks.insert(at, missed);
            }
            PeakClass::Signal { recovered }
        } else {
            self.npki = SIGNAL_WEIGHT * amplitude + (1.0 - SIGNAL_WEIGHT) * self.npki;
            PeakClass::Noise
        };

        self.threshold_i1 = self.npki + 0.25 * (self.spki - self.npki);
        self.threshold_i2 = 0.5 * self.threshold_i1;

        if let Some(mean) = self.recent_rr_mean() {
            self.rr_missed = Some((RR_MISSED_FACTOR * mean as f64) as usize);
        }

        trace!(
            "peak {} amp {:.4}: {:?} (SPKI {:.4}, NPKI {:.4}, T1 {:.4}, T2 {:.4})",
            peak,
            amplitude,
            class,
            self.spki,
            self.npki,
            self.threshold_i1,
            self.threshold_i2
        );

        (self, class)
    }

    /// Truncated mean of the last eight confirmed intervals, once nine peaks exist.
    fn recent_rr_mean(&self) -> Option<usize> {
        let n = self.signal_peaks.len();
        if n < RR_HISTORY + 1 {
            return None;
        }
        let total: usize = self.signal_peaks[n - RR_HISTORY - 1..]
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .sum();
        Some(total / RR_HISTORY)
    }

    /// Highest candidate strictly between `previous` and `current` clearing T2.
    fn search_missed(
        &self,
        previous: usize,
        current: usize,
        detection: &[f64],
        candidates: &[usize],
        rules: &TrackRules,
    ) -> Option<usize> {
        let start = candidates.partition_point(|&c| c <= previous);
        let end = candidates.partition_point(|&c| c < current);

        let mut best: Option<usize> = None;
        for &c in &candidates[start..end] {
            if c - previous > rules.min_distance
                && current - c > rules.min_distance
                && detection[c] > self.threshold_i2
                && best.map_or(true, |b| detection[c] > detection[b])
            {
                best = Some(c);
            }
        }

        if let Some(missed) = best {
            debug!(
                "recovered missed beat at {} between {} and {}",
                missed, previous, current
            );
        }
        best
    }
}

/// Runs the dual-threshold tracker over a detection signal.
pub fn track_peaks(detection: &[f64], sample_rate: f64) -> Vec<usize> {
    let candidates = local_maxima(detection);
    if candidates.len() < 2 {
        debug!("only {} local maxima, no peaks", candidates.len());
        return Vec::new();
    }

    let rules = TrackRules::for_rate(sample_rate);
    let track = candidates
        .iter()
        .fold(PeakTrack::default(), |track, &peak| {
            track.observe(peak, detection, &candidates, &rules).0
        });

    debug!(
        "{} confirmed peaks from {} candidates",
        track.signal_peaks().len(),
        candidates.len()
    );
    track.into_peaks()
}

/// Moves each detection onto the largest deflection of `data` just before it.
///
/// The integrator lags the QRS complex by up to one window, so each peak
/// searches `[p - lookback, p + 1]`.
pub fn localize_peaks(data: &[f64], peaks: &[usize], lookback: usize) -> Vec<usize> {
    if data.is_empty() {
        return Vec::new();
    }

    let mut located: Vec<usize> = peaks
        .iter()
        .map(|&p| {
            let lo = p.saturating_sub(lookback).min(data.len() - 1);
            let hi = (p + 1).min(data.len() - 1);
            let mut best = lo;
            for i in lo..=hi {
                if data[i].abs() > data[best].abs() {
                    best = i;
                }
            }
            best
        })
        .collect();

    located.sort_unstable();
    located.dedup();
    located
}

/// Detects R-peaks in a cleaned signal.
pub fn detect_peaks(signal: &Signal, config: &DetectorConfig) -> Result<Vec<usize>> {
    let (detection, window) = integrated_energy(signal, config)?;
    let peaks = track_peaks(&detection, signal.sample_rate());

    if !config.localize {
        return Ok(peaks);
    }

    let lookback = window + signal.samples_for(LOCALIZE_SLACK_SECONDS);
    let located = localize_peaks(signal.samples(), &peaks, lookback);
    debug!("localized {} peaks to {} R-peaks", peaks.len(), located.len());
    Ok(located)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn hump(data: &mut [f64], centre: usize, amplitude: f64) {
        for (offset, scale) in [1.0 / 3.0, 2.0 / 3.0, 1.0, 2.0 / 3.0, 1.0 / 3.0]
            .iter()
            .enumerate()
        {
            data[centre + offset - 2] = amplitude * scale;
        }
    }

    #[test]
    fn test_moving_window_warm_up() {
        let integrated = moving_window_integration(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
        let expected = [1.0, 1.5, 2.5, 3.5, 4.5];
        for (got, want) in integrated.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_local_maxima_are_strict() {
        let data = [0.0, 2.0, 1.0, 1.0, 3.0, 3.0, 0.0, 4.0, 0.0];
        assert_eq!(local_maxima(&data), vec![1, 7]);
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_first_candidate_must_be_positive() {
        let mut detection = vec![-1.0; 600];
        detection[200] = 0.0;
        detection[400] = 1.0;
        assert_eq!(track_peaks(&detection, 360.0), vec![400]);
    }

    #[test]
    fn test_fewer_than_two_candidates_is_empty() {
        let mut detection = vec![0.0; 100];
        detection[50] = 5.0;
        assert!(track_peaks(&detection, 360.0).is_empty());
        assert!(track_peaks(&[], 360.0).is_empty());
    }

    #[test]
    fn test_refractory_rejects_close_peak() {
        let mut detection = vec![0.0; 400];
        hump(&mut detection, 100, 10.0);
        // 20 samples later, inside 0.3 * 100 Hz
        hump(&mut detection, 120, 12.0);
        hump(&mut detection, 250, 10.0);
        assert_eq!(track_peaks(&detection, 100.0), vec![100, 250]);
    }

    #[test]
    fn test_thresholds_follow_levels() {
        let mut detection = vec![0.0; 300];
        hump(&mut detection, 100, 8.0);
        hump(&mut detection, 200, 1.0);
        let candidates = local_maxima(&detection);
        let rules = TrackRules::for_rate(100.0);

        let (track, class) = PeakTrack::default().observe(100, &detection, &candidates, &rules);
        assert_eq!(class, PeakClass::Signal { recovered: None });
        assert_abs_diff_eq!(track.spki(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(track.threshold_i1(), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(track.threshold_i2(), 0.125, epsilon = 1e-12);

        let (track, class) = track.observe(200, &detection, &candidates, &rules);
        assert_eq!(class, PeakClass::Signal { recovered: None });
        assert_abs_diff_eq!(track.spki(), 1.0, epsilon = 1e-12);
        assert_eq!(track.npki(), 0.0);
        assert_eq!(track.signal_peaks(), &[100, 200]);
        assert_eq!(track.rr_missed(), None);
    }

    #[test]
    fn test_recovers_missed_beat() {
        let mut detection = vec![0.0; 1300];
        for centre in (50..1000).step_by(100) {
            hump(&mut detection, centre, 10.0);
        }
        // below T1 when first seen, above T2 during the back-search
        hump(&mut detection, 1050, 1.5);
        hump(&mut detection, 1150, 10.0);

        let mut expected: Vec<usize> = (50..1000).step_by(100).collect();
        expected.extend([1050, 1150]);
        assert_eq!(track_peaks(&detection, 100.0), expected);
    }

    #[test]
    fn test_missed_search_uses_threshold_before_update() {
        let mut detection = vec![0.0; 1300];
        for centre in (50..1000).step_by(100) {
            hump(&mut detection, centre, 10.0);
        }
        hump(&mut detection, 1050, 1.0);
        hump(&mut detection, 1150, 10.0);
        let candidates = local_maxima(&detection);
        let rules = TrackRules::for_rate(100.0);

        let mut track = PeakTrack::default();
        for &peak in candidates.iter().filter(|&&c| c < 1150) {
            track = track.observe(peak, &detection, &candidates, &rules).0;
        }
        // 1.0 lies between T2 before (~0.968) and after (~1.009) the next update
        let before = track.threshold_i2();
        assert!(before < 1.0, "T2 before update {}", before);

        let (track, class) = track.observe(1150, &detection, &candidates, &rules);
        assert!(
            track.threshold_i2() > 1.0,
            "T2 after update {}",
            track.threshold_i2()
        );
        assert_eq!(class, PeakClass::Signal { recovered: Some(1050) });
        assert_eq!(&track.signal_peaks()[9..], &[950, 1050, 1150]);
    }

    #[test]
    fn test_missed_search_ignores_weak_candidates() {
        let mut detection = vec![0.0; 1300];
        for centre in (50..1000).step_by(100) {
            hump(&mut detection, centre, 10.0);
        }
        hump(&mut detection, 1050, 0.5);
        hump(&mut detection, 1150, 10.0);

        let mut expected: Vec<usize> = (50..1000).step_by(100).collect();
        expected.push(1150);
        assert_eq!(track_peaks(&detection, 100.0), expected);
    }

    #[test]
    fn test_rr_missed_after_nine_peaks() {
        let mut detection = vec![0.0; 1000];
        for centre in (50..950).step_by(100) {
            hump(&mut detection, centre, 10.0);
        }
        let candidates = local_maxima(&detection);
        let rules = TrackRules::for_rate(100.0);

        let mut track = PeakTrack::default();
        for (seen, &peak) in candidates.iter().enumerate() {
            track = track.observe(peak, &detection, &candidates, &rules).0;
            if seen < 8 {
                assert_eq!(track.rr_missed(), None);
            }
        }
        assert_eq!(track.signal_peaks().len(), 9);
        assert_eq!(track.rr_missed(), Some(166));
        assert!(track.spki() >= 0.0 && track.npki() >= 0.0);
    }

    #[test]
    fn test_localize_moves_to_largest_deflection() {
        let mut data = vec![0.0; 200];
        data[90] = -3.0;
        data[95] = 2.0;
        data[150] = 1.0;
        assert_eq!(localize_peaks(&data, &[120, 160], 40), vec![90, 150]);
        // both detections collapse onto the same sample
        assert_eq!(localize_peaks(&data, &[100, 110], 30), vec![90]);
    }

    #[test]
    fn test_impulse_train_peaks() {
        let fs = 360.0;
        let mut samples = vec![0.0; 1800];
        let impulses: Vec<usize> = (180..1800).step_by(180).collect();
        for &i in &impulses {
            samples[i] = 1.0;
        }
        let signal = Signal::new(samples, fs).unwrap();

        let peaks = detect_peaks(&signal, &DetectorConfig::default()).unwrap();
        assert_eq!(peaks.len(), impulses.len());
        for (peak, impulse) in peaks.iter().zip(impulses.iter()) {
            assert!(
                peak.abs_diff(*impulse) <= 2,
                "peak {} too far from impulse {}",
                peak,
                impulse
            );
        }
    }

    #[test]
    fn test_unlocalized_peaks_lag_impulses() {
        let fs = 360.0;
        let mut samples = vec![0.0; 1800];
        for i in (180..1800).step_by(180) {
            samples[i] = 1.0;
        }
        let signal = Signal::new(samples, fs).unwrap();
        let config = DetectorConfig {
            localize: false,
            ..DetectorConfig::default()
        };

        let peaks = detect_peaks(&signal, &config).unwrap();
        assert_eq!(peaks.len(), 9);
        assert!(peaks.windows(2).all(|w| w[0] < w[1]));
        assert!(peaks[0] >= 180);
    }

    #[test]
    fn test_startup_is_zeroed() {
        let signal = Signal::new(
            (0..720).map(|i| (i as f64 * 0.7).sin()).collect(),
            360.0,
        )
        .unwrap();
        let (detection, window) = integrated_energy(&signal, &DetectorConfig::default()).unwrap();
        assert_eq!(window, 43);
        assert_eq!(detection.len(), 719);
        assert!(detection[..72].iter().all(|&x| x == 0.0));
        assert!(detection[72..].iter().any(|&x| x > 0.0));
    }

    #[test]
    fn test_detector_errors() {
        let short = Signal::new(vec![1.0], 360.0).unwrap();
        assert!(matches!(
            detect_peaks(&short, &DetectorConfig::default()),
            Err(EcgError::InsufficientData(_))
        ));

        let slow = Signal::new(vec![0.0; 500], 25.0).unwrap();
        assert!(matches!(
            detect_peaks(&slow, &DetectorConfig::default()),
            Err(EcgError::InvalidParameter(_))
        ));
    }
}
