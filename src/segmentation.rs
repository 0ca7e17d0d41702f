use crate::config::SegmentConfig;
use crate::Signal;
use log::{debug, warn};

/// A window of the clean signal spanning a fixed number of beats.
///
/// `left` and `right` are inclusive sample indices into the source signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub left: usize,
    pub right: usize,
    pub samples: Vec<f64>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Inclusive bounds of every window of peaks, clipped to `[0, signal_len - 1]`.
///
/// Windows whose first peak lies after their last one are skipped, so every
/// bound satisfies `left <= right`.
pub fn segment_bounds(
    signal_len: usize,
    peaks: &[usize],
    config: &SegmentConfig,
) -> Vec<(usize, usize)> {
    if signal_len == 0 || config.beats == 0 || peaks.len() < config.beats {
        return Vec::new();
    }
    let last = signal_len - 1;

    let windows: Vec<&[usize]> = if config.slide {
        peaks.windows(config.beats).collect()
    } else {
        peaks.chunks_exact(config.beats).collect()
    };

    let bounds: Vec<(usize, usize)> = windows
        .iter()
        .filter(|w| w[0] <= w[w.len() - 1])
        .map(|w| {
            let (first, final_peak) = (w[0], w[w.len() - 1]);
            if config.slide {
                (
                    first.saturating_sub(config.margin).min(last),
                    final_peak.saturating_add(config.margin).min(last),
                )
            } else {
                (first.min(last), final_peak.min(last))
            }
        })
        .collect();

    if bounds.len() < windows.len() {
        warn!(
            "skipped {} windows with out-of-order peaks",
            windows.len() - bounds.len()
        );
    }
    bounds
}

/// Cuts the signal into beat windows anchored on `peaks`.
pub fn segment(signal: &Signal, peaks: &[usize], config: &SegmentConfig) -> Vec<Segment> {
    let samples = signal.samples();
    let segments: Vec<Segment> = segment_bounds(samples.len(), peaks, config)
        .into_iter()
        .map(|(left, right)| Segment {
            left,
            right,
            samples: samples[left..=right].to_vec(),
        })
        .collect();

    debug!(
        "{} segments from {} peaks ({} beats, {})",
        segments.len(),
        peaks.len(),
        config.beats,
        if config.slide { "sliding" } else { "non-overlapping" }
    );
    segments
}

/// Length every segment can be trimmed to: the shortest one.
pub fn common_length<'a, I>(segments: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a Segment>,
{
    segments.into_iter().map(Segment::len).min()
}

/// Keeps the centred `size` samples of a segment.
pub fn normalise(segment: &Segment, size: usize) -> &[f64] {
    let size = size.min(segment.len());
    let start = (segment.len() - size) / 2;
    &segment.samples[start..start + size]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Signal {
        Signal::new((0..n).map(|i| i as f64).collect(), 360.0).unwrap()
    }

    #[test]
    fn test_sliding_bounds() {
        let signal = ramp(1000);
        let segments = segment(&signal, &[100, 300, 500, 700], &SegmentConfig::default());

        let bounds: Vec<(usize, usize)> = segments.iter().map(|s| (s.left, s.right)).collect();
        assert_eq!(bounds, vec![(0, 428), (172, 628), (372, 828)]);
        assert_eq!(segments[0].len(), 429);
        assert_eq!(segments[1].samples[0], 172.0);
        assert_eq!(segments[2].samples[segments[2].len() - 1], 828.0);
    }

    #[test]
    fn test_sliding_clips_right_edge() {
        let bounds = segment_bounds(1000, &[700, 950], &SegmentConfig::default());
        assert_eq!(bounds, vec![(572, 999)]);
    }

    #[test]
    fn test_non_overlapping_drops_partial_window() {
        let config = SegmentConfig {
            slide: false,
            ..SegmentConfig::default()
        };
        let bounds = segment_bounds(1000, &[100, 300, 500, 700, 900], &config);
        assert_eq!(bounds, vec![(100, 300), (500, 700)]);
    }

    #[test]
    fn test_too_few_peaks_is_empty() {
        let signal = ramp(1000);
        let config = SegmentConfig {
            beats: 3,
            ..SegmentConfig::default()
        };
        assert!(segment(&signal, &[100, 300], &config).is_empty());
        assert!(segment(&signal, &[], &SegmentConfig::default()).is_empty());
    }

    #[test]
    fn test_bounds_stay_inside_signal() {
        let peaks: Vec<usize> = (10..2000).step_by(97).collect();
        for slide in [true, false] {
            let config = SegmentConfig {
                beats: 3,
                margin: 300,
                slide,
            };
            for (left, right) in segment_bounds(2000, &peaks, &config) {
                assert!(left <= right && right < 2000);
            }
        }
    }

    #[test]
    fn test_out_of_order_peaks_are_skipped() {
        let signal = Signal::new(vec![0.0; 1000], 360.0).unwrap();
        assert!(segment(&signal, &[500, 100], &SegmentConfig::default()).is_empty());

        let bounds = segment_bounds(1000, &[100, 300, 200, 400], &SegmentConfig::default());
        assert_eq!(bounds, vec![(0, 428), (72, 528)]);

        let config = SegmentConfig {
            slide: false,
            ..SegmentConfig::default()
        };
        let bounds = segment_bounds(1000, &[300, 100, 500, 700], &config);
        assert_eq!(bounds, vec![(500, 700)]);
    }

    #[test]
    fn test_normalise_trims_centre() {
        let segment = Segment {
            left: 0,
            right: 6,
            samples: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        };
        assert_eq!(normalise(&segment, 4), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(normalise(&segment, 7), segment.samples.as_slice());
        assert_eq!(normalise(&segment, 10).len(), 7);
    }

    #[test]
    fn test_common_length_is_shortest() {
        let segments = segment(&ramp(1000), &[100, 300, 500, 700], &SegmentConfig::default());
        assert_eq!(common_length(&segments), Some(429));
        assert_eq!(common_length(&Vec::<Segment>::new()), None);
    }
}
