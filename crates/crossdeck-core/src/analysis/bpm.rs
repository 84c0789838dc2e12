//! Tempo estimation via envelope autocorrelation
//!
//! A single-pass heuristic: compute a coarse RMS energy envelope, rectify it
//! around its mean, autocorrelate over the lag range covering the search
//! window, and convert the best lag back to BPM. No refinement or retry —
//! the result is a guess, good enough to display next to a deck.

use crate::types::Sample;

/// Envelope window/hop size in samples
const ENVELOPE_HOP: usize = 1024;

/// Tempo search range in BPM (inclusive)
pub const BPM_RANGE: (f64, f64) = (70.0, 160.0);

/// Estimate the tempo of a mono buffer
///
/// Returns `None` when no lag in the search range shows positive
/// correlation (silence, or material with no periodic energy).
pub fn estimate_bpm(samples: &[Sample], sample_rate: u32) -> Option<f64> {
    if samples.is_empty() || sample_rate == 0 {
        return None;
    }

    // RMS energy per window
    let mut envelope: Vec<f64> = Vec::with_capacity(samples.len() / ENVELOPE_HOP + 1);
    for window in samples.chunks(ENVELOPE_HOP) {
        let sum: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
        envelope.push((sum / ENVELOPE_HOP as f64).sqrt());
    }

    // Rectify around the mean so sustained level doesn't dominate the
    // correlation, only energy bursts do
    let mean = envelope.iter().sum::<f64>() / envelope.len().max(1) as f64;
    for v in &mut envelope {
        *v = (*v - mean).max(0.0);
    }

    let (min_bpm, max_bpm) = BPM_RANGE;
    let hops_per_second = sample_rate as f64 / ENVELOPE_HOP as f64;
    let min_lag = ((60.0 / max_bpm) * hops_per_second).floor() as usize;
    let max_lag = ((60.0 / min_bpm) * hops_per_second).floor() as usize;
    if min_lag == 0 || max_lag >= envelope.len() {
        return None;
    }

    let mut best_lag = 0usize;
    let mut best = 0.0f64;
    for lag in min_lag..=max_lag {
        let mut c = 0.0;
        for i in 0..envelope.len() - lag {
            c += envelope[i] * envelope[i + lag];
        }
        if c > best {
            best = c;
            best_lag = lag;
        }
    }

    if best_lag == 0 || best <= 0.0 {
        return None;
    }

    let bpm = 60.0 / (best_lag as f64 / hops_per_second);
    Some((bpm * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthesize a click track: short unit bursts at a fixed tempo
    fn click_track(bpm: f64, sample_rate: u32, seconds: f64) -> Vec<Sample> {
        let len = (sample_rate as f64 * seconds) as usize;
        let period = (60.0 / bpm * sample_rate as f64) as usize;
        let mut samples = vec![0.0; len];
        let mut pos = 0;
        while pos < len {
            for i in pos..(pos + 64).min(len) {
                samples[i] = 1.0;
            }
            pos += period;
        }
        samples
    }

    #[test]
    fn test_click_track_near_120() {
        // 96 kHz gives the envelope enough lag resolution for a +-2 check
        let samples = click_track(120.0, 96_000, 10.0);
        let bpm = estimate_bpm(&samples, 96_000).expect("click track should estimate");
        assert!(bpm >= BPM_RANGE.0 && bpm <= BPM_RANGE.1, "out of range: {}", bpm);
        assert!((bpm - 120.0).abs() <= 2.0, "expected ~120, got {}", bpm);
    }

    #[test]
    fn test_estimate_in_search_range() {
        let samples = click_track(100.0, 48_000, 10.0);
        let bpm = estimate_bpm(&samples, 48_000).expect("click track should estimate");
        assert!(bpm >= BPM_RANGE.0 && bpm <= BPM_RANGE.1);
    }

    #[test]
    fn test_rounded_to_one_decimal() {
        let samples = click_track(128.0, 48_000, 10.0);
        let bpm = estimate_bpm(&samples, 48_000).unwrap();
        assert_eq!(bpm, (bpm * 10.0).round() / 10.0);
    }

    #[test]
    fn test_silence_returns_none() {
        let samples = vec![0.0; 48_000 * 4];
        assert_eq!(estimate_bpm(&samples, 48_000), None);
    }

    #[test]
    fn test_too_short_returns_none() {
        // Shorter than one full lag window at the slow end of the range
        let samples = vec![0.5; 2048];
        assert_eq!(estimate_bpm(&samples, 48_000), None);
    }

    #[test]
    fn test_empty_returns_none() {
        assert_eq!(estimate_bpm(&[], 48_000), None);
        assert_eq!(estimate_bpm(&[0.5; 4096], 0), None);
    }
}
