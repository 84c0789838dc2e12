//! Waveform peak extraction for display
//!
//! The renderer draws one vertical min/max line per horizontal pixel; this
//! module precomputes those pairs once per load so the per-frame redraw
//! never touches the full decoded buffer.

use crate::types::Sample;

/// Default number of peak buckets (enough for a full-width waveform strip)
pub const WAVEFORM_BUCKETS: usize = 1200;

/// Per-bucket min/max peaks over a mono signal
#[derive(Debug, Clone, Default)]
pub struct WaveformPeaks {
    buckets: Vec<(Sample, Sample)>,
}

impl WaveformPeaks {
    /// Number of buckets
    #[inline]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Check if there are no buckets
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// (min, max) pair for a bucket
    pub fn get(&self, index: usize) -> Option<(Sample, Sample)> {
        self.buckets.get(index).copied()
    }

    /// Iterate over (min, max) pairs
    pub fn iter(&self) -> impl Iterator<Item = &(Sample, Sample)> {
        self.buckets.iter()
    }
}

/// Compute min/max peaks over `buckets` equal spans of a mono signal
pub fn compute_peaks(samples: &[Sample], buckets: usize) -> WaveformPeaks {
    if samples.is_empty() || buckets == 0 {
        return WaveformPeaks::default();
    }

    let step = samples.len().div_ceil(buckets);
    let pairs = samples
        .chunks(step)
        .map(|chunk| {
            let mut min = Sample::MAX;
            let mut max = Sample::MIN;
            for &v in chunk {
                if v < min {
                    min = v;
                }
                if v > max {
                    max = v;
                }
            }
            (min, max)
        })
        .collect();

    WaveformPeaks { buckets: pairs }
}
