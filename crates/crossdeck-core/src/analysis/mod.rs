//! Offline analysis of decoded audio
//!
//! Everything here is deterministic given a decoded buffer: tempo estimation
//! from an energy envelope, and waveform peak extraction for display. No
//! analysis runs on the audio thread; the loader performs it once per load.

mod bpm;
mod waveform;

pub use bpm::{estimate_bpm, BPM_RANGE};
pub use waveform::{compute_peaks, WaveformPeaks, WAVEFORM_BUCKETS};
