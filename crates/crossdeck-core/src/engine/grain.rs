//! Scratch grain synthesis
//!
//! A grain is a ~40 ms slice of the deck's buffer played as an independent,
//! self-terminating voice, used to emulate the sound of dragging vinyl.
//! Grains bypass the deck's signal chain and mix straight into the master
//! output at a fixed gain; they carry no state beyond their own read cursor
//! and may overlap freely.
//!
//! Backward grains read the deck's cached reversed buffer forward from a
//! mirrored offset: reading the reverse buffer forward from position `x` is
//! the same as reading the forward buffer backward from `duration - x`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio_file::AudioSource;
use crate::types::{StereoBuffer, StereoSample};

/// Grain length in seconds of source content
pub const GRAIN_SECONDS: f64 = 0.04;

/// Fixed grain voice gain
pub const GRAIN_GAIN: f32 = 0.6;

/// Cap on the velocity-derived rate boost (max rate = 1.0 + this)
const MAX_RATE_BOOST: f64 = 2.5;

/// Rate boost per pixel of drag velocity
const RATE_PER_PIXEL: f64 = 0.02;

/// Interpolation method for fractional-position reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Linear interpolation (2-point) - fast, acceptable quality
    Linear,
    /// Cubic Catmull-Rom interpolation (4-point) - better quality
    #[default]
    Cubic,
}

/// Map a signed drag velocity to a grain playback rate
///
/// Faster drags pitch the grain up, capped at 3.5x.
pub fn grain_rate(direction: f64) -> f64 {
    1.0 + (direction.abs() * RATE_PER_PIXEL).min(MAX_RATE_BOOST)
}

/// Linear interpolation between two samples
#[inline]
fn lerp_sample(s0: StereoSample, s1: StereoSample, t: f32) -> StereoSample {
    StereoSample {
        left: s0.left + (s1.left - s0.left) * t,
        right: s0.right + (s1.right - s0.right) * t,
    }
}

/// Cubic Catmull-Rom interpolation (4-point)
#[inline]
fn cubic_interpolate(
    s0: StereoSample,
    s1: StereoSample,
    s2: StereoSample,
    s3: StereoSample,
    t: f32,
) -> StereoSample {
    let t2 = t * t;
    let t3 = t2 * t;

    let c0 = -0.5 * t3 + t2 - 0.5 * t;
    let c1 = 1.5 * t3 - 2.5 * t2 + 1.0;
    let c2 = -1.5 * t3 + 2.0 * t2 + 0.5 * t;
    let c3 = 0.5 * t3 - 0.5 * t2;

    StereoSample {
        left: s0.left * c0 + s1.left * c1 + s2.left * c2 + s3.left * c3,
        right: s0.right * c0 + s1.right * c1 + s2.right * c2 + s3.right * c3,
    }
}

/// Get a sample with bounds checking (silence outside the buffer)
#[inline]
fn get_sample(data: &[StereoSample], index: i64) -> StereoSample {
    if index < 0 || index >= data.len() as i64 {
        StereoSample::silence()
    } else {
        data[index as usize]
    }
}

/// Read audio at a fractional position
pub fn read_interpolated(
    data: &[StereoSample],
    position: f64,
    method: InterpolationMethod,
) -> StereoSample {
    if data.is_empty() {
        return StereoSample::silence();
    }

    let index = position.floor() as i64;
    let frac = (position - position.floor()) as f32;

    match method {
        InterpolationMethod::Linear => {
            let s0 = get_sample(data, index);
            let s1 = get_sample(data, index + 1);
            lerp_sample(s0, s1, frac)
        }
        InterpolationMethod::Cubic => {
            let s0 = get_sample(data, index - 1);
            let s1 = get_sample(data, index);
            let s2 = get_sample(data, index + 1);
            let s3 = get_sample(data, index + 2);
            cubic_interpolate(s0, s1, s2, s3, frac)
        }
    }
}

/// One in-flight grain
struct GrainVoice {
    source: Arc<AudioSource>,
    /// Read from the reversed mirror instead of the forward buffer
    reversed: bool,
    /// Read cursor in samples (fractional)
    pos: f64,
    /// Cursor position at which the voice ends
    end: f64,
    /// Source samples consumed per output sample
    rate: f64,
}

/// Pool of grain voices for one deck
pub struct GrainSynthesizer {
    voices: Vec<GrainVoice>,
    interpolation: InterpolationMethod,
}

impl GrainSynthesizer {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            voices: Vec::new(),
            interpolation: InterpolationMethod::default(),
        }
    }

    /// Set the interpolation method for grain reads
    pub fn set_interpolation(&mut self, method: InterpolationMethod) {
        self.interpolation = method;
    }

    /// Number of voices currently sounding
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Start a grain at `position_seconds` with the given signed drag velocity
    ///
    /// `direction >= 0` plays forward from the clamped position; `< 0` plays
    /// the reversed mirror from the mirrored offset.
    pub fn trigger(&mut self, source: &Arc<AudioSource>, position_seconds: f64, direction: f64) {
        let dur = source.duration_seconds();
        if dur <= 0.0 {
            return;
        }

        let max_offset = (dur - GRAIN_SECONDS).max(0.0);
        let (reversed, offset) = if direction >= 0.0 {
            (false, position_seconds.clamp(0.0, max_offset))
        } else {
            (true, ((dur - position_seconds) - GRAIN_SECONDS).clamp(0.0, max_offset))
        };

        let sr = source.sample_rate() as f64;
        let start = offset * sr;
        let end = ((offset + GRAIN_SECONDS) * sr).min(source.duration_samples() as f64);

        self.voices.push(GrainVoice {
            source: Arc::clone(source),
            reversed,
            pos: start,
            end,
            rate: grain_rate(direction),
        });
    }

    /// Mix all active voices into `output`, retiring finished ones
    pub fn render(&mut self, output: &mut StereoBuffer) {
        if self.voices.is_empty() {
            return;
        }

        let method = self.interpolation;
        for frame in output.iter_mut() {
            for voice in &mut self.voices {
                if voice.pos >= voice.end {
                    continue;
                }
                let data = if voice.reversed {
                    voice.source.reversed()
                } else {
                    voice.source.samples()
                };
                *frame += read_interpolated(data.as_slice(), voice.pos, method) * GRAIN_GAIN;
                voice.pos += voice.rate;
            }
        }

        self.voices.retain(|v| v.pos < v.end);
    }

    /// Drop all active voices
    pub fn clear(&mut self) {
        self.voices.clear();
    }
}

impl Default for GrainSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}
