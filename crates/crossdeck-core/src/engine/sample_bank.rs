//! Sample bank - 8 independently toggled looping voices
//!
//! Each slot holds one decoded source and at most one active voice. A
//! trigger on an idle slot starts a looping voice at fixed gain; a trigger
//! on a sounding slot stops it. A slot is always exactly "playing" or "not
//! playing", never queued.

use std::sync::Arc;

use crate::audio_file::AudioSource;
use crate::types::StereoBuffer;

/// Number of sample slots
pub const SAMPLE_SLOTS: usize = 8;

/// Fixed gain for sample voices
const SAMPLE_GAIN: f32 = 0.9;

/// One playing sample voice
struct SampleVoice {
    /// Read cursor in samples
    pos: usize,
    /// Wrap at the end instead of stopping
    looping: bool,
}

/// A single sample slot
struct SampleSlot {
    source: Option<Arc<AudioSource>>,
    voice: Option<SampleVoice>,
    label: Option<String>,
}

impl SampleSlot {
    fn empty() -> Self {
        Self {
            source: None,
            voice: None,
            label: None,
        }
    }
}

/// The 8-slot sample bank
pub struct SampleBank {
    slots: [SampleSlot; SAMPLE_SLOTS],
}

impl SampleBank {
    /// Create an empty bank
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| SampleSlot::empty()),
        }
    }

    /// Load a decoded source into a slot, discarding any previous buffer
    ///
    /// An active voice on the slot is stopped: the new buffer replaces the
    /// old one wholesale.
    pub fn load(&mut self, slot: usize, source: Arc<AudioSource>, label: Option<String>) {
        let Some(s) = self.slots.get_mut(slot) else {
            return;
        };
        log::info!(
            "sample slot {}: loaded {} ({:.2}s)",
            slot,
            label.as_deref().unwrap_or("<bytes>"),
            source.duration_seconds()
        );
        s.source = Some(source);
        s.voice = None;
        s.label = label;
    }

    /// Toggle a slot's voice
    ///
    /// Starts a looping voice if the slot is idle, stops the voice if it is
    /// sounding. A slot without a source is a silent no-op. Returns whether
    /// the slot is active after the call.
    pub fn trigger(&mut self, slot: usize) -> bool {
        let Some(s) = self.slots.get_mut(slot) else {
            return false;
        };
        if s.source.is_none() {
            return false;
        }

        if s.voice.is_some() {
            s.voice = None;
            false
        } else {
            s.voice = Some(SampleVoice {
                pos: 0,
                looping: true,
            });
            true
        }
    }

    /// Check if a slot's voice is sounding
    pub fn is_active(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.voice.is_some())
    }

    /// Check if a slot has a decoded source
    pub fn has_source(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.source.is_some())
    }

    /// A slot's display label
    pub fn label(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).and_then(|s| s.label.as_deref())
    }

    /// Mix all active voices into `output`
    ///
    /// Looping voices wrap at the buffer end; a non-looping voice that
    /// reaches its natural end clears its own active marker.
    pub fn render(&mut self, output: &mut StereoBuffer) {
        for s in &mut self.slots {
            let Some(source) = &s.source else { continue };
            let Some(voice) = &mut s.voice else { continue };

            let data = source.samples().as_slice();
            let len = data.len();
            if len == 0 {
                s.voice = None;
                continue;
            }

            let mut finished = false;
            for frame in output.iter_mut() {
                if voice.pos >= len {
                    if voice.looping {
                        voice.pos = 0;
                    } else {
                        finished = true;
                        break;
                    }
                }
                *frame += data[voice.pos] * SAMPLE_GAIN;
                voice.pos += 1;
            }

            if finished {
                s.voice = None;
            }
        }
    }
}

impl Default for SampleBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::AudioSource;
    use crate::types::SAMPLE_RATE;

    fn constant_source(len: usize, value: f32) -> Arc<AudioSource> {
        let data: Vec<f32> = std::iter::repeat(value).take(len * 2).collect();
        AudioSource::from_interleaved(&data, 2, SAMPLE_RATE).unwrap()
    }

    #[test]
    fn test_trigger_toggles() {
        let mut bank = SampleBank::new();
        bank.load(2, constant_source(64, 0.5), None);

        assert!(bank.trigger(2));
        assert!(bank.is_active(2));

        assert!(!bank.trigger(2));
        assert!(!bank.is_active(2));
    }

    #[test]
    fn test_empty_slot_trigger_is_noop() {
        let mut bank = SampleBank::new();
        assert!(!bank.trigger(2));
        assert!(!bank.is_active(2));

        // Out-of-range slots are ignored too
        assert!(!bank.trigger(99));
    }

    #[test]
    fn test_render_mixes_at_fixed_gain() {
        let mut bank = SampleBank::new();
        bank.load(0, constant_source(256, 1.0), None);
        bank.trigger(0);

        let mut out = StereoBuffer::silence(16);
        bank.render(&mut out);
        assert!((out[0].left - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_looping_voice_wraps() {
        let mut bank = SampleBank::new();
        bank.load(0, constant_source(8, 1.0), None);
        bank.trigger(0);

        // Render far past the buffer end; the voice must keep sounding
        let mut out = StereoBuffer::silence(64);
        bank.render(&mut out);
        assert!(bank.is_active(0));
        assert!((out[63].left - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_load_replaces_and_stops_voice() {
        let mut bank = SampleBank::new();
        bank.load(1, constant_source(64, 1.0), Some("one".into()));
        bank.trigger(1);
        assert!(bank.is_active(1));

        bank.load(1, constant_source(64, 0.25), Some("two".into()));
        assert!(!bank.is_active(1));
        assert_eq!(bank.label(1), Some("two"));
    }

    #[test]
    fn test_slots_are_independent() {
        let mut bank = SampleBank::new();
        bank.load(0, constant_source(64, 1.0), None);
        bank.load(7, constant_source(64, 1.0), None);

        bank.trigger(0);
        assert!(bank.is_active(0));
        assert!(!bank.is_active(7));

        bank.trigger(7);
        bank.trigger(0);
        assert!(!bank.is_active(0));
        assert!(bank.is_active(7));
    }
}
