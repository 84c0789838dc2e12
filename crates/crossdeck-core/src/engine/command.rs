//! Lock-free command queue for driving the session
//!
//! The UI thread pushes commands into a bounded SPSC ring buffer; the audio
//! thread drains it at each buffer boundary. Neither side ever blocks, so a
//! slow UI frame cannot cause an audio dropout and a busy audio callback
//! cannot stall the UI.
//!
//! Commands are the discrete user gestures of the console: load, transport,
//! hot spots, scratch drag deltas, mixer moves, sample pad hits. Large
//! payloads (decoded sources) are boxed or refcounted so every variant
//! stays pointer-sized-ish and cache friendly in the queue.

use std::sync::Arc;

use crate::audio_file::AudioSource;
use crate::loader::PreparedSource;
use crate::types::DeckId;

use super::grain::InterpolationMethod;

/// Commands sent from the UI thread to the audio thread
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Source management
    // ─────────────────────────────────────────────────────────────
    /// Load a prepared source onto a deck (boxed: the payload is large)
    LoadDeck {
        deck: DeckId,
        source: Box<PreparedSource>,
    },
    /// Unload a deck
    UnloadDeck { deck: DeckId },
    /// Load a decoded source into a sample slot
    LoadSample {
        slot: usize,
        source: Arc<AudioSource>,
        label: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────
    /// Toggle play/pause on a deck
    TogglePlay { deck: DeckId },
    /// Seek to an absolute position in seconds
    Seek { deck: DeckId, seconds: f64 },
    /// Seek to a fraction of the track (waveform click)
    SeekFraction { deck: DeckId, fraction: f64 },
    /// Set the playback rate
    SetRate { deck: DeckId, rate: f64 },

    // ─────────────────────────────────────────────────────────────
    // Hot spots
    // ─────────────────────────────────────────────────────────────
    /// Store the current position into a slot
    SetHotSpot { deck: DeckId, slot: usize },
    /// Seek to a slot's stored position
    JumpHotSpot { deck: DeckId, slot: usize },
    /// Clear a slot
    ClearHotSpot { deck: DeckId, slot: usize },

    // ─────────────────────────────────────────────────────────────
    // Scratch drag
    // ─────────────────────────────────────────────────────────────
    /// Pointer down on the platter
    DragStart { deck: DeckId },
    /// Pointer moved while dragging (pixel deltas since the last event)
    DragMove { deck: DeckId, dx: f64, dy: f64 },
    /// Pointer released
    DragEnd { deck: DeckId },
    /// Set the interpolation quality for transport and grain reads
    SetInterpolation { method: InterpolationMethod },

    // ─────────────────────────────────────────────────────────────
    // Chain controls
    // ─────────────────────────────────────────────────────────────
    /// Set the filter position (0.0 = 120 Hz, 1.0 = 20 kHz)
    SetFilter { deck: DeckId, value: f32 },
    /// Set the echo wet level
    SetEchoWet { deck: DeckId, value: f32 },
    /// Set the reverb wet level
    SetReverbWet { deck: DeckId, value: f32 },
    /// Apply a one-tap preset by index into [`super::chain::FX_PRESETS`]
    ApplyFxPreset { deck: DeckId, preset: usize },
    /// Return all chain controls to neutral
    ClearFx { deck: DeckId },

    // ─────────────────────────────────────────────────────────────
    // Mixer
    // ─────────────────────────────────────────────────────────────
    /// Set the crossfade position (0.0 = full A, 1.0 = full B)
    SetCrossfade { position: f32 },
    /// Set a deck's volume fader
    SetVolume { deck: DeckId, volume: f32 },
    /// Start a timed crossfade sweep (direction alternates per call)
    RunTransition,

    // ─────────────────────────────────────────────────────────────
    // Sample bank
    // ─────────────────────────────────────────────────────────────
    /// Toggle a sample slot's voice
    TriggerSample { slot: usize },
}

/// Capacity of the command queue
///
/// Drag gestures are the densest producer (one DragMove per pointer event);
/// 256 gives ample headroom for a UI frame's worth of events.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer/consumer pair)
///
/// The producer side belongs to the UI thread, the consumer side to the
/// audio thread.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}
