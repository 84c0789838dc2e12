//! Deck - one independent playback unit with its signal chain
//!
//! A deck owns a decoded source, the transport (play/pause/seek/rate), the
//! hot-spot slots, the scratch-drag controller and the platter display
//! state. Audio is rendered in blocks through the deck's [`SignalChain`];
//! scratch grains bypass the chain and are mixed by the session.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analysis::WaveformPeaks;
use crate::audio_file::AudioSource;
use crate::loader::PreparedSource;
use crate::types::{DeckId, PlayState, StereoBuffer, SAMPLE_RATE};

use super::chain::SignalChain;
use super::grain::{read_interpolated, GrainSynthesizer, InterpolationMethod};

/// Number of hot-spot slots per deck
pub const HOT_SPOT_SLOTS: usize = 8;

/// Horizontal drag to transport mapping (seconds per pixel)
const JOG_SECONDS_PER_PIXEL: f64 = 0.01;

/// Vertical drag below this many pixels does not fire a grain
const SCRATCH_THRESHOLD_PX: f64 = 3.0;

/// Minimum spacing between scratch grains
const GRAIN_INTERVAL: Duration = Duration::from_millis(18);

/// Platter revolutions per second at playback rate 1.0
const PLATTER_BASE_RPS: f64 = 0.55;

/// Platter angle nudge per horizontal drag pixel (radians)
const PLATTER_NUDGE_PER_PIXEL: f64 = 0.002;

/// Visual integration step cap; longer stalls advance by at most this
const MAX_TICK_SECONDS: f64 = 0.05;

/// Playback rate bounds
const MIN_RATE: f64 = 0.25;
const MAX_RATE: f64 = 4.0;

/// Lock-free playback state for UI access
///
/// The UI thread reads these atomics every animation frame without touching
/// the engine. The audio thread writes them whenever the corresponding state
/// changes. `Ordering::Relaxed` everywhere: only visibility is needed.
pub struct DeckAtomics {
    /// Current playhead position in samples
    position: AtomicU64,
    /// Playback state: 0=Stopped, 1=Paused, 2=Playing
    state: AtomicU8,
}

impl DeckAtomics {
    fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            state: AtomicU8::new(0),
        }
    }

    /// Current position in samples (lock-free)
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Current position in seconds (lock-free)
    #[inline]
    pub fn position_seconds(&self) -> f64 {
        self.position() as f64 / SAMPLE_RATE as f64
    }

    /// Check if playing (lock-free)
    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state.load(Ordering::Relaxed) == 2
    }

    /// Play state as an enum (lock-free)
    #[inline]
    pub fn play_state(&self) -> PlayState {
        match self.state.load(Ordering::Relaxed) {
            1 => PlayState::Paused,
            2 => PlayState::Playing,
            _ => PlayState::Stopped,
        }
    }
}

impl Default for DeckAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only deck state for the renderer, captured once per frame
#[derive(Debug, Clone)]
pub struct DeckSnapshot {
    pub state: PlayState,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub rate: f64,
    pub hot_spots: [Option<f64>; HOT_SPOT_SLOTS],
    pub bpm: Option<f64>,
    pub platter_angle: f64,
    pub label: Option<String>,
}

/// Scratch drag state
#[derive(Debug, Default)]
struct ScratchDrag {
    active: bool,
    /// Resume playback when the drag ends
    resume_playing: bool,
    last_grain_at: Option<Instant>,
}

/// A single deck in the console
pub struct Deck {
    id: DeckId,
    /// Currently loaded source (None if empty)
    source: Option<Arc<AudioSource>>,
    /// Waveform peaks of the loaded source (empty if none)
    peaks: WaveformPeaks,
    /// Display label of the loaded source
    label: Option<String>,
    /// Tempo estimate of the loaded source
    bpm: Option<f64>,
    /// Playhead position in samples (fractional)
    position: f64,
    /// Playback rate (1.0 = normal)
    rate: f64,
    state: PlayState,
    hot_spots: [Option<f64>; HOT_SPOT_SLOTS],
    /// Rotational display state; derived, never authoritative
    platter_angle: f64,
    platter_velocity: f64,
    interpolation: InterpolationMethod,
    scratch: ScratchDrag,
    chain: SignalChain,
    grains: GrainSynthesizer,
    atomics: Arc<DeckAtomics>,
}

impl Deck {
    /// Create a new empty deck
    pub fn new(id: DeckId) -> Self {
        Self {
            id,
            source: None,
            peaks: WaveformPeaks::default(),
            label: None,
            bpm: None,
            position: 0.0,
            rate: 1.0,
            state: PlayState::Stopped,
            hot_spots: [None; HOT_SPOT_SLOTS],
            platter_angle: 0.0,
            platter_velocity: 0.0,
            interpolation: InterpolationMethod::default(),
            scratch: ScratchDrag::default(),
            chain: SignalChain::new(SAMPLE_RATE),
            grains: GrainSynthesizer::new(),
            atomics: Arc::new(DeckAtomics::new()),
        }
    }

    /// Get the deck ID
    pub fn id(&self) -> DeckId {
        self.id
    }

    /// Get a reference to the lock-free atomic state
    pub fn atomics(&self) -> Arc<DeckAtomics> {
        Arc::clone(&self.atomics)
    }

    #[inline]
    fn sync_position_atomic(&self) {
        self.atomics
            .position
            .store(self.position.max(0.0) as u64, Ordering::Relaxed);
    }

    #[inline]
    fn sync_state_atomic(&self) {
        let v = match self.state {
            PlayState::Stopped => 0,
            PlayState::Paused => 1,
            PlayState::Playing => 2,
        };
        self.atomics.state.store(v, Ordering::Relaxed);
    }

    // --- Loading ---

    /// Load a prepared source, replacing any previous one wholesale
    ///
    /// Hot-spots survive the load except those past the new duration (they
    /// would violate the in-range invariant). Chain control values survive;
    /// chain time-state (delay line, reverb tail) is cleared.
    pub fn load_source(&mut self, prepared: PreparedSource) {
        let duration = prepared.source.duration_seconds();
        for slot in &mut self.hot_spots {
            if slot.is_some_and(|t| t > duration) {
                *slot = None;
            }
        }

        log::info!(
            "deck {}: loaded {} ({:.1}s, bpm {:?})",
            self.id,
            prepared.label.as_deref().unwrap_or("<bytes>"),
            duration,
            prepared.bpm
        );

        self.source = Some(prepared.source);
        self.peaks = prepared.peaks;
        self.label = prepared.label;
        self.bpm = prepared.bpm;
        self.position = 0.0;
        self.state = PlayState::Paused;
        self.scratch = ScratchDrag::default();
        self.grains.clear();
        self.chain.reset();

        self.sync_position_atomic();
        self.sync_state_atomic();
    }

    /// Unload the current source
    pub fn unload(&mut self) {
        self.source = None;
        self.peaks = WaveformPeaks::default();
        self.label = None;
        self.bpm = None;
        self.position = 0.0;
        self.state = PlayState::Stopped;
        self.hot_spots = [None; HOT_SPOT_SLOTS];
        self.scratch = ScratchDrag::default();
        self.grains.clear();
        self.chain.reset();

        self.sync_position_atomic();
        self.sync_state_atomic();
    }

    // --- Queries ---

    /// Check if a source is loaded
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Get the loaded source
    pub fn source(&self) -> Option<&Arc<AudioSource>> {
        self.source.as_ref()
    }

    /// Waveform peaks of the loaded source (empty when none)
    pub fn peaks(&self) -> &WaveformPeaks {
        &self.peaks
    }

    /// Display label of the loaded source
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Tempo estimate of the loaded source
    pub fn bpm(&self) -> Option<f64> {
        self.bpm
    }

    /// Current playback state
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Duration of the loaded source in seconds (0.0 when empty)
    pub fn duration_seconds(&self) -> f64 {
        self.source.as_ref().map_or(0.0, |s| s.duration_seconds())
    }

    /// Playhead position in seconds
    pub fn position_seconds(&self) -> f64 {
        self.position / SAMPLE_RATE as f64
    }

    /// Current playback rate
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Current platter angle in radians
    pub fn platter_angle(&self) -> f64 {
        self.platter_angle
    }

    /// Whether a scratch drag is in progress
    pub fn is_scratching(&self) -> bool {
        self.scratch.active
    }

    /// Access the signal chain controls
    pub fn chain(&self) -> &SignalChain {
        &self.chain
    }

    /// Mutable access to the signal chain controls
    pub fn chain_mut(&mut self) -> &mut SignalChain {
        &mut self.chain
    }

    /// Capture a renderer snapshot of this deck
    pub fn snapshot(&self) -> DeckSnapshot {
        DeckSnapshot {
            state: self.state,
            position_seconds: self.position_seconds(),
            duration_seconds: self.duration_seconds(),
            rate: self.rate,
            hot_spots: self.hot_spots,
            bpm: self.bpm,
            platter_angle: self.platter_angle,
            label: self.label.clone(),
        }
    }

    // --- Transport ---

    /// Toggle between Paused and Playing; no effect with no source
    pub fn toggle_play(&mut self) {
        match self.state {
            PlayState::Stopped => {}
            PlayState::Paused => {
                self.state = PlayState::Playing;
                self.sync_state_atomic();
            }
            PlayState::Playing => {
                self.state = PlayState::Paused;
                self.sync_state_atomic();
            }
        }
    }

    /// Start playback (no-op with no source)
    pub fn play(&mut self) {
        if self.source.is_some() {
            self.state = PlayState::Playing;
            self.sync_state_atomic();
        }
    }

    /// Pause playback
    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
            self.sync_state_atomic();
        }
    }

    /// Seek to a position in seconds, clamped to [0, duration]
    ///
    /// Allowed in any state; never changes play/pause.
    pub fn set_position(&mut self, seconds: f64) {
        if let Some(source) = &self.source {
            let t = seconds.clamp(0.0, source.duration_seconds());
            self.position = t * SAMPLE_RATE as f64;
            self.sync_position_atomic();
        }
    }

    /// Seek to a fraction of the track (the waveform-click gesture)
    pub fn seek_fraction(&mut self, fraction: f64) {
        let dur = self.duration_seconds();
        if dur > 0.0 {
            self.set_position(fraction.clamp(0.0, 1.0) * dur);
        }
    }

    /// Set the playback rate
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate.clamp(MIN_RATE, MAX_RATE);
    }

    /// Set the interpolation method for transport and grain reads
    pub fn set_interpolation(&mut self, method: InterpolationMethod) {
        self.interpolation = method;
        self.grains.set_interpolation(method);
    }

    // --- Hot spots ---

    /// Store the current position into a slot (overwrite allowed)
    pub fn set_hot(&mut self, slot: usize) {
        if slot < HOT_SPOT_SLOTS && self.source.is_some() {
            self.hot_spots[slot] = Some(self.position_seconds());
        }
    }

    /// Seek to a slot's stored time; no-op if the slot is empty
    pub fn jump_hot(&mut self, slot: usize) {
        if let Some(Some(t)) = self.hot_spots.get(slot).copied() {
            self.set_position(t);
        }
    }

    /// Clear a slot
    pub fn clear_hot(&mut self, slot: usize) {
        if slot < HOT_SPOT_SLOTS {
            self.hot_spots[slot] = None;
        }
    }

    /// Get a slot's stored time
    pub fn hot_spot(&self, slot: usize) -> Option<f64> {
        self.hot_spots.get(slot).copied().flatten()
    }

    /// All hot-spot slots
    pub fn hot_spots(&self) -> [Option<f64>; HOT_SPOT_SLOTS] {
        self.hot_spots
    }

    // --- Scratch drag ---

    /// Begin a scratch drag: pauses the transport and switches position
    /// tracking to manual. No-op with no source.
    pub fn drag_start(&mut self) {
        if self.source.is_none() {
            return;
        }
        self.scratch.active = true;
        self.scratch.resume_playing = self.state == PlayState::Playing;
        self.scratch.last_grain_at = None;
        self.pause();
    }

    /// Apply a drag delta: horizontal motion jogs the playhead, vertical
    /// motion above the threshold fires a scratch grain (rate-limited)
    pub fn drag_move(&mut self, dx: f64, dy: f64) {
        if !self.scratch.active {
            return;
        }
        let Some(source) = &self.source else { return };
        let dur = source.duration_seconds();
        if dur <= 0.0 {
            return;
        }

        let t = (self.position_seconds() + dx * JOG_SECONDS_PER_PIXEL).clamp(0.0, dur);
        self.position = t * SAMPLE_RATE as f64;
        self.platter_angle += dx * PLATTER_NUDGE_PER_PIXEL;
        self.sync_position_atomic();

        if dy.abs() >= SCRATCH_THRESHOLD_PX {
            let now = Instant::now();
            let due = self
                .scratch
                .last_grain_at
                .is_none_or(|at| now.duration_since(at) >= GRAIN_INTERVAL);
            if due {
                let source = Arc::clone(source);
                // Up is negative clientY delta, so -dy means forward
                self.grains.trigger(&source, t, -dy);
                self.scratch.last_grain_at = Some(now);
            }
        }
    }

    /// End a scratch drag, resuming playback only if the deck was playing
    /// when the drag began
    pub fn drag_end(&mut self) {
        if !self.scratch.active {
            return;
        }
        self.scratch.active = false;
        if self.scratch.resume_playing {
            self.play();
        }
    }

    // --- Per-frame visual integration ---

    /// Advance the platter display state by `dt` seconds (capped at 50 ms)
    pub fn tick(&mut self, dt: f64) {
        let dt = dt.min(MAX_TICK_SECONDS).max(0.0);
        let base_rps = if self.state.is_playing() {
            self.rate * PLATTER_BASE_RPS
        } else {
            0.0
        };
        let target = base_rps * std::f64::consts::TAU;
        self.platter_velocity += (target - self.platter_velocity) * (dt * 6.0).min(1.0);
        self.platter_angle += self.platter_velocity * dt;
    }

    // --- Audio processing ---

    /// Render one block of chain output
    ///
    /// When playing, reads the source at the current rate and advances the
    /// playhead; otherwise the chain processes silence so echo and reverb
    /// tails keep ringing. Reaching the end of the track pauses the deck.
    pub fn process(&mut self, output: &mut StereoBuffer) {
        output.fill_silence();

        if let Some(source) = &self.source {
            if self.state == PlayState::Playing {
                let data = source.samples().as_slice();
                let len = data.len() as f64;
                for frame in output.iter_mut() {
                    if self.position >= len {
                        break;
                    }
                    *frame = read_interpolated(data, self.position, self.interpolation);
                    self.position += self.rate;
                }
                if self.position >= len {
                    self.position = len;
                    self.state = PlayState::Paused;
                    self.sync_state_atomic();
                }
                self.sync_position_atomic();
            }
        }

        self.chain.process(output);
    }

    /// Mix any active scratch grains into `output` (post-chain, pre-master)
    pub fn mix_grains(&mut self, output: &mut StereoBuffer) {
        self.grains.render(output);
    }

    /// Number of scratch grains currently sounding
    pub fn active_grains(&self) -> usize {
        self.grains.active_voices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::compute_peaks;
    use crate::audio_file::AudioSource;

    fn prepared(seconds: f64) -> PreparedSource {
        let len = (SAMPLE_RATE as f64 * seconds) as usize;
        let mut data = Vec::with_capacity(len * 2);
        for i in 0..len {
            let v = (i as f32 / len as f32) * 0.5;
            data.push(v);
            data.push(v);
        }
        let source = AudioSource::from_interleaved(&data, 2, SAMPLE_RATE).unwrap();
        let peaks = compute_peaks(&source.mono(), 64);
        PreparedSource {
            source,
            peaks,
            bpm: None,
            label: Some("test".into()),
        }
    }

    #[test]
    fn test_empty_deck_noops() {
        let mut deck = Deck::new(DeckId::A);
        assert_eq!(deck.state(), PlayState::Stopped);

        deck.toggle_play();
        assert_eq!(deck.state(), PlayState::Stopped);

        deck.set_hot(0);
        assert_eq!(deck.hot_spot(0), None);

        deck.drag_start();
        assert!(!deck.is_scratching());

        deck.set_position(3.0);
        assert_eq!(deck.position_seconds(), 0.0);
    }

    #[test]
    fn test_load_and_toggle() {
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(1.0));

        assert!(deck.has_source());
        assert_eq!(deck.state(), PlayState::Paused);
        assert_eq!(deck.bpm(), None);

        deck.toggle_play();
        assert_eq!(deck.state(), PlayState::Playing);
        deck.toggle_play();
        assert_eq!(deck.state(), PlayState::Paused);
    }

    #[test]
    fn test_seek_clamps() {
        let mut deck = Deck::new(DeckId::B);
        deck.load_source(prepared(1.0));

        deck.set_position(99.0);
        assert!((deck.position_seconds() - 1.0).abs() < 1e-9);

        deck.set_position(-5.0);
        assert_eq!(deck.position_seconds(), 0.0);

        deck.seek_fraction(0.5);
        assert!((deck.position_seconds() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_hot_spot_scenario() {
        // Load a 10-second buffer, mark slot 3 at 4.0s, seek away, jump back
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(10.0));

        deck.set_position(4.0);
        deck.set_hot(3);
        deck.set_position(8.0);
        deck.jump_hot(3);
        assert!((deck.position_seconds() - 4.0).abs() < 1e-6);

        // Clearing then jumping is a no-op
        deck.set_position(8.0);
        deck.clear_hot(3);
        deck.jump_hot(3);
        assert!((deck.position_seconds() - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_hot_spots_never_change_play_state() {
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(2.0));
        deck.play();

        deck.set_hot(0);
        deck.jump_hot(0);
        assert_eq!(deck.state(), PlayState::Playing);

        deck.pause();
        deck.jump_hot(0);
        assert_eq!(deck.state(), PlayState::Paused);
    }

    #[test]
    fn test_hot_spots_survive_load_within_range() {
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(10.0));
        deck.set_position(3.0);
        deck.set_hot(0);
        deck.set_position(8.0);
        deck.set_hot(1);

        // A shorter track keeps only in-range spots
        deck.load_source(prepared(5.0));
        assert_eq!(deck.hot_spot(0), Some(3.0));
        assert_eq!(deck.hot_spot(1), None);
    }

    #[test]
    fn test_drag_pauses_and_resumes() {
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(2.0));
        deck.play();

        deck.drag_start();
        assert!(deck.is_scratching());
        assert_eq!(deck.state(), PlayState::Paused);

        deck.drag_end();
        assert!(!deck.is_scratching());
        assert_eq!(deck.state(), PlayState::Playing);
    }

    #[test]
    fn test_drag_does_not_resume_when_paused() {
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(2.0));

        deck.drag_start();
        deck.drag_end();
        assert_eq!(deck.state(), PlayState::Paused);
    }

    #[test]
    fn test_drag_jogs_position() {
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(5.0));
        deck.set_position(1.0);

        deck.drag_start();
        deck.drag_move(100.0, 0.0); // 100 px * 0.01 s/px = +1.0 s
        assert!((deck.position_seconds() - 2.0).abs() < 1e-6);

        deck.drag_move(-400.0, 0.0); // clamps at 0
        assert_eq!(deck.position_seconds(), 0.0);
    }

    #[test]
    fn test_drag_fires_grain_above_threshold() {
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(5.0));
        deck.set_position(1.0);

        deck.drag_start();
        deck.drag_move(0.0, 1.0); // below threshold
        assert_eq!(deck.active_grains(), 0);

        deck.drag_move(0.0, -20.0); // above threshold, forward
        assert_eq!(deck.active_grains(), 1);
    }

    #[test]
    fn test_process_advances_and_pauses_at_end() {
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(0.01)); // 480 samples
        deck.play();

        let mut out = StereoBuffer::silence(1024);
        deck.process(&mut out);

        assert_eq!(deck.state(), PlayState::Paused);
        assert!((deck.position_seconds() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_process_paused_outputs_silence() {
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(1.0));

        let mut out = StereoBuffer::silence(256);
        deck.process(&mut out);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(deck.position_seconds(), 0.0);
    }

    #[test]
    fn test_platter_spins_while_playing() {
        let mut deck = Deck::new(DeckId::A);
        deck.load_source(prepared(1.0));
        deck.play();

        for _ in 0..20 {
            deck.tick(0.016);
        }
        assert!(deck.platter_angle() > 0.0);

        // Velocity eases back toward zero when paused
        deck.pause();
        for _ in 0..200 {
            deck.tick(0.016);
        }
        let before = deck.platter_angle();
        deck.tick(0.016);
        assert!((deck.platter_angle() - before).abs() < 1e-6);
    }

    #[test]
    fn test_rate_clamped() {
        let mut deck = Deck::new(DeckId::A);
        deck.set_rate(100.0);
        assert_eq!(deck.rate(), 4.0);
        deck.set_rate(0.0);
        assert_eq!(deck.rate(), 0.25);
    }
}
