//! Session - the context object owning the whole console
//!
//! One `Session` owns both decks, the mixer and the sample bank. Every
//! mutation goes through its methods (directly or via the command queue), so
//! the engine needs no locks: the audio thread is the single owner, the UI
//! reads atomics and snapshots.
//!
//! The session is also where the mixer's gain law lands on the deck chains:
//! crossfade and fader moves compute the equal-power pair and apply it via
//! `SignalChain::set_gain`.

use std::sync::Arc;

use crate::types::{DeckId, StereoBuffer, NUM_DECKS};

use super::chain::FX_PRESETS;
use super::command::EngineCommand;
use super::deck::{Deck, DeckAtomics, DeckSnapshot};
use super::grain::InterpolationMethod;
use super::mixer::Mixer;
use super::sample_bank::SampleBank;

/// Read-only console state for the renderer, captured once per frame
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub decks: [DeckSnapshot; NUM_DECKS],
    pub crossfade: f32,
    pub transition_active: bool,
}

/// The two-deck console
pub struct Session {
    decks: [Deck; NUM_DECKS],
    mixer: Mixer,
    samples: SampleBank,
    /// Scratch block for per-deck chain output
    chain_buffer: StereoBuffer,
}

impl Session {
    /// Create a session with empty decks, centered crossfade
    pub fn new() -> Self {
        let mut session = Self {
            decks: [Deck::new(DeckId::A), Deck::new(DeckId::B)],
            mixer: Mixer::new(),
            samples: SampleBank::new(),
            chain_buffer: StereoBuffer::default(),
        };
        let gains = session.mixer.gains();
        session.apply_gains(gains);
        session
    }

    /// Get a reference to a deck
    pub fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    /// Get a mutable reference to a deck
    pub fn deck_mut(&mut self, id: DeckId) -> &mut Deck {
        &mut self.decks[id.index()]
    }

    /// Get the mixer state (read-only; mutations go through the session)
    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Get the sample bank
    pub fn sample_bank(&self) -> &SampleBank {
        &self.samples
    }

    /// Get the sample bank mutably
    pub fn sample_bank_mut(&mut self) -> &mut SampleBank {
        &mut self.samples
    }

    /// Lock-free atomics for both decks, for the UI thread
    pub fn deck_atomics(&self) -> [Arc<DeckAtomics>; NUM_DECKS] {
        std::array::from_fn(|i| self.decks[i].atomics())
    }

    /// Capture a renderer snapshot of the whole console
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            decks: std::array::from_fn(|i| self.decks[i].snapshot()),
            crossfade: self.mixer.crossfade(),
            transition_active: self.mixer.transition_active(),
        }
    }

    // --- Mixer wiring ---

    fn apply_gains(&mut self, gains: (f32, f32)) {
        self.decks[0].chain_mut().set_gain(gains.0);
        self.decks[1].chain_mut().set_gain(gains.1);
    }

    /// Set the crossfade position and apply the gain law to both chains
    pub fn set_crossfade(&mut self, x: f32) {
        let gains = self.mixer.set_crossfade(x);
        self.apply_gains(gains);
    }

    /// Set a deck's volume fader and reapply the gain law
    pub fn set_volume(&mut self, deck: DeckId, volume: f32) {
        let gains = self.mixer.set_volume(deck, volume);
        self.apply_gains(gains);
    }

    /// Start a timed crossfade sweep (direction alternates per call)
    pub fn run_transition(&mut self) {
        self.mixer.run_transition();
    }

    /// Set interpolation quality on both decks
    pub fn set_interpolation(&mut self, method: InterpolationMethod) {
        for deck in &mut self.decks {
            deck.set_interpolation(method);
        }
    }

    // --- Per-frame driving ---

    /// Advance visual state and any active transition by `dt` seconds
    ///
    /// Deck platter integration caps its own step at 50 ms; the transition
    /// accumulates real elapsed time so a stalled frame does not stretch the
    /// sweep.
    pub fn tick(&mut self, dt: f64) {
        for deck in &mut self.decks {
            deck.tick(dt);
        }
        if let Some(gains) = self.mixer.tick(dt) {
            self.apply_gains(gains);
        }
    }

    // --- Command handling ---

    /// Drain and execute all queued commands
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = rx.pop() {
            self.handle_command(cmd);
        }
    }

    /// Execute a single command
    pub fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::LoadDeck { deck, source } => {
                self.deck_mut(deck).load_source(*source);
            }
            EngineCommand::UnloadDeck { deck } => self.deck_mut(deck).unload(),
            EngineCommand::LoadSample { slot, source, label } => {
                self.samples.load(slot, source, label);
            }
            EngineCommand::TogglePlay { deck } => self.deck_mut(deck).toggle_play(),
            EngineCommand::Seek { deck, seconds } => self.deck_mut(deck).set_position(seconds),
            EngineCommand::SeekFraction { deck, fraction } => {
                self.deck_mut(deck).seek_fraction(fraction);
            }
            EngineCommand::SetRate { deck, rate } => self.deck_mut(deck).set_rate(rate),
            EngineCommand::SetHotSpot { deck, slot } => self.deck_mut(deck).set_hot(slot),
            EngineCommand::JumpHotSpot { deck, slot } => self.deck_mut(deck).jump_hot(slot),
            EngineCommand::ClearHotSpot { deck, slot } => self.deck_mut(deck).clear_hot(slot),
            EngineCommand::DragStart { deck } => self.deck_mut(deck).drag_start(),
            EngineCommand::DragMove { deck, dx, dy } => self.deck_mut(deck).drag_move(dx, dy),
            EngineCommand::DragEnd { deck } => self.deck_mut(deck).drag_end(),
            EngineCommand::SetInterpolation { method } => self.set_interpolation(method),
            EngineCommand::SetFilter { deck, value } => {
                self.deck_mut(deck).chain_mut().set_filter_norm(value);
            }
            EngineCommand::SetEchoWet { deck, value } => {
                self.deck_mut(deck).chain_mut().set_echo_wet(value);
            }
            EngineCommand::SetReverbWet { deck, value } => {
                self.deck_mut(deck).chain_mut().set_reverb_wet(value);
            }
            EngineCommand::ApplyFxPreset { deck, preset } => {
                if let Some(p) = FX_PRESETS.get(preset) {
                    self.deck_mut(deck).chain_mut().apply_preset(p);
                }
            }
            EngineCommand::ClearFx { deck } => {
                self.deck_mut(deck).chain_mut().reset_controls();
            }
            EngineCommand::SetCrossfade { position } => self.set_crossfade(position),
            EngineCommand::SetVolume { deck, volume } => self.set_volume(deck, volume),
            EngineCommand::RunTransition => self.run_transition(),
            EngineCommand::TriggerSample { slot } => {
                self.samples.trigger(slot);
            }
        }
    }

    // --- Audio processing ---

    /// Render one block of master output
    ///
    /// Deck chains are summed first (their gains already carry the
    /// crossfade law), then scratch grains and sample voices mix straight
    /// into the master, bypassing the chains.
    pub fn process(&mut self, master: &mut StereoBuffer) {
        master.fill_silence();
        let len = master.len();
        self.chain_buffer.resize(len);

        for deck in &mut self.decks {
            deck.process(&mut self.chain_buffer);
            master.add_buffer(&self.chain_buffer);
            deck.mix_grains(master);
        }

        self.samples.render(master);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
