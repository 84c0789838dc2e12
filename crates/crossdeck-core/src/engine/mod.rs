//! Audio engine - decks, signal chains, mixer, grains, sample bank
//!
//! This module contains the real-time core of the console:
//! - Deck: transport, hot spots, scratch drag, platter state
//! - SignalChain: filter / echo / convolution reverb routing per deck
//! - GrainSynthesizer: scratch grain voices
//! - Mixer: equal-power crossfade law and the timed transition
//! - SampleBank: 8 toggled looping voices
//! - Session: the context object tying everything together
//! - EngineCommand: the lock-free UI-to-audio command queue

mod chain;
mod command;
mod convolver;
mod deck;
mod grain;
mod mixer;
mod sample_bank;
mod session;

pub use chain::*;
pub use command::*;
pub use convolver::*;
pub use deck::*;
pub use grain::*;
pub use mixer::*;
pub use sample_bank::*;
pub use session::*;
