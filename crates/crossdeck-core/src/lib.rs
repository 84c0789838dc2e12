//! Crossdeck Core - two-deck audio mixing console engine
//!
//! The library owns everything between raw audio bytes and the master
//! output: decoding, per-deck signal chains (filter / echo / convolution
//! reverb), scratch grain synthesis, hot-spot recall, the equal-power
//! crossfade, the sample bank, and offline tempo/waveform analysis. UI,
//! file pickers and catalog discovery are external collaborators driving
//! the engine through [`engine::EngineCommand`] and reading state through
//! snapshots and deck atomics.

pub mod analysis;
pub mod audio;
pub mod audio_file;
pub mod config;
pub mod engine;
pub mod loader;
pub mod types;

pub use types::*;
