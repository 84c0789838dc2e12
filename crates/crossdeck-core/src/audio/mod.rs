//! CPAL audio backend
//!
//! Opens the master output stream and moves the [`Session`] onto the audio
//! thread. Each callback drains the command queue, advances the session by
//! the block duration, renders the master mix, and interleaves it into the
//! device buffer. The UI keeps the command producer and the deck atomics.
//!
//! ```text
//! UI thread ──push()──► command queue (lock-free SPSC)
//!                              │ pop()
//!                              ▼
//!                     CPAL audio thread (owns Session)
//!                              │ relaxed atomic writes
//!                              ▼
//!                        DeckAtomics ◄── UI reads each frame
//! ```

mod error;

pub use error::{AudioError, AudioResult};

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use serde::{Deserialize, Serialize};

use crate::engine::{command_channel, DeckAtomics, EngineCommand, Session};
use crate::types::{StereoBuffer, NUM_DECKS, SAMPLE_RATE};

/// Audio device configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name (None = system default)
    pub device: Option<String>,
    /// Requested buffer size in frames (None = device default)
    pub buffer_size: Option<u32>,
}

/// Handle keeping the output stream alive; drop it to stop audio
pub struct AudioHandle {
    _stream: cpal::Stream,
    sample_rate: u32,
}

impl AudioHandle {
    /// Sample rate of the running stream
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// A running audio system
pub struct AudioSystem {
    /// Keeps the stream alive
    pub handle: AudioHandle,
    /// Command producer for the UI thread
    pub commands: rtrb::Producer<EngineCommand>,
    /// Lock-free deck state for the UI thread
    pub deck_atomics: [Arc<DeckAtomics>; NUM_DECKS],
}

/// Build and start the master output stream
pub fn start_output(config: &AudioConfig) -> AudioResult<AudioSystem> {
    let host = cpal::default_host();
    let device = match &config.device {
        Some(name) => find_device(&host, name)?,
        None => host.default_output_device().ok_or(AudioError::NoDevices)?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("using audio device: {}", device_name);

    let supported = pick_config(&device)?;
    let channels = supported.channels();
    let stream_config = StreamConfig {
        channels,
        sample_rate: SampleRate(SAMPLE_RATE),
        buffer_size: match config.buffer_size {
            Some(frames) => cpal::BufferSize::Fixed(frames),
            None => cpal::BufferSize::Default,
        },
    };

    log::info!(
        "audio config: {} channels at {} Hz",
        stream_config.channels,
        SAMPLE_RATE
    );

    let mut session = Session::new();
    let deck_atomics = session.deck_atomics();
    let (command_tx, mut command_rx) = command_channel();

    let mut master = StereoBuffer::default();
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| {
                session.process_commands(&mut command_rx);
                let frames = data.len() / channels as usize;
                master.resize(frames);
                session.tick(frames as f64 / SAMPLE_RATE as f64);
                session.process(&mut master);
                write_interleaved(&master, data, channels as usize);
            },
            |e| log::error!("audio stream error: {}", e),
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    Ok(AudioSystem {
        handle: AudioHandle {
            _stream: stream,
            sample_rate: SAMPLE_RATE,
        },
        commands: command_tx,
        deck_atomics,
    })
}

/// Find an f32 output configuration running at the engine rate
fn pick_config(device: &cpal::Device) -> AudioResult<cpal::SupportedStreamConfig> {
    let configs = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;
    for range in configs {
        if range.sample_format() == SampleFormat::F32
            && range.min_sample_rate().0 <= SAMPLE_RATE
            && range.max_sample_rate().0 >= SAMPLE_RATE
        {
            return Ok(range.with_sample_rate(SampleRate(SAMPLE_RATE)));
        }
    }
    Err(AudioError::UnsupportedSampleRate(SAMPLE_RATE))
}

/// Find an output device by name
fn find_device(host: &cpal::Host, name: &str) -> AudioResult<cpal::Device> {
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;
    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }
    Err(AudioError::DeviceNotFound(name.to_string()))
}

/// Interleave the master mix into the device buffer
///
/// Mono devices get a downmix; extra channels beyond stereo get silence.
fn write_interleaved(master: &StereoBuffer, data: &mut [f32], channels: usize) {
    for (frame, s) in data.chunks_mut(channels).zip(master.iter()) {
        if channels == 1 {
            frame[0] = 0.5 * (s.left + s.right);
        } else {
            frame[0] = s.left;
            frame[1] = s.right;
            for extra in frame.iter_mut().skip(2) {
                *extra = 0.0;
            }
        }
    }
}
