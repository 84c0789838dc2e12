//! Background source loading
//!
//! Decoding and offline analysis happen on a worker thread so a load never
//! stalls the render loop or the audio callback. Each target (deck or
//! sample slot) carries a generation counter: requesting a new load bumps
//! the generation, and results tagged with an older generation are
//! discarded on arrival. A slow decode can therefore never overwrite a
//! newer load on the same target.
//!
//! The loader lives on the UI thread; a validated [`PreparedSource`] is
//! handed to the engine through the command queue.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender};
use thiserror::Error;

use crate::analysis::{compute_peaks, estimate_bpm, WaveformPeaks, WAVEFORM_BUCKETS};
use crate::audio_file::{decode_bytes, AudioSource, DecodeError};
use crate::types::DeckId;

/// Where a load lands: a deck or a sample slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadTarget {
    Deck(DeckId),
    Sample(usize),
}

/// Errors surfaced by a load
///
/// Surfaced once to the requester; the target keeps its prior source.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The source bytes could not be read (the "no source available" case)
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A decoded source with its offline analysis, ready for the engine
pub struct PreparedSource {
    pub source: Arc<AudioSource>,
    pub peaks: WaveformPeaks,
    /// Tempo estimate; only computed for deck targets
    pub bpm: Option<f64>,
    /// Display label (file name when loaded from a path)
    pub label: Option<String>,
}

/// A finished load, delivered to the requester
pub struct LoadOutcome {
    pub target: LoadTarget,
    pub result: Result<PreparedSource, LoadError>,
}

enum RequestData {
    Path(PathBuf),
    Bytes {
        bytes: Vec<u8>,
        hint: Option<String>,
        label: Option<String>,
    },
}

struct LoadRequest {
    target: LoadTarget,
    generation: u64,
    data: RequestData,
}

struct WorkerResult {
    target: LoadTarget,
    generation: u64,
    result: Result<PreparedSource, LoadError>,
}

/// Handle to the background loading worker
pub struct SourceLoader {
    request_tx: Sender<LoadRequest>,
    result_rx: Receiver<WorkerResult>,
    generations: HashMap<LoadTarget, u64>,
    _worker: std::thread::JoinHandle<()>,
}

impl SourceLoader {
    /// Spawn the worker thread
    pub fn new() -> Self {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();
        let (result_tx, result_rx) = unbounded::<WorkerResult>();

        let worker = std::thread::spawn(move || {
            // Exits when the loader (and its sender) is dropped
            while let Ok(req) = request_rx.recv() {
                let result = prepare(req.target, req.data);
                if result_tx
                    .send(WorkerResult {
                        target: req.target,
                        generation: req.generation,
                        result,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });

        Self {
            request_tx,
            result_rx,
            generations: HashMap::new(),
            _worker: worker,
        }
    }

    /// Request a load from a file path
    pub fn request_path(&mut self, target: LoadTarget, path: impl Into<PathBuf>) {
        let path = path.into();
        let generation = self.bump_generation(target);
        log::info!("load request for {:?}: {}", target, path.display());
        let _ = self.request_tx.send(LoadRequest {
            target,
            generation,
            data: RequestData::Path(path),
        });
    }

    /// Request a load from raw bytes
    pub fn request_bytes(
        &mut self,
        target: LoadTarget,
        bytes: Vec<u8>,
        hint: Option<String>,
        label: Option<String>,
    ) {
        let generation = self.bump_generation(target);
        let _ = self.request_tx.send(LoadRequest {
            target,
            generation,
            data: RequestData::Bytes { bytes, hint, label },
        });
    }

    /// Non-blocking poll for the next fresh outcome
    ///
    /// Stale results (an older generation than the target's current one)
    /// are discarded here, never delivered.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        while let Ok(res) = self.result_rx.try_recv() {
            if let Some(outcome) = self.accept(res) {
                return Some(outcome);
            }
        }
        None
    }

    /// Poll, waiting up to `timeout` for a fresh outcome
    pub fn poll_timeout(&mut self, timeout: Duration) -> Option<LoadOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            match self.result_rx.recv_timeout(remaining) {
                Ok(res) => {
                    if let Some(outcome) = self.accept(res) {
                        return Some(outcome);
                    }
                }
                Err(_) => return None,
            }
        }
    }

    fn bump_generation(&mut self, target: LoadTarget) -> u64 {
        let generation = self.generations.entry(target).or_insert(0);
        *generation += 1;
        *generation
    }

    fn accept(&self, res: WorkerResult) -> Option<LoadOutcome> {
        let current = self.generations.get(&res.target).copied().unwrap_or(0);
        if res.generation != current {
            log::debug!(
                "discarding stale load for {:?} (generation {} < {})",
                res.target,
                res.generation,
                current
            );
            return None;
        }
        Some(LoadOutcome {
            target: res.target,
            result: res.result,
        })
    }
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode and analyze one request on the worker thread
fn prepare(target: LoadTarget, data: RequestData) -> Result<PreparedSource, LoadError> {
    let (bytes, hint, label) = match data {
        RequestData::Path(path) => {
            let bytes = std::fs::read(&path).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
            let hint = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|s| s.to_ascii_lowercase());
            let label = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|s| s.to_string());
            (bytes, hint, label)
        }
        RequestData::Bytes { bytes, hint, label } => (bytes, hint, label),
    };

    let source = decode_bytes(bytes, hint.as_deref())?;

    let mono = source.mono();
    let peaks = compute_peaks(&mono, WAVEFORM_BUCKETS);
    let bpm = match target {
        LoadTarget::Deck(_) => estimate_bpm(&mono, source.sample_rate()),
        LoadTarget::Sample(_) => None,
    };

    log::debug!(
        "prepared {:?}: {:.1}s, bpm {:?}",
        target,
        source.duration_seconds(),
        bpm
    );

    Ok(PreparedSource {
        source,
        peaks,
        bpm,
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMPLE_RATE;

    /// Minimal 16-bit PCM mono WAV at the engine rate
    fn wav_bytes(frames: usize) -> Vec<u8> {
        let data_len = (frames * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        bytes.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames {
            bytes.extend_from_slice(&((i % 256) as i16 * 32).to_le_bytes());
        }
        bytes
    }

    const WAIT: Duration = Duration::from_secs(10);

    #[test]
    fn test_load_bytes_roundtrip() {
        let mut loader = SourceLoader::new();
        loader.request_bytes(
            LoadTarget::Deck(DeckId::A),
            wav_bytes(256),
            Some("wav".into()),
            Some("clip".into()),
        );

        let outcome = loader.poll_timeout(WAIT).expect("load should finish");
        assert_eq!(outcome.target, LoadTarget::Deck(DeckId::A));

        let prepared = outcome.result.expect("decode should succeed");
        assert_eq!(prepared.source.duration_samples(), 256);
        assert!(!prepared.peaks.is_empty());
        assert_eq!(prepared.label.as_deref(), Some("clip"));
    }

    #[test]
    fn test_stale_generation_discarded() {
        let mut loader = SourceLoader::new();
        let target = LoadTarget::Deck(DeckId::B);

        // Two loads in quick succession: only the newer may be delivered
        loader.request_bytes(target, wav_bytes(64), Some("wav".into()), None);
        loader.request_bytes(target, wav_bytes(128), Some("wav".into()), None);

        let outcome = loader.poll_timeout(WAIT).expect("second load should arrive");
        let prepared = outcome.result.expect("decode should succeed");
        assert_eq!(prepared.source.duration_samples(), 128);

        // Nothing else pending: the stale result is gone, not queued
        assert!(loader.poll().is_none());
    }

    #[test]
    fn test_decode_failure_surfaces_once() {
        let mut loader = SourceLoader::new();
        loader.request_bytes(LoadTarget::Sample(3), vec![1, 2, 3, 4], None, None);

        let outcome = loader.poll_timeout(WAIT).expect("failure should surface");
        assert_eq!(outcome.target, LoadTarget::Sample(3));
        assert!(matches!(outcome.result, Err(LoadError::Decode(_))));
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let mut loader = SourceLoader::new();
        loader.request_path(
            LoadTarget::Deck(DeckId::A),
            "/nonexistent/crossdeck/test.wav",
        );

        let outcome = loader.poll_timeout(WAIT).expect("failure should surface");
        assert!(matches!(outcome.result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn test_sample_targets_skip_bpm() {
        let mut loader = SourceLoader::new();
        loader.request_bytes(LoadTarget::Sample(0), wav_bytes(256), Some("wav".into()), None);

        let outcome = loader.poll_timeout(WAIT).expect("load should finish");
        let prepared = outcome.result.unwrap();
        assert_eq!(prepared.bpm, None);
    }
}
