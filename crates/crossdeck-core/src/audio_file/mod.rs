//! Audio decoding into engine-rate stereo buffers
//!
//! This module turns raw audio bytes (WAV/MP3/FLAC/OGG) into an immutable
//! [`AudioSource`]: interleaved stereo PCM at [`SAMPLE_RATE`], plus a
//! time-reversed mirror derived once and cached alongside. The reversed
//! buffer exists so backward scratch grains can be read with a plain forward
//! read at a mirrored offset.
//!
//! Decoding is a pure data transform; device I/O lives in [`crate::audio`].

use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use thiserror::Error;

use crate::types::{Sample, StereoBuffer, StereoSample, SAMPLE_RATE};

/// Errors produced while turning raw bytes into an [`AudioSource`]
///
/// A failed decode never mutates the target deck or slot; the caller
/// surfaces the error once and keeps its prior source.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Container probing failed (corrupt or unsupported bytes)
    #[error("unrecognized or unsupported audio container: {0}")]
    Probe(String),

    /// No decodable audio track in the container
    #[error("no decodable audio track found")]
    NoAudioTrack,

    /// A decoder for the track's codec could not be created
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// The track does not declare a sample rate
    #[error("source reports no sample rate")]
    UnknownSampleRate,

    /// The stream decoded to zero frames
    #[error("decoded stream is empty")]
    EmptyStream,

    /// Channel layout the engine cannot map to stereo
    #[error("invalid channel layout: {0} channels")]
    InvalidChannelLayout(u16),

    /// Sample rate conversion to the engine rate failed
    #[error("sample rate conversion failed: {0}")]
    Resample(String),
}

/// An immutable decoded audio source
///
/// Owns the forward stereo buffer and its time-reversed mirror. Sources are
/// shared read-only (`Arc<AudioSource>`) between the transport and the grain
/// synthesizer; nothing writes them after construction.
#[derive(Debug)]
pub struct AudioSource {
    /// Forward stereo samples at the engine rate
    samples: StereoBuffer,
    /// Time-reversed mirror of `samples`
    reversed: StereoBuffer,
    /// Channel count of the original file (before the stereo mapping)
    source_channels: u16,
    /// Duration in seconds at the engine rate
    duration_seconds: f64,
}

impl AudioSource {
    /// Build a source from interleaved samples at an arbitrary rate
    ///
    /// Mono input is duplicated to both channels; layouts with more than two
    /// channels use the first stereo pair. Input at a rate other than
    /// [`SAMPLE_RATE`] is resampled.
    pub fn from_interleaved(
        data: &[Sample],
        channels: u16,
        source_rate: u32,
    ) -> Result<Arc<Self>, DecodeError> {
        if channels == 0 {
            return Err(DecodeError::InvalidChannelLayout(channels));
        }
        let frames = data.len() / channels as usize;
        if frames == 0 {
            return Err(DecodeError::EmptyStream);
        }

        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        for frame in data.chunks_exact(channels as usize) {
            let l = frame[0];
            let r = frame.get(1).copied().unwrap_or(l);
            left.push(l);
            right.push(r);
        }

        if source_rate != SAMPLE_RATE && source_rate != 0 {
            (left, right) = resample_stereo(left, right, source_rate, SAMPLE_RATE)?;
            if left.is_empty() {
                return Err(DecodeError::EmptyStream);
            }
        } else if source_rate == 0 {
            return Err(DecodeError::UnknownSampleRate);
        }

        let samples = StereoBuffer::from_channels(&left, &right);
        let reversed = reverse_buffer(&samples);
        let duration_seconds = samples.len() as f64 / SAMPLE_RATE as f64;

        Ok(Arc::new(Self {
            samples,
            reversed,
            source_channels: channels,
            duration_seconds,
        }))
    }

    /// Forward stereo samples
    #[inline]
    pub fn samples(&self) -> &StereoBuffer {
        &self.samples
    }

    /// Time-reversed mirror of the forward samples
    #[inline]
    pub fn reversed(&self) -> &StereoBuffer {
        &self.reversed
    }

    /// Channel count of the original file
    pub fn source_channels(&self) -> u16 {
        self.source_channels
    }

    /// Engine sample rate of the decoded buffers
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Duration in seconds
    #[inline]
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Duration in samples
    #[inline]
    pub fn duration_samples(&self) -> usize {
        self.samples.len()
    }

    /// Mono mixdown (average of both channels), for offline analysis
    pub fn mono(&self) -> Vec<Sample> {
        self.samples
            .iter()
            .map(|s| (s.left + s.right) * 0.5)
            .collect()
    }
}

/// Derive the time-reversed mirror of a stereo buffer
///
/// Reversing twice reproduces the original sample sequence exactly.
pub fn reverse_buffer(buffer: &StereoBuffer) -> StereoBuffer {
    let samples: Vec<StereoSample> = buffer.as_slice().iter().rev().copied().collect();
    StereoBuffer::from_vec(samples)
}

/// Decode raw audio bytes into an [`AudioSource`]
///
/// `extension_hint` (e.g. "wav", "mp3") speeds up container probing but is
/// not required for a correct decode.
pub fn decode_bytes(
    bytes: Vec<u8>,
    extension_hint: Option<&str>,
) -> Result<Arc<AudioSource>, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Probe(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedCodec(e.to_string()))?;

    let mut samples: Vec<Sample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<Sample>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("error decoding packet: {}", e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    log::debug!(
        "decoded {} frames, {} channels at {} Hz",
        samples.len() / channels.max(1) as usize,
        channels,
        sample_rate
    );

    AudioSource::from_interleaved(&samples, channels, sample_rate)
}

/// Convert a stereo pair to the target rate
fn resample_stereo(
    left: Vec<Sample>,
    right: Vec<Sample>,
    from_rate: u32,
    to_rate: u32,
) -> Result<(Vec<Sample>, Vec<Sample>), DecodeError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let chunk = left.len();
    let mut resampler = SincFixedIn::<Sample>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        chunk,
        2,
    )
    .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let waves_in = vec![left, right];
    let mut waves_out = resampler
        .process(&waves_in, None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let right = waves_out.pop().unwrap_or_default();
    let left = waves_out.pop().unwrap_or_default();
    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_interleaved(frames: usize) -> Vec<Sample> {
        let mut data = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let v = i as Sample / frames as Sample;
            data.push(v);
            data.push(-v);
        }
        data
    }

    /// Build a minimal 16-bit PCM mono WAV at the engine rate
    fn make_wav(samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        bytes.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes()); // byte rate
        bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
        bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_reverse_round_trip() {
        let source = AudioSource::from_interleaved(&ramp_interleaved(64), 2, SAMPLE_RATE).unwrap();
        let back = reverse_buffer(source.reversed());
        assert_eq!(back.as_slice(), source.samples().as_slice());
    }

    #[test]
    fn test_reversed_mirrors_forward() {
        let source = AudioSource::from_interleaved(&ramp_interleaved(16), 2, SAMPLE_RATE).unwrap();
        let n = source.duration_samples();
        for i in 0..n {
            assert_eq!(source.reversed()[i], source.samples()[n - 1 - i]);
        }
    }

    #[test]
    fn test_mono_upmix() {
        let data = [0.25, 0.5, -0.75];
        let source = AudioSource::from_interleaved(&data, 1, SAMPLE_RATE).unwrap();
        assert_eq!(source.duration_samples(), 3);
        for (i, &v) in data.iter().enumerate() {
            assert_eq!(source.samples()[i].left, v);
            assert_eq!(source.samples()[i].right, v);
        }
    }

    #[test]
    fn test_mono_mixdown() {
        let source = AudioSource::from_interleaved(&[1.0, 0.0, 0.0, 1.0], 2, SAMPLE_RATE).unwrap();
        let mono = source.mono();
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn test_empty_stream_rejected() {
        assert!(matches!(
            AudioSource::from_interleaved(&[], 2, SAMPLE_RATE),
            Err(DecodeError::EmptyStream)
        ));
        assert!(matches!(
            AudioSource::from_interleaved(&[0.0], 0, SAMPLE_RATE),
            Err(DecodeError::InvalidChannelLayout(0))
        ));
    }

    #[test]
    fn test_decode_wav_bytes() {
        let pcm: Vec<i16> = (0..256).map(|i| (i * 64) as i16).collect();
        let bytes = make_wav(&pcm);

        let source = decode_bytes(bytes, Some("wav")).unwrap();
        assert_eq!(source.duration_samples(), 256);
        assert_eq!(source.source_channels(), 1);

        // 16-bit quantization: one LSB of slack
        let expected = pcm[100] as f32 / 32768.0;
        assert!((source.samples()[100].left - expected).abs() < 1.0 / 16384.0);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_bytes(vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x01], None);
        assert!(err.is_err());
    }
}
