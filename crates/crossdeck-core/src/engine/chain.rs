//! Per-deck signal chain
//!
//! Fixed routing, built once with the deck and never restructured:
//!
//! ```text
//! source ─► lowpass ─┬────────────────────────────────┐
//!                    ├► delay ─► feedback loop ─► echo wet ─┤
//!                    └► convolver ─► reverb wet ──────┤
//!                                              sum ─► deck gain ─► master
//! ```
//!
//! The chain exposes four normalized controls: filter position, echo wet,
//! reverb wet, and linear gain. Echo delay time and feedback amount are
//! fixed; only the wet mix is a performance control.

use crate::types::{StereoBuffer, StereoSample};

use super::convolver::ConvolutionReverb;

/// Filter sweep endpoints in Hz
pub const FILTER_MIN_HZ: f32 = 120.0;
pub const FILTER_MAX_HZ: f32 = 20_000.0;

/// Echo delay line length in seconds
const ECHO_DELAY_SECONDS: f32 = 0.22;

/// Echo feedback coefficient
const ECHO_FEEDBACK: f32 = 0.35;

/// Map a normalized filter position to a cutoff frequency
///
/// Exponential sweep: v=0 is 120 Hz, v=1 is 20 kHz, strictly increasing in
/// between with no endpoint discontinuity.
pub fn filter_frequency(v: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    FILTER_MIN_HZ * (FILTER_MAX_HZ / FILTER_MIN_HZ).powf(v)
}

/// Biquad filter coefficients (RBJ lowpass)
#[derive(Debug, Clone)]
struct BiquadCoeffs {
    b0: f32, b1: f32, b2: f32,
    a1: f32, a2: f32,
}

impl BiquadCoeffs {
    /// Two-pole lowpass at the given cutoff (Butterworth Q)
    fn lowpass(freq: f32, sample_rate: f32) -> Self {
        let q = std::f32::consts::FRAC_1_SQRT_2;
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 - cos_w0) / 2.0) / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: ((1.0 - cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Biquad filter state for both channels
#[derive(Debug, Clone, Default)]
struct BiquadState {
    x1_l: f32, x2_l: f32, y1_l: f32, y2_l: f32,
    x1_r: f32, x2_r: f32, y1_r: f32, y2_r: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input_l: f32, input_r: f32, coeffs: &BiquadCoeffs) -> (f32, f32) {
        let out_l = coeffs.b0 * input_l + coeffs.b1 * self.x1_l + coeffs.b2 * self.x2_l
                  - coeffs.a1 * self.y1_l - coeffs.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input_l;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        let out_r = coeffs.b0 * input_r + coeffs.b1 * self.x1_r + coeffs.b2 * self.x2_r
                  - coeffs.a1 * self.y1_r - coeffs.a2 * self.y2_r;
        self.x2_r = self.x1_r;
        self.x1_r = input_r;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        (out_l, out_r)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Stereo delay line with a fixed feedback loop
///
/// The loop input is the filtered signal plus the fed-back delayed signal;
/// the output is the raw delayed signal, scaled by the wet control at the
/// mix point (not here).
struct FeedbackDelay {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
    feedback: f32,
}

impl FeedbackDelay {
    fn new(delay_seconds: f32, feedback: f32, sample_rate: u32) -> Self {
        let delay_samples = ((sample_rate as f32 * delay_seconds) as usize).max(1);
        Self {
            buffer_l: vec![0.0; delay_samples + 1],
            buffer_r: vec![0.0; delay_samples + 1],
            write_pos: 0,
            delay_samples,
            feedback,
        }
    }

    /// Push one input sample, returning the delayed output
    #[inline]
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let len = self.buffer_l.len();
        let read_pos = if self.write_pos >= self.delay_samples {
            self.write_pos - self.delay_samples
        } else {
            len - (self.delay_samples - self.write_pos)
        };
        let delayed_l = self.buffer_l[read_pos];
        let delayed_r = self.buffer_r[read_pos];

        self.buffer_l[self.write_pos] = left + delayed_l * self.feedback;
        self.buffer_r[self.write_pos] = right + delayed_r * self.feedback;
        self.write_pos = (self.write_pos + 1) % len;

        (delayed_l, delayed_r)
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

/// One-tap effect preset: a (filter, echo, reverb) triple applied atomically
#[derive(Debug, Clone, Copy)]
pub struct FxPreset {
    pub name: &'static str,
    pub filter: f32,
    pub echo: f32,
    pub reverb: f32,
}

/// The built-in preset bank, one per pad
pub const FX_PRESETS: [FxPreset; 8] = [
    FxPreset { name: "AIR",   filter: 0.85, echo: 0.0,  reverb: 0.0 },
    FxPreset { name: "SUB",   filter: 0.18, echo: 0.0,  reverb: 0.0 },
    FxPreset { name: "ECHO",  filter: 0.55, echo: 0.65, reverb: 0.0 },
    FxPreset { name: "HALL",  filter: 0.70, echo: 0.0,  reverb: 0.65 },
    FxPreset { name: "SWEEP", filter: 0.92, echo: 0.18, reverb: 0.05 },
    FxPreset { name: "WARM",  filter: 0.62, echo: 0.0,  reverb: 0.18 },
    FxPreset { name: "SPACE", filter: 0.72, echo: 0.22, reverb: 0.78 },
    FxPreset { name: "CUT",   filter: 0.10, echo: 0.0,  reverb: 0.0 },
];

/// Per-deck routing and controls
pub struct SignalChain {
    sample_rate: f32,
    filter_coeffs: BiquadCoeffs,
    filter_state: BiquadState,
    filter_norm: f32,
    echo: FeedbackDelay,
    echo_wet: f32,
    reverb: ConvolutionReverb,
    reverb_wet: f32,
    gain: f32,
    /// Filtered block feeding the echo and reverb sends
    send: StereoBuffer,
    /// Reverb output block
    wet: StereoBuffer,
}

impl SignalChain {
    /// Build the chain: filter open, wets at zero, unity gain
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            filter_coeffs: BiquadCoeffs::lowpass(FILTER_MAX_HZ, sample_rate as f32),
            filter_state: BiquadState::default(),
            filter_norm: 1.0,
            echo: FeedbackDelay::new(ECHO_DELAY_SECONDS, ECHO_FEEDBACK, sample_rate),
            echo_wet: 0.0,
            reverb: ConvolutionReverb::new(sample_rate),
            reverb_wet: 0.0,
            gain: 1.0,
            send: StereoBuffer::default(),
            wet: StereoBuffer::default(),
        }
    }

    /// Set the filter position (0.0 = 120 Hz, 1.0 = 20 kHz)
    pub fn set_filter_norm(&mut self, v: f32) {
        self.filter_norm = v.clamp(0.0, 1.0);
        self.filter_coeffs =
            BiquadCoeffs::lowpass(filter_frequency(self.filter_norm), self.sample_rate);
    }

    /// Current normalized filter position
    pub fn filter_norm(&self) -> f32 {
        self.filter_norm
    }

    /// Current cutoff frequency in Hz
    pub fn filter_hz(&self) -> f32 {
        filter_frequency(self.filter_norm)
    }

    /// Set the echo wet level (clamped to [0, 1])
    pub fn set_echo_wet(&mut self, v: f32) {
        self.echo_wet = v.clamp(0.0, 1.0);
    }

    /// Current echo wet level
    pub fn echo_wet(&self) -> f32 {
        self.echo_wet
    }

    /// Set the reverb wet level (clamped to [0, 1])
    pub fn set_reverb_wet(&mut self, v: f32) {
        self.reverb_wet = v.clamp(0.0, 1.0);
    }

    /// Current reverb wet level
    pub fn reverb_wet(&self) -> f32 {
        self.reverb_wet
    }

    /// Set the deck output gain (linear, >= 0)
    pub fn set_gain(&mut self, v: f32) {
        self.gain = v.max(0.0);
    }

    /// Current deck output gain
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Apply a one-tap preset to all three effect controls
    pub fn apply_preset(&mut self, preset: &FxPreset) {
        self.set_filter_norm(preset.filter);
        self.set_echo_wet(preset.echo);
        self.set_reverb_wet(preset.reverb);
    }

    /// Return the controls to neutral (filter open, wets at zero)
    pub fn reset_controls(&mut self) {
        self.set_filter_norm(1.0);
        self.set_echo_wet(0.0);
        self.set_reverb_wet(0.0);
    }

    /// Clear time-varying state (filter memory, delay line, reverb tail)
    /// without touching the control values
    pub fn reset(&mut self) {
        self.filter_state.reset();
        self.echo.reset();
        self.reverb.reset();
    }

    /// Process one block in place
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        let len = buffer.len();

        for sample in buffer.iter_mut() {
            let (l, r) = self
                .filter_state
                .process(sample.left, sample.right, &self.filter_coeffs);
            *sample = StereoSample::new(l, r);
        }

        // Both effect sends tap the filtered signal
        self.send.resize(len);
        self.send.as_mut_slice().copy_from_slice(buffer.as_slice());

        // The delay loop always runs so its tail keeps ringing when the wet
        // level changes mid-stream; the wet control only scales the tap
        for i in 0..len {
            let s = self.send[i];
            let (dl, dr) = self.echo.process(s.left, s.right);
            buffer[i] += StereoSample::new(dl * self.echo_wet, dr * self.echo_wet);
        }

        self.reverb.process(&self.send, &mut self.wet);
        for i in 0..len {
            buffer[i] += self.wet[i] * self.reverb_wet;
        }

        buffer.scale(self.gain);
    }
}

impl std::fmt::Debug for SignalChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalChain")
            .field("filter_norm", &self.filter_norm)
            .field("echo_wet", &self.echo_wet)
            .field("reverb_wet", &self.reverb_wet)
            .field("gain", &self.gain)
            .finish()
    }
}
