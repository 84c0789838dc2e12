//! Convolution reverb with a synthetic impulse response
//!
//! Uniform partitioned convolution in the frequency domain: the impulse
//! response is split into fixed-size partitions whose spectra are multiplied
//! against a frequency-domain delay line of recent input blocks. This keeps
//! the per-sample cost flat regardless of impulse length, at the price of
//! one partition of latency.
//!
//! The impulse is not sampled from a room: it is stereo noise shaped by a
//! polynomial decay, generated once per chain at construction.

use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::types::{Sample, StereoBuffer, StereoSample};

/// Impulse response length in seconds
const IMPULSE_SECONDS: f32 = 1.6;

/// Impulse decay exponent: sample i is scaled by `(1 - i/N)^DECAY`
const IMPULSE_DECAY: f32 = 2.0;

/// Partition (input block) size; the FFT size is twice this
const PARTITION_SIZE: usize = 1024;

/// Streaming partitioned convolver, stereo in / stereo out
pub struct ConvolutionReverb {
    partition: usize,
    fft: Arc<dyn Fft<Sample>>,
    ifft: Arc<dyn Fft<Sample>>,
    /// Per-partition impulse spectra
    ir_l: Vec<Vec<Complex<Sample>>>,
    ir_r: Vec<Vec<Complex<Sample>>>,
    /// Frequency-domain delay line of recent input block spectra
    fdl_l: Vec<Vec<Complex<Sample>>>,
    fdl_r: Vec<Vec<Complex<Sample>>>,
    fdl_pos: usize,
    /// Input samples accumulated toward the next partition
    pending_l: Vec<Sample>,
    pending_r: Vec<Sample>,
    /// Overlap-add tails from the previous inverse transform
    overlap_l: Vec<Sample>,
    overlap_r: Vec<Sample>,
    /// Completed output frames not yet consumed
    out_queue: VecDeque<StereoSample>,
    // Scratch space reused across partitions
    time: Vec<Complex<Sample>>,
    acc: Vec<Complex<Sample>>,
    block_l: Vec<Sample>,
    block_r: Vec<Sample>,
}

impl ConvolutionReverb {
    /// Create a reverb with the synthetic noise impulse
    pub fn new(sample_rate: u32) -> Self {
        let (left, right) = synthesize_impulse(sample_rate);
        Self::with_impulse(left, right)
    }

    /// Create a convolver from an explicit stereo impulse response
    ///
    /// The shorter channel is zero-padded to the longer one.
    pub fn with_impulse(mut left: Vec<Sample>, mut right: Vec<Sample>) -> Self {
        let ir_len = left.len().max(right.len()).max(1);
        left.resize(ir_len, 0.0);
        right.resize(ir_len, 0.0);

        let partition = PARTITION_SIZE;
        let fft_size = partition * 2;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);

        let ir_l = partition_spectra(fft.as_ref(), &left, partition, fft_size);
        let ir_r = partition_spectra(fft.as_ref(), &right, partition, fft_size);
        let num_parts = ir_l.len();

        let mut out_queue = VecDeque::with_capacity(partition * 2);
        out_queue.extend(std::iter::repeat(StereoSample::silence()).take(partition));

        Self {
            partition,
            fft,
            ifft,
            ir_l,
            ir_r,
            fdl_l: vec![vec![Complex::new(0.0, 0.0); fft_size]; num_parts],
            fdl_r: vec![vec![Complex::new(0.0, 0.0); fft_size]; num_parts],
            fdl_pos: 0,
            pending_l: Vec::with_capacity(partition),
            pending_r: Vec::with_capacity(partition),
            overlap_l: vec![0.0; partition],
            overlap_r: vec![0.0; partition],
            out_queue,
            time: vec![Complex::new(0.0, 0.0); fft_size],
            acc: vec![Complex::new(0.0, 0.0); fft_size],
            block_l: vec![0.0; partition],
            block_r: vec![0.0; partition],
        }
    }

    /// Processing latency in samples (one partition)
    pub fn latency_samples(&self) -> usize {
        self.partition
    }

    /// Convolve an input block, writing the same number of frames to `output`
    pub fn process(&mut self, input: &StereoBuffer, output: &mut StereoBuffer) {
        output.resize(input.len());
        for (i, s) in input.iter().enumerate() {
            self.pending_l.push(s.left);
            self.pending_r.push(s.right);
            if self.pending_l.len() == self.partition {
                self.run_partition();
            }
            output[i] = self.out_queue.pop_front().unwrap_or_else(StereoSample::silence);
        }
    }

    /// Clear all streaming state (delay line, overlap tails, queued output)
    pub fn reset(&mut self) {
        for slot in self.fdl_l.iter_mut().chain(self.fdl_r.iter_mut()) {
            slot.fill(Complex::new(0.0, 0.0));
        }
        self.fdl_pos = 0;
        self.pending_l.clear();
        self.pending_r.clear();
        self.overlap_l.fill(0.0);
        self.overlap_r.fill(0.0);
        self.out_queue.clear();
        self.out_queue
            .extend(std::iter::repeat(StereoSample::silence()).take(self.partition));
    }

    /// Run one partition step: transform the pending block, multiply against
    /// the impulse partitions, and queue a partition of output frames.
    fn run_partition(&mut self) {
        convolve_channel(
            self.fft.as_ref(),
            self.ifft.as_ref(),
            &self.pending_l,
            &mut self.fdl_l,
            self.fdl_pos,
            &self.ir_l,
            &mut self.overlap_l,
            &mut self.time,
            &mut self.acc,
            &mut self.block_l,
        );
        convolve_channel(
            self.fft.as_ref(),
            self.ifft.as_ref(),
            &self.pending_r,
            &mut self.fdl_r,
            self.fdl_pos,
            &self.ir_r,
            &mut self.overlap_r,
            &mut self.time,
            &mut self.acc,
            &mut self.block_r,
        );

        for i in 0..self.partition {
            self.out_queue
                .push_back(StereoSample::new(self.block_l[i], self.block_r[i]));
        }

        self.pending_l.clear();
        self.pending_r.clear();
        self.fdl_pos = (self.fdl_pos + 1) % self.fdl_l.len();
    }
}

impl std::fmt::Debug for ConvolutionReverb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvolutionReverb")
            .field("partition", &self.partition)
            .field("partitions", &self.ir_l.len())
            .finish()
    }
}

/// Split an impulse response into zero-padded partition spectra
fn partition_spectra(
    fft: &dyn Fft<Sample>,
    impulse: &[Sample],
    partition: usize,
    fft_size: usize,
) -> Vec<Vec<Complex<Sample>>> {
    impulse
        .chunks(partition)
        .map(|chunk| {
            let mut buf = vec![Complex::new(0.0, 0.0); fft_size];
            for (i, &v) in chunk.iter().enumerate() {
                buf[i] = Complex::new(v, 0.0);
            }
            fft.process(&mut buf);
            buf
        })
        .collect()
}

/// One channel of a partition step (overlap-add)
#[allow(clippy::too_many_arguments)]
fn convolve_channel(
    fft: &dyn Fft<Sample>,
    ifft: &dyn Fft<Sample>,
    block: &[Sample],
    fdl: &mut [Vec<Complex<Sample>>],
    pos: usize,
    ir: &[Vec<Complex<Sample>>],
    overlap: &mut [Sample],
    time: &mut [Complex<Sample>],
    acc: &mut [Complex<Sample>],
    out: &mut [Sample],
) {
    let fft_size = time.len();
    let partition = block.len();

    for (i, c) in time.iter_mut().enumerate() {
        *c = if i < partition {
            Complex::new(block[i], 0.0)
        } else {
            Complex::new(0.0, 0.0)
        };
    }
    fft.process(time);
    fdl[pos].copy_from_slice(time);

    acc.fill(Complex::new(0.0, 0.0));
    let parts = ir.len();
    for (k, h) in ir.iter().enumerate() {
        let slot = (pos + parts - k) % parts;
        let x = &fdl[slot];
        for bin in 0..fft_size {
            acc[bin] += x[bin] * h[bin];
        }
    }
    ifft.process(acc);

    let norm = 1.0 / fft_size as Sample;
    for i in 0..partition {
        out[i] = acc[i].re * norm + overlap[i];
        overlap[i] = acc[partition + i].re * norm;
    }
}

/// Generate the stereo noise impulse: uncorrelated noise per channel, shaped
/// by `(1 - i/N)^decay`, power-normalized so a wet level of 1.0 lands near
/// unit loudness.
fn synthesize_impulse(sample_rate: u32) -> (Vec<Sample>, Vec<Sample>) {
    let len = ((sample_rate as f32 * IMPULSE_SECONDS) as usize).max(1);
    let mut rng = fastrand::Rng::new();

    let mut left = Vec::with_capacity(len);
    let mut right = Vec::with_capacity(len);
    for i in 0..len {
        let w = (1.0 - i as f32 / len as f32).powf(IMPULSE_DECAY);
        left.push((rng.f32() * 2.0 - 1.0) * w);
        right.push((rng.f32() * 2.0 - 1.0) * w);
    }

    let energy: f32 =
        left.iter().zip(&right).map(|(l, r)| l * l + r * r).sum::<f32>() / 2.0;
    if energy > 0.0 {
        let scale = 1.0 / energy.sqrt();
        for v in left.iter_mut().chain(right.iter_mut()) {
            *v *= scale;
        }
    }

    (left, right)
}
