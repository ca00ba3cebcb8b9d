//! Impulse-response reverb.
//!
//! Design
//! - The room is a synthetic impulse: stereo uniform noise under a
//!   `(1 - n)^decay` envelope, generated once per context.
//! - `Convolver` runs it as a uniformly partitioned FFT convolution
//!   (overlap-save with a frequency-domain delay line), one partition of latency.
//! - The kernel is normalised the way browser convolvers do it so that a
//!   long, loud noise tail does not blow up the send.
//!
//! Runs fully silent blocks through a cheap path once the tail has drained, so
//! an idle reverb costs next to nothing.

use std::sync::Arc;

use rand::Rng;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Partition length (samples) of the FFT convolver.
pub const DEFAULT_PARTITION: usize = 512;

const GAIN_CALIBRATION: f32 = 0.00125; // -58 dB
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44_100.0;
const MIN_POWER: f32 = 0.000125;

/// Immutable two-channel impulse response.
#[derive(Clone, Debug)]
pub struct ImpulseResponse {
    sample_rate: f32,
    channels: [Vec<f32>; 2],
}

impl ImpulseResponse {
    pub fn from_channels(sample_rate: f32, left: Vec<f32>, right: Vec<f32>) -> Self {
        Self { sample_rate, channels: [left, right] }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sample_rate }
    /// Frames per channel.
    #[inline] pub fn len(&self) -> usize { self.channels[0].len() }
    #[inline] pub fn is_empty(&self) -> bool { self.len() == 0 }
    #[inline] pub fn channel(&self, ch: usize) -> &[f32] { &self.channels[ch] }

    /// Scale that brings the kernel to a calibrated loudness.
    pub fn normalization_scale(&self) -> f32 {
        let n = (self.channels[0].len() + self.channels[1].len()).max(1);
        let energy: f32 = self.channels.iter().flatten().map(|s| s * s).sum();
        let mut power = (energy / n as f32).sqrt();
        if !power.is_finite() || power < MIN_POWER {
            power = MIN_POWER;
        }
        (1.0 / power) * GAIN_CALIBRATION * (GAIN_CALIBRATION_SAMPLE_RATE / self.sample_rate)
    }
}

/// Exponentially decaying stereo noise burst of `sample_rate * duration` frames.
///
/// Each channel draws its own noise; sample `i` is `U(-1, 1) * (1 - i/len)^decay`.
pub fn create_impulse_response<R: Rng + ?Sized>(
    sample_rate: f32,
    duration: f64,
    decay: f64,
    rng: &mut R,
) -> ImpulseResponse {
    let len = (f64::from(sample_rate) * duration.max(0.0)) as usize;
    let make = |rng: &mut R| -> Vec<f32> {
        (0..len)
            .map(|i| {
                let n = i as f64 / len as f64;
                let env = (1.0 - n).powf(decay) as f32;
                rng.gen_range(-1.0_f32..1.0) * env
            })
            .collect()
    };
    let left = make(rng);
    let right = make(rng);
    ImpulseResponse::from_channels(sample_rate, left, right)
}

/// Uniformly partitioned overlap-save convolver: mono in, stereo out.
pub struct Convolver {
    block: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Kernel spectra, `[channel][partition]`, each `2 * block` bins.
    kernel: [Vec<Vec<Complex<f32>>>; 2],
    /// Spectra of the most recent input frames (frequency-domain delay line).
    fdl: Vec<Vec<Complex<f32>>>,
    fdl_pos: usize,
    /// Previous block followed by the block being filled.
    input: Vec<f32>,
    fill: usize,
    out: [Vec<f32>; 2],
    acc: Vec<Complex<f32>>,
    silent_blocks: usize,
}

impl Convolver {
    pub fn new(ir: &ImpulseResponse) -> Self {
        Self::with_partition(ir, DEFAULT_PARTITION)
    }

    pub fn with_partition(ir: &ImpulseResponse, block: usize) -> Self {
        let block = block.max(1);
        let size = 2 * block;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);

        let scale = ir.normalization_scale();
        let parts = ir.len().div_ceil(block).max(1);
        let kernel = [0, 1].map(|ch| {
            let taps = ir.channel(ch);
            (0..parts)
                .map(|p| {
                    let mut buf = vec![Complex::new(0.0, 0.0); size];
                    let lo = (p * block).min(taps.len());
                    let hi = ((p + 1) * block).min(taps.len());
                    for (dst, &s) in buf.iter_mut().zip(&taps[lo..hi]) {
                        dst.re = s * scale;
                    }
                    fft.process(&mut buf);
                    buf
                })
                .collect::<Vec<_>>()
        });

        Self {
            block,
            fft,
            ifft,
            kernel,
            fdl: vec![vec![Complex::new(0.0, 0.0); size]; parts],
            fdl_pos: 0,
            input: vec![0.0; size],
            fill: 0,
            out: [vec![0.0; block], vec![0.0; block]],
            acc: vec![Complex::new(0.0, 0.0); size],
            silent_blocks: 0,
        }
    }

    #[inline] pub fn partitions(&self) -> usize { self.fdl.len() }

    /// Convolve `input` into `out_l`/`out_r` (overwritten). Lengths must match.
    pub fn process(&mut self, input: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        for ((&x, l), r) in input.iter().zip(out_l.iter_mut()).zip(out_r.iter_mut()) {
            *l = self.out[0][self.fill];
            *r = self.out[1][self.fill];
            self.input[self.block + self.fill] = x;
            self.fill += 1;
            if self.fill == self.block {
                self.run_block();
                self.fill = 0;
            }
        }
    }

    fn run_block(&mut self) {
        let b = self.block;
        let parts = self.fdl.len();

        if self.input.iter().all(|&s| s == 0.0) {
            self.silent_blocks += 1;
        } else {
            self.silent_blocks = 0;
        }

        // Every slot of the delay line already holds a zero spectrum.
        if self.silent_blocks > parts + 1 {
            self.out[0].fill(0.0);
            self.out[1].fill(0.0);
            self.input.copy_within(b.., 0);
            return;
        }

        let slot = &mut self.fdl[self.fdl_pos];
        for (dst, &s) in slot.iter_mut().zip(&self.input) {
            *dst = Complex::new(s, 0.0);
        }
        self.fft.process(slot);

        let norm = 1.0 / (2 * b) as f32;
        for ch in 0..2 {
            self.acc.fill(Complex::new(0.0, 0.0));
            for (k, h) in self.kernel[ch].iter().enumerate() {
                let x = &self.fdl[(self.fdl_pos + parts - k) % parts];
                for ((a, &xv), &hv) in self.acc.iter_mut().zip(x).zip(h) {
                    *a += xv * hv;
                }
            }
            self.ifft.process(&mut self.acc);
            for (o, a) in self.out[ch].iter_mut().zip(&self.acc[b..]) {
                *o = a.re * norm;
            }
        }

        self.input.copy_within(b.., 0);
        self.fdl_pos = (self.fdl_pos + 1) % parts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn impulse_has_expected_length() {
        let mut rng = SmallRng::seed_from_u64(1);
        let ir = create_impulse_response(8_000.0, 2.0, 2.0, &mut rng);
        assert_eq!(ir.len(), 16_000);
        assert_eq!(ir.channel(0).len(), 16_000);
        assert_eq!(ir.channel(1).len(), 16_000);
        assert!(ir.channel(0).iter().all(|s| s.abs() <= 1.0));
        assert_ne!(ir.channel(0), ir.channel(1));
    }

    #[test]
    fn impulse_envelope_decays() {
        let mut rng = SmallRng::seed_from_u64(2);
        let ir = create_impulse_response(48_000.0, 2.0, 2.0, &mut rng);
        let seg = ir.len() / 10;
        for ch in 0..2 {
            let means: Vec<f32> = ir
                .channel(ch)
                .chunks(seg)
                .map(|c| c.iter().map(|s| s.abs()).sum::<f32>() / c.len() as f32)
                .collect();
            // E|x| = 0.5 * (1 - n)^2 for uniform noise; first segment sits near 0.45.
            assert!(means[0] > 0.35 && means[0] < 0.5, "means[0]={}", means[0]);
            for w in means.windows(2) {
                assert!(w[1] < w[0], "envelope not decaying: {means:?}");
            }
            assert!(*means.last().unwrap() < 0.01);
        }
    }

    #[test]
    fn zero_duration_gives_empty_response() {
        let mut rng = SmallRng::seed_from_u64(3);
        let ir = create_impulse_response(48_000.0, 0.0, 2.0, &mut rng);
        assert!(ir.is_empty());
        // Normalisation stays finite on silence.
        assert!(ir.normalization_scale().is_finite());
    }

    #[test]
    fn matches_direct_convolution() {
        let mut rng = SmallRng::seed_from_u64(4);
        let ir = create_impulse_response(1_000.0, 0.3, 1.0, &mut rng);
        let scale = ir.normalization_scale();
        let block = 32;
        let mut conv = Convolver::with_partition(&ir, block);
        assert_eq!(conv.partitions(), 300_usize.div_ceil(block));

        let input: Vec<f32> = (0..700).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        conv.process(&input, &mut l, &mut r);

        for n in block..input.len() {
            let m = n - block;
            let mut expect = [0.0_f32; 2];
            for ch in 0..2 {
                let h = ir.channel(ch);
                for k in 0..=m.min(h.len() - 1) {
                    expect[ch] += input[m - k] * h[k] * scale;
                }
            }
            assert!((l[n] - expect[0]).abs() < 1e-3, "n={n} l={} expect={}", l[n], expect[0]);
            assert!((r[n] - expect[1]).abs() < 1e-3, "n={n} r={} expect={}", r[n], expect[1]);
        }
    }

    #[test]
    fn drains_to_silence() {
        let mut rng = SmallRng::seed_from_u64(5);
        let ir = create_impulse_response(1_000.0, 0.2, 2.0, &mut rng);
        let mut conv = Convolver::with_partition(&ir, 16);
        let mut input = vec![0.0; 2_000];
        input[0] = 1.0;
        let mut l = vec![0.0; input.len()];
        let mut r = vec![0.0; input.len()];
        conv.process(&input, &mut l, &mut r);
        assert!(l[16..40].iter().any(|s| s.abs() > 0.0));
        assert!(l[1_000..].iter().all(|&s| s == 0.0));
        assert!(r[1_000..].iter().all(|&s| s == 0.0));
    }
}
