//! Noise buffer generators.
//!
//! Buffers are filled once and then played back by buffer sources, so these
//! allocate; nothing here runs on the audio callback.

use rand::Rng;

/// Feedback divisor of the rumble integrator: `y = (y + k w) / (1 + k)`.
pub const RUMBLE_LEAK: f32 = 0.02;

/// Makeup gain applied after the rumble integrator.
pub const RUMBLE_MAKEUP: f32 = 3.5;

/// Uniform white noise in [-1, 1).
pub fn white_noise<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Dark, slowly wandering noise: white noise through a leaky integrator,
/// then amplified. Output stays within ±`makeup`.
pub fn rumble_noise<R: Rng + ?Sized>(rng: &mut R, len: usize, leak: f32, makeup: f32) -> Vec<f32> {
    let mut last = 0.0_f32;
    (0..len)
        .map(|_| {
            let white: f32 = rng.gen_range(-1.0..1.0);
            last = (last + leak * white) / (1.0 + leak);
            last * makeup
        })
        .collect()
}
