//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - Optional `fast-math` approximations for the oscillator hot path
//! - Clean, side-effect free helpers that are easy to test
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Audio-clock time is `f64` seconds; sample values are `f32`.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f32 = 2.0 * PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

// --------------------------------- Utilities -------------------------------------

/// Wrap phase into [0, 1).
#[inline]
pub fn wrap_phase01(p: f32) -> f32 {
    let w = p - p.floor();
    if w >= 1.0 { 0.0 } else { w }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

// --------------------------------- Clock helpers ---------------------------------

/// First frame index whose timestamp is at or after `t` seconds.
///
/// Negative times clamp to frame 0.
#[inline]
pub fn time_to_frame(t: f64, sr: f32) -> u64 {
    if t <= 0.0 { 0 } else { (t * f64::from(sr)).ceil() as u64 }
}

/// Timestamp (seconds) of frame `n`.
#[inline]
pub fn frame_to_time(n: u64, sr: f32) -> f64 {
    n as f64 / f64::from(sr)
}

// --------------------------------- Fast trig -------------------------------------

/// Fast sine with range reduction into [-π, π] and 5th-order minimax-style poly.
/// Max abs error ~1e-3 for musical uses when `fast-math` is enabled; falls back to exact otherwise.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let mut xr = x;
            let k = (xr / TAU).round();
            xr -= k * TAU;

            // 5th-order odd polynomial: sin(x) ≈ x * (a + b x^2 + c x^4)
            let x2 = xr * xr;
            xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
        } else {
            x.sin()
        }
    }
}

// --------------------------------- Filter coefficients ---------------------------

/// TPT (Topology-Preserving Transform) `g = tan(π fc / sr)` helper for state-variable filters.
///
/// The cutoff is clamped just below Nyquist so `g` stays finite.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    let fc = cut_hz.max(0.0).min(0.499 * sr);
    (PI * (fc / sr)).tan()
}

// --------------------------------- Tests -----------------------------------------
