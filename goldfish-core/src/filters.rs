//! Filters: a TPT state-variable filter with selectable output tap.
//!
//! Goals
//! - Allocation free, `Copy`
//! - Stable across the audible range
//! - Clear APIs and predictable parameterization
//!
//! Contents
//! - `SvfMode`    : low-pass / high-pass tap of the SVF
//! - `SvfTpt`     : State-Variable Filter via Topology Preserving Transform
//!
//! Notes
//! - `SvfTpt` uses the “g = tan(π fc / sr)” formulation with `k = 1/Q`,
//!   solved implicitly (trapezoidal integrators), so it stays stable for any
//!   cutoff below Nyquist. With `Q = 1/√2` the low/high-pass taps are
//!   maximally flat, which is what the soundtrack layers use.

use crate::dsp::{kill_denormals, tpt_g};

/// Butterworth quality factor.
pub const Q_BUTTERWORTH: f32 = core::f32::consts::FRAC_1_SQRT_2;

/// SVF output tap selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SvfMode {
    Lowpass,
    Highpass,
}

/// Topology-Preserving Transform SVF (State-Variable Filter).
///
/// Parameters:
/// - `cut_hz`  : cutoff frequency in Hz
/// - `q`       : quality factor (>= ~0.5 typical; lower increases damping)
///
/// Coefficients are fixed at construction; voices never sweep their filter.
#[derive(Copy, Clone, Debug)]
pub struct SvfTpt {
    mode: SvfMode,
    // derived
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    // states
    ic1eq: f32,
    ic2eq: f32,
}

impl SvfTpt {
    #[inline]
    pub fn new(mode: SvfMode, cut_hz: f32, q: f32, sr: f32) -> Self {
        let g = tpt_g(cut_hz.max(0.0), sr.max(1.0)); // tan(π fc / sr)
        let k = 1.0 / q.max(1e-4);
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        Self { mode, k, a1, a2, a3: g * a2, ic1eq: 0.0, ic2eq: 0.0 }
    }

    /// Process one sample, returning the configured tap.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let v3 = x - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;

        self.ic1eq = kill_denormals(2.0 * v1 - self.ic1eq);
        self.ic2eq = kill_denormals(2.0 * v2 - self.ic2eq);

        match self.mode {
            SvfMode::Lowpass => v2,
            SvfMode::Highpass => x - self.k * v1 - v2,
        }
    }
}

// ------------------------------------ Tests --------------------------------------
