//! Source nodes: the sound generators at the head of every voice.
//!
//! Contents:
//! - `Wave`, `Osc`    : oscillator with an automated frequency (Sine/Tri/Saw)
//! - `BufferSource`   : plays a shared sample buffer once or in a loop
//! - `SourceNode`     : the closed set of sources a voice can own
//!
//! Notes:
//! - Frequency is **Hz** and comes from a [`ParamTimeline`] so sweeps can be
//!   written ahead of time against the audio clock.
//! - Oscillators are naive (not band-limited); fine for short sine blips and
//!   the occasional sawtooth buzzer.

use std::sync::Arc;

use goldfish_core::dsp::{fast_sin, wrap_phase01, TAU};
use goldfish_core::envelopes::ParamTimeline;

use crate::graph::Generator;

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wave { Sine, Triangle, Sawtooth }

#[inline]
fn osc_sample(phase01: f32, wave: Wave) -> f32 {
    match wave {
        Wave::Sine     => fast_sin(TAU * phase01),
        Wave::Triangle => 1.0 - 4.0 * (phase01 - 0.5).abs(),
        Wave::Sawtooth => 2.0 * phase01 - 1.0,
    }
}

/// Free-running oscillator whose frequency follows an automation timeline.
#[derive(Clone, Debug)]
pub struct Osc {
    phase: f32, // [0,1)
    wave:  Wave,
    freq:  ParamTimeline,
}

impl Osc {
    #[inline]
    pub fn new(wave: Wave, freq: ParamTimeline) -> Self { Self { phase: 0.0, wave, freq } }

    /// Fixed-pitch oscillator.
    #[inline]
    pub fn fixed(wave: Wave, hz: f32) -> Self { Self::new(wave, ParamTimeline::new(hz)) }

    #[inline] pub fn wave(&self) -> Wave { self.wave }
    #[inline] pub fn frequency(&self) -> &ParamTimeline { &self.freq }
}

impl Generator for Osc {
    #[inline]
    fn next(&mut self, t: f64, sr: f32) -> Option<f32> {
        let s = osc_sample(self.phase, self.wave);
        let hz = self.freq.value_at(t).max(0.0);
        self.phase = wrap_phase01(self.phase + hz / sr);
        Some(s)
    }
}

/// Plays a shared, immutable buffer. Non-looping sources end after the last sample.
#[derive(Clone, Debug)]
pub struct BufferSource {
    data: Arc<[f32]>,
    pos: usize,
    looping: bool,
}

impl BufferSource {
    #[inline]
    pub fn new(data: Arc<[f32]>, looping: bool) -> Self { Self { data, pos: 0, looping } }

    #[inline] pub fn len(&self) -> usize { self.data.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.data.is_empty() }
    #[inline] pub fn is_looping(&self) -> bool { self.looping }
}

impl Generator for BufferSource {
    #[inline]
    fn next(&mut self, _t: f64, _sr: f32) -> Option<f32> {
        if self.pos >= self.data.len() {
            if !self.looping || self.data.is_empty() {
                return None;
            }
            self.pos = 0;
        }
        let s = self.data[self.pos];
        self.pos += 1;
        Some(s)
    }
}

/// The sources a voice can be built around.
#[derive(Clone, Debug)]
pub enum SourceNode {
    Osc(Osc),
    Buffer(BufferSource),
}

impl SourceNode {
    /// Looping sources only end when stopped explicitly.
    #[inline]
    pub fn is_looping(&self) -> bool {
        matches!(self, SourceNode::Buffer(b) if b.is_looping())
    }
}

impl Generator for SourceNode {
    #[inline]
    fn next(&mut self, t: f64, sr: f32) -> Option<f32> {
        match self {
            SourceNode::Osc(o) => o.next(t, sr),
            SourceNode::Buffer(b) => b.next(t, sr),
        }
    }
}
