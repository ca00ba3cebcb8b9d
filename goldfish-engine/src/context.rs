//! The audio context: sample clock, power state and the shared render graph.
//!
//! An `AudioContext` is a cheap handle (`Arc` inside). The engine keeps one,
//! the ticker thread keeps a clone for scheduling, and the device callback
//! keeps another for rendering. The clock is a frame counter that only moves
//! when frames are actually rendered while the context is running, so
//! everything scheduled against `current_time()` stays sample-accurate no
//! matter how late a timer fires.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use goldfish_core::dsp::frame_to_time;

use crate::error::AudioResult;
use crate::graph::{Graph, GraphConfig, SourceId, VoiceSpec};

/// Power state of the context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContextState {
    /// Clock frozen, output silent. Every context starts here.
    Suspended,
    Running,
}

impl ContextState {
    fn from_u8(v: u8) -> Self {
        if v == 1 { ContextState::Running } else { ContextState::Suspended }
    }

    fn as_u8(self) -> u8 {
        match self {
            ContextState::Suspended => 0,
            ContextState::Running => 1,
        }
    }
}

struct Shared {
    sample_rate: f32,
    frames: AtomicU64,
    state: AtomicU8,
    graph: Mutex<Graph>,
}

/// Shared handle to the clock and render graph.
#[derive(Clone)]
pub struct AudioContext {
    inner: Arc<Shared>,
}

impl core::fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AudioContext")
            .field("sample_rate", &self.inner.sample_rate)
            .field("state", &self.state())
            .field("time", &self.current_time())
            .finish()
    }
}

impl AudioContext {
    /// Build a suspended context with its permanent graph.
    pub fn new(sample_rate: f32, cfg: GraphConfig) -> Self {
        let sample_rate = sample_rate.max(1.0);
        Self {
            inner: Arc::new(Shared {
                sample_rate,
                frames: AtomicU64::new(0),
                state: AtomicU8::new(ContextState::Suspended.as_u8()),
                graph: Mutex::new(Graph::new(sample_rate, cfg)),
            }),
        }
    }

    /// `true` when both handles refer to the same context.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.inner.sample_rate }

    #[inline]
    pub fn current_frame(&self) -> u64 {
        self.inner.frames.load(Ordering::Acquire)
    }

    /// Audio-clock time in seconds.
    #[inline]
    pub fn current_time(&self) -> f64 {
        frame_to_time(self.current_frame(), self.inner.sample_rate)
    }

    #[inline]
    pub fn state(&self) -> ContextState {
        ContextState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn resume(&self) {
        self.inner.state.store(ContextState::Running.as_u8(), Ordering::Release);
    }

    /// Fill an interleaved buffer and advance the clock. Silent, and the
    /// clock does not move, while suspended.
    pub fn render(&self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        if self.state() != ContextState::Running {
            out.fill(0.0);
            return;
        }
        let frames = (out.len() / channels) as u64;
        let mut graph = self.inner.graph.lock();
        let first = self.current_frame();
        graph.render(first, out, channels);
        self.inner.frames.fetch_add(frames, Ordering::AcqRel);
    }

    /// Offline convenience: render `frames` stereo frames and return them interleaved.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        self.render(&mut out, 2);
        out
    }

    /// Hand a voice to the graph.
    pub fn play(&self, spec: VoiceSpec) -> SourceId {
        self.inner.graph.lock().add(spec)
    }

    /// Stop a voice now.
    pub fn stop(&self, id: SourceId) -> AudioResult<()> {
        let frame = self.current_frame();
        self.inner.graph.lock().stop(id, frame)
    }

    pub fn is_active(&self, id: SourceId) -> bool {
        self.inner.graph.lock().is_active(id, self.current_frame())
    }

    pub fn active_looping_sources(&self) -> usize {
        self.inner.graph.lock().active_looping(self.current_frame())
    }

    pub fn voice_count(&self) -> usize {
        self.inner.graph.lock().voice_count()
    }

    pub fn bgm_level(&self) -> f32 {
        self.inner.graph.lock().bgm_level()
    }

    pub fn has_reverb(&self) -> bool {
        self.inner.graph.lock().has_reverb()
    }

    /// Glide the master gain towards `target` starting now.
    pub fn ramp_master_gain(&self, target: f32, tau: f64) {
        let now = self.current_time();
        let mut graph = self.inner.graph.lock();
        graph
            .master_gain_mut()
            .cancel_and_hold_at_time(now)
            .set_target_at_time(target, now, tau);
    }

    pub fn master_gain_at(&self, t: f64) -> f32 {
        self.inner.graph.lock().master_gain().value_at(t)
    }
}
