//! Render graph core.
//!
//! This module defines the minimal `Generator` trait, the `VoiceSpec` builder
//! synthesizers use to describe a short signal chain, and the `Graph` that
//! owns live voices, the permanent gain stages and the reverb send.
//!
//! Signal flow (fixed):
//!
//! ```text
//! voice ─▶ [filter] ─▶ gain env ─┬─▶ Bus::Bgm ─▶ × bgm_level ─┐
//!                                ├─▶ Bus::Master ────────────┼─▶ × master_gain ─▶ out
//!                                └─▶ (send) ─▶ convolver ─────┘
//! ```
//!
//! Design goals
//! - Voices are created per note, rendered, and dropped once finished
//! - Start/stop are frame-accurate against the absolute frame counter
//! - No allocation while rendering once scratch buffers have grown to the block size

use core::fmt;

use goldfish_core::dsp::{frame_to_time, time_to_frame};
use goldfish_core::envelopes::ParamTimeline;
use goldfish_core::filters::{SvfMode, SvfTpt, Q_BUTTERWORTH};

use crate::error::{AudioError, AudioResult};
use crate::nodes::{SourceNode, Wave, Osc, BufferSource};
use crate::reverb::Convolver;

use std::sync::Arc;

/// Anything that can generate one sample at a time against the audio clock.
pub trait Generator {
    /// Next sample for absolute time `t` (seconds) at sample rate `sr`.
    /// `None` means the generator has run out and its voice can be dropped.
    fn next(&mut self, t: f64, sr: f32) -> Option<f32>;
}

/// Handle to a voice that was handed to the graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mix bus a voice feeds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bus {
    /// Soundtrack sub-mix, scaled by the fixed BGM level.
    Bgm,
    /// Straight into the master stage (one-shot effects).
    Master,
}

/// Description of a voice, built on the control side and handed to the graph.
#[derive(Clone, Debug)]
pub struct VoiceSpec {
    source: SourceNode,
    filter: Option<(SvfMode, f32)>,
    gain: ParamTimeline,
    bus: Bus,
    reverb_send: bool,
    start: f64,
    stop: Option<f64>,
}

impl VoiceSpec {
    pub fn new(source: SourceNode) -> Self {
        Self {
            source,
            filter: None,
            gain: ParamTimeline::new(1.0),
            bus: Bus::Bgm,
            reverb_send: false,
            start: 0.0,
            stop: None,
        }
    }

    pub fn oscillator(wave: Wave, freq: ParamTimeline) -> Self {
        Self::new(SourceNode::Osc(Osc::new(wave, freq)))
    }

    pub fn buffer(data: Arc<[f32]>, looping: bool) -> Self {
        Self::new(SourceNode::Buffer(BufferSource::new(data, looping)))
    }

    /// Insert a maximally flat filter between source and gain.
    pub fn filter(mut self, mode: SvfMode, cutoff_hz: f32) -> Self {
        self.filter = Some((mode, cutoff_hz));
        self
    }

    pub fn gain(mut self, gain: ParamTimeline) -> Self {
        self.gain = gain;
        self
    }

    pub fn route(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }

    /// Also feed the post-gain signal to the reverb.
    pub fn reverb_send(mut self, on: bool) -> Self {
        self.reverb_send = on;
        self
    }

    pub fn start_at(mut self, t: f64) -> Self {
        self.start = t;
        self
    }

    pub fn stop_at(mut self, t: f64) -> Self {
        self.stop = Some(t);
        self
    }

    #[inline] pub fn source(&self) -> &SourceNode { &self.source }
    #[inline] pub fn filter_settings(&self) -> Option<(SvfMode, f32)> { self.filter }
    #[inline] pub fn gain_timeline(&self) -> &ParamTimeline { &self.gain }
    #[inline] pub fn bus(&self) -> Bus { self.bus }
    #[inline] pub fn sends_to_reverb(&self) -> bool { self.reverb_send }
    #[inline] pub fn start_time(&self) -> f64 { self.start }
    #[inline] pub fn stop_time(&self) -> Option<f64> { self.stop }
}

/// Per-block accumulation buffers.
struct BusBuffers<'a> {
    bgm: &'a mut [f32],
    master: &'a mut [f32],
    send: &'a mut [f32],
}

/// A live voice inside the graph.
#[derive(Debug)]
struct Voice {
    id: SourceId,
    source: SourceNode,
    filter: Option<SvfTpt>,
    gain: ParamTimeline,
    bus: Bus,
    reverb_send: bool,
    start_frame: u64,
    stop_frame: Option<u64>,
}

impl Voice {
    fn from_spec(id: SourceId, spec: VoiceSpec, sr: f32) -> Self {
        Self {
            id,
            filter: spec.filter.map(|(mode, cut)| SvfTpt::new(mode, cut, Q_BUTTERWORTH, sr)),
            source: spec.source,
            gain: spec.gain,
            bus: spec.bus,
            reverb_send: spec.reverb_send,
            start_frame: time_to_frame(spec.start, sr),
            stop_frame: spec.stop.map(|t| time_to_frame(t, sr)),
        }
    }

    fn is_active_at(&self, frame: u64) -> bool {
        self.stop_frame.map_or(true, |s| frame < s)
    }

    /// Render into the bus buffers starting at absolute frame `first`.
    /// Returns `false` once the voice is finished.
    fn render(&mut self, first: u64, sr: f32, bufs: &mut BusBuffers<'_>) -> bool {
        let len = bufs.bgm.len();
        for i in 0..len {
            let n = first + i as u64;
            if n < self.start_frame {
                continue;
            }
            if !self.is_active_at(n) {
                return false;
            }
            let t = frame_to_time(n, sr);
            let Some(x) = self.source.next(t, sr) else {
                return false;
            };
            let x = match &mut self.filter {
                Some(f) => f.process(x),
                None => x,
            };
            let y = x * self.gain.value_at(t);
            match self.bus {
                Bus::Bgm => bufs.bgm[i] += y,
                Bus::Master => bufs.master[i] += y,
            }
            if self.reverb_send {
                bufs.send[i] += y;
            }
        }
        self.is_active_at(first + len as u64)
    }
}

/// Permanent settings the graph is built with.
pub struct GraphConfig {
    pub bgm_level: f32,
    pub master_initial: f32,
    pub reverb: Option<Convolver>,
}

/// Mixer owning every live voice plus the permanent gain/reverb stages.
pub struct Graph {
    sr: f32,
    voices: Vec<Voice>,
    next_id: u64,
    master_gain: ParamTimeline,
    bgm_level: f32,
    reverb: Option<Convolver>,
    // scratch
    bgm: Vec<f32>,
    master: Vec<f32>,
    send: Vec<f32>,
    wet_l: Vec<f32>,
    wet_r: Vec<f32>,
}

impl Graph {
    pub fn new(sr: f32, cfg: GraphConfig) -> Self {
        Self {
            sr: sr.max(1.0),
            voices: Vec::with_capacity(64),
            next_id: 1,
            master_gain: ParamTimeline::new(cfg.master_initial),
            bgm_level: cfg.bgm_level,
            reverb: cfg.reverb,
            bgm: Vec::new(),
            master: Vec::new(),
            send: Vec::new(),
            wet_l: Vec::new(),
            wet_r: Vec::new(),
        }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }
    #[inline] pub fn bgm_level(&self) -> f32 { self.bgm_level }
    #[inline] pub fn has_reverb(&self) -> bool { self.reverb.is_some() }
    #[inline] pub fn master_gain(&self) -> &ParamTimeline { &self.master_gain }
    #[inline] pub fn master_gain_mut(&mut self) -> &mut ParamTimeline { &mut self.master_gain }

    /// Number of voices still held by the graph (including ones not yet started).
    #[inline] pub fn voice_count(&self) -> usize { self.voices.len() }

    pub fn add(&mut self, spec: VoiceSpec) -> SourceId {
        let id = SourceId(self.next_id);
        self.next_id += 1;
        self.voices.push(Voice::from_spec(id, spec, self.sr));
        id
    }

    /// Stop a voice at `frame`. Stopping twice is an error the caller may ignore.
    pub fn stop(&mut self, id: SourceId, frame: u64) -> AudioResult<()> {
        let voice = self
            .voices
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(AudioError::UnknownSource(id))?;
        match voice.stop_frame {
            Some(s) if s <= frame => Err(AudioError::AlreadyStopped(id)),
            _ => {
                voice.stop_frame = Some(frame);
                Ok(())
            }
        }
    }

    pub fn is_active(&self, id: SourceId, frame: u64) -> bool {
        self.voices.iter().any(|v| v.id == id && v.is_active_at(frame))
    }

    /// Looping sources (the rumble bed) still playing at `frame`.
    pub fn active_looping(&self, frame: u64) -> usize {
        self.voices
            .iter()
            .filter(|v| v.source.is_looping() && v.is_active_at(frame))
            .count()
    }

    fn ensure_scratch(&mut self, frames: usize) {
        for buf in [&mut self.bgm, &mut self.master, &mut self.send, &mut self.wet_l, &mut self.wet_r] {
            buf.clear();
            buf.resize(frames, 0.0);
        }
    }

    /// Render `out.len() / channels` frames starting at absolute frame `first`
    /// into an interleaved buffer. Channel 0 is left, 1 is right; a mono
    /// device receives the average, extra channels repeat the pair.
    pub fn render(&mut self, first: u64, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        self.ensure_scratch(frames);

        let sr = self.sr;
        {
            let mut bufs = BusBuffers {
                bgm: &mut self.bgm,
                master: &mut self.master,
                send: &mut self.send,
            };
            self.voices.retain_mut(|v| v.render(first, sr, &mut bufs));
        }

        match &mut self.reverb {
            Some(rev) => rev.process(&self.send, &mut self.wet_l, &mut self.wet_r),
            None => {
                self.wet_l.fill(0.0);
                self.wet_r.fill(0.0);
            }
        }

        for (i, frame) in out.chunks_exact_mut(channels).enumerate() {
            let t = frame_to_time(first + i as u64, sr);
            let g = self.master_gain.value_at(t);
            let dry = self.master[i] + self.bgm[i] * self.bgm_level;
            let l = ((dry + self.wet_l[i]) * g).clamp(-1.0, 1.0);
            let r = ((dry + self.wet_r[i]) * g).clamp(-1.0, 1.0);
            if channels == 1 {
                frame[0] = 0.5 * (l + r);
            } else {
                for (c, s) in frame.iter_mut().enumerate() {
                    *s = if c % 2 == 0 { l } else { r };
                }
            }
        }
    }
}
