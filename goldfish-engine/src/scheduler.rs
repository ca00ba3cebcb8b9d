//! Lookahead beat scheduler.
//!
//! A coarse timer wakes [`BeatScheduler::pass`] every few tens of
//! milliseconds; each pass places every beat that falls inside the next
//! `schedule_ahead` seconds of audio-clock time at its exact timestamp. Timer
//! jitter only decides *when* a beat gets written down, never *where* it lands.
//!
//! Two drivers exist:
//! - [`Ticker`]: background thread, cancelled through a channel
//! - manual: the host calls [`Sequencer::pass`] itself (offline rendering, tests)

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use rand::rngs::SmallRng;

use crate::config::EngineConfig;
use crate::context::AudioContext;
use crate::layers::LayerSink;
use crate::pattern::STEPS_PER_LOOP;

/// Receives every beat the scheduler places.
pub trait BeatSink {
    fn schedule(&mut self, step: u32, time: f64);
}

impl<F: FnMut(u32, f64)> BeatSink for F {
    #[inline]
    fn schedule(&mut self, step: u32, time: f64) { self(step, time) }
}

/// Tempo bookkeeping: playing flag, next beat time and step counter.
#[derive(Clone, Debug)]
pub struct BeatScheduler {
    step_s: f64,
    ahead_s: f64,
    start_offset_s: f64,
    playing: bool,
    next_note_time: f64,
    current_beat: u32,
}

impl BeatScheduler {
    /// `tempo_bpm` in quarter notes; the scheduler steps in 8ths.
    pub fn new(tempo_bpm: f64, schedule_ahead_s: f64, start_offset_s: f64) -> Self {
        Self {
            step_s: 0.5 * 60.0 / tempo_bpm.max(1.0),
            ahead_s: schedule_ahead_s.max(0.0),
            start_offset_s: start_offset_s.max(0.0),
            playing: false,
            next_note_time: 0.0,
            current_beat: 0,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.tempo_bpm, cfg.schedule_ahead_s, cfg.start_offset_s)
    }

    #[inline] pub fn is_playing(&self) -> bool { self.playing }
    #[inline] pub fn next_note_time(&self) -> f64 { self.next_note_time }
    #[inline] pub fn current_beat(&self) -> u32 { self.current_beat }
    #[inline] pub fn step_duration(&self) -> f64 { self.step_s }
    #[inline] pub fn schedule_ahead(&self) -> f64 { self.ahead_s }

    /// Arm the scheduler with the first beat shortly after `now`.
    /// Returns `false` if it was already playing.
    pub fn start(&mut self, now: f64) -> bool {
        if self.playing {
            return false;
        }
        self.playing = true;
        self.next_note_time = now + self.start_offset_s;
        self.current_beat = 0;
        true
    }

    /// Returns `false` if it was already stopped.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.playing, false)
    }

    /// Place every beat before `now + schedule_ahead`. Returns the number of
    /// beats handed to `sink`.
    ///
    /// Beats that fell a whole window behind the clock (the driver stalled)
    /// are stepped over without sounding; the step counter still advances so
    /// the pattern stays in phase.
    pub fn pass<S: BeatSink + ?Sized>(&mut self, now: f64, sink: &mut S) -> usize {
        if !self.playing {
            return 0;
        }
        let horizon = now + self.ahead_s;
        let stale = now - self.ahead_s;
        let mut placed = 0;
        while self.next_note_time < horizon {
            if self.next_note_time > stale {
                sink.schedule(self.current_beat, self.next_note_time);
                placed += 1;
            }
            self.next_note_time += self.step_s;
            self.current_beat = (self.current_beat + 1) % STEPS_PER_LOOP;
        }
        placed
    }
}

/// Scheduler plus the random source feeding the pattern.
pub struct Sequencer {
    scheduler: BeatScheduler,
    rng: SmallRng,
}

impl Sequencer {
    pub fn new(scheduler: BeatScheduler, rng: SmallRng) -> Self {
        Self { scheduler, rng }
    }

    #[inline] pub fn scheduler(&self) -> &BeatScheduler { &self.scheduler }
    #[inline] pub fn scheduler_mut(&mut self) -> &mut BeatScheduler { &mut self.scheduler }

    /// One scheduler pass against `ctx`'s clock.
    pub fn pass(&mut self, ctx: &AudioContext) -> usize {
        let now = ctx.current_time();
        let mut sink = LayerSink::new(ctx, &mut self.rng);
        let placed = self.scheduler.pass(now, &mut sink);
        if placed > 0 {
            log::trace!(
                "scheduler pass at {now:.3}s placed {placed} beat(s), next at {:.3}s",
                self.scheduler.next_note_time()
            );
        }
        placed
    }
}

/// Background thread calling `tick` every `interval` until cancelled.
pub struct Ticker {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn<F>(interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("goldfish-ticker".into())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self { cancel: Some(tx), handle: Some(handle) })
    }

    /// Stop the thread and wait for it; no tick runs after this returns.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.try_send(());
        }
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                log::warn!("ticker thread panicked");
            }
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool { self.handle.is_some() }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}
