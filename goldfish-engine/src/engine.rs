//! The application-facing audio engine.
//!
//! `AudioEngine` owns the one audio context, the mute flag and the soundtrack
//! sequencer. Every public entry point is infallible from the caller's point
//! of view: sound is decoration, so problems are logged and the call turns
//! into a no-op.
//!
//! Lifecycle
//! - The context is created lazily, at most once. If the backend cannot open,
//!   that is remembered and no later call tries again.
//! - `init_audio` is meant to run from a user gesture: it creates and resumes
//!   the context and starts the soundtrack unless muted.
//! - The soundtrack runs until `stop_bgm` or a mute; notes already placed on
//!   the graph play out.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::backend::AudioBackend;
use crate::config::{Drive, EngineConfig};
use crate::context::{AudioContext, ContextState};
use crate::error::AudioResult;
use crate::graph::{GraphConfig, SourceId};
use crate::layers::{rumble_buffer, rumble_voice};
use crate::reverb::{create_impulse_response, Convolver};
use crate::scheduler::{BeatScheduler, Sequencer, Ticker};
use crate::sfx::{click_voice, Sfx};
use crate::store::MuteStore;

pub struct AudioEngine<B: AudioBackend, S: MuteStore> {
    config: EngineConfig,
    backend: B,
    store: S,
    muted: bool,
    context: Option<AudioContext>,
    /// Keeps the device stream alive.
    output: Option<B::Output>,
    unsupported: bool,
    sequencer: Arc<Mutex<Sequencer>>,
    ticker: Option<Ticker>,
    rumble: Option<SourceId>,
    rng: SmallRng,
}

impl<B: AudioBackend, S: MuteStore> AudioEngine<B, S> {
    /// Build the engine and read the persisted mute flag. No audio resources
    /// are touched until the first call that needs the context.
    pub fn new(config: EngineConfig, backend: B, store: S) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::warn!("{e}; falling back to the default engine config");
                EngineConfig::default()
            }
        };
        let muted = store.load().unwrap_or_else(|e| {
            log::warn!("could not read mute flag, assuming unmuted: {e}");
            false
        });
        let mut rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let pattern_rng = SmallRng::seed_from_u64(rng.gen());
        let sequencer = Sequencer::new(BeatScheduler::from_config(&config), pattern_rng);
        Self {
            config,
            backend,
            store,
            muted,
            context: None,
            output: None,
            unsupported: false,
            sequencer: Arc::new(Mutex::new(sequencer)),
            ticker: None,
            rumble: None,
            rng,
        }
    }

    fn open_context(&mut self) -> AudioResult<AudioContext> {
        let sample_rate = self.backend.sample_rate()?;
        let ir = create_impulse_response(
            sample_rate,
            self.config.reverb_duration_s,
            self.config.reverb_decay,
            &mut self.rng,
        );
        let ctx = AudioContext::new(
            sample_rate,
            GraphConfig {
                bgm_level: self.config.bgm_level,
                master_initial: if self.muted { 0.0 } else { 1.0 },
                reverb: Some(Convolver::new(&ir)),
            },
        );
        self.output = Some(self.backend.connect(&ctx)?);
        log::info!(
            "audio context created at {sample_rate} Hz ({} reverb frames)",
            ir.len()
        );
        Ok(ctx)
    }

    /// The engine's context, created on first use. `None` when the platform
    /// has no usable audio output.
    pub fn get_context(&mut self) -> Option<AudioContext> {
        if let Some(ctx) = &self.context {
            return Some(ctx.clone());
        }
        if self.unsupported {
            return None;
        }
        match self.open_context() {
            Ok(ctx) => {
                self.context = Some(ctx.clone());
                Some(ctx)
            }
            Err(e) => {
                log::warn!("audio disabled: {e}");
                self.unsupported = true;
                None
            }
        }
    }

    /// Entry point for the first user gesture.
    pub fn init_audio(&mut self) {
        let Some(ctx) = self.get_context() else { return };
        if ctx.state() == ContextState::Suspended {
            ctx.resume();
        }
        if !self.muted {
            self.start_bgm();
        }
    }

    /// Flip the mute flag, persist it and fade the master bus. Returns the new state.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        if let Err(e) = self.store.save(self.muted) {
            log::warn!("could not persist mute flag: {e}");
        }
        log::info!("audio {}", if self.muted { "muted" } else { "unmuted" });

        if let Some(ctx) = self.get_context() {
            let target = if self.muted { 0.0 } else { 1.0 };
            ctx.ramp_master_gain(target, self.config.mute_ramp_tau_s);
            if self.muted {
                self.stop_bgm();
            } else {
                if ctx.state() == ContextState::Suspended {
                    ctx.resume();
                }
                self.start_bgm();
            }
        }
        self.muted
    }

    #[inline]
    pub fn get_mute_state(&self) -> bool {
        self.muted
    }

    /// Start the soundtrack. Needs an existing context; does nothing while
    /// muted or already playing.
    pub fn start_bgm(&mut self) {
        let Some(ctx) = self.context.clone() else { return };
        if self.muted {
            log::debug!("start_bgm ignored while muted");
            return;
        }
        let mut seq = self.sequencer.lock();
        let now = ctx.current_time();
        if !seq.scheduler_mut().start(now) {
            return;
        }
        let buffer = rumble_buffer(ctx.sample_rate(), &mut self.rng);
        self.rumble = Some(ctx.play(rumble_voice(buffer, now)));
        seq.pass(&ctx);
        drop(seq);

        if self.config.drive == Drive::Threaded {
            let seq = Arc::clone(&self.sequencer);
            let tick_ctx = ctx.clone();
            match Ticker::spawn(self.config.lookahead(), move || {
                seq.lock().pass(&tick_ctx);
            }) {
                Ok(t) => self.ticker = Some(t),
                Err(e) => log::warn!("could not start scheduler thread, pump() manually: {e}"),
            }
        }
        log::info!("background music started at {now:.3}s");
    }

    /// Stop the soundtrack. Safe to call at any time, any number of times.
    pub fn stop_bgm(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
        let was_playing = self.sequencer.lock().scheduler_mut().stop();
        if let Some(id) = self.rumble.take() {
            if let Some(ctx) = &self.context {
                if let Err(e) = ctx.stop(id) {
                    log::debug!("ignoring rumble stop: {e}");
                }
            }
        }
        if was_playing {
            log::info!("background music stopped");
        }
    }

    /// Run one scheduler pass now. Needed in [`Drive::Manual`]; harmless otherwise.
    pub fn pump(&mut self) -> usize {
        match &self.context {
            Some(ctx) => self.sequencer.lock().pass(ctx),
            None => 0,
        }
    }

    /// UI click. Only sounds once audio is up; never creates the context.
    pub fn play_click(&mut self) {
        if self.muted {
            return;
        }
        if let Some(ctx) = &self.context {
            ctx.play(click_voice(ctx.current_time()));
        }
    }

    fn play_sfx(&mut self, sfx: Sfx) {
        if self.muted {
            return;
        }
        let Some(ctx) = self.get_context() else { return };
        let now = ctx.current_time();
        for voice in sfx.voices(now) {
            ctx.play(voice);
        }
        log::debug!("{sfx:?} at {now:.3}s");
    }

    pub fn play_correct(&mut self) { self.play_sfx(Sfx::Correct) }
    pub fn play_incorrect(&mut self) { self.play_sfx(Sfx::Incorrect) }
    pub fn play_game_start(&mut self) { self.play_sfx(Sfx::GameStart) }
    pub fn play_game_end(&mut self) { self.play_sfx(Sfx::GameEnd) }

    // ------------------------------------------------------------------ accessors

    /// The context if it was created already.
    #[inline] pub fn context(&self) -> Option<&AudioContext> { self.context.as_ref() }
    #[inline] pub fn is_unsupported(&self) -> bool { self.unsupported }
    #[inline] pub fn is_bgm_playing(&self) -> bool { self.sequencer.lock().scheduler().is_playing() }
    #[inline] pub fn rumble_source(&self) -> Option<SourceId> { self.rumble }
    #[inline] pub fn config(&self) -> &EngineConfig { &self.config }
    #[inline] pub fn backend(&self) -> &B { &self.backend }
    /// Whatever the backend returned when the context was connected.
    #[inline] pub fn output(&self) -> Option<&B::Output> { self.output.as_ref() }
    #[inline] pub fn store(&self) -> &S { &self.store }

    /// Next beat time and step of the soundtrack scheduler.
    pub fn scheduler_position(&self) -> (f64, u32) {
        let seq = self.sequencer.lock();
        (seq.scheduler().next_note_time(), seq.scheduler().current_beat())
    }
}

impl<B: AudioBackend, S: MuteStore> Drop for AudioEngine<B, S> {
    fn drop(&mut self) {
        self.stop_bgm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;
    use crate::store::MemoryStore;

    fn manual() -> EngineConfig {
        EngineConfig { drive: Drive::Manual, seed: Some(1), reverb_duration_s: 0.1, ..EngineConfig::default() }
    }

    fn engine(muted: bool) -> AudioEngine<OfflineBackend, MemoryStore> {
        AudioEngine::new(manual(), OfflineBackend::new(8_000.0), MemoryStore::new(muted))
    }

    #[test]
    fn nothing_is_opened_until_needed() {
        let e = engine(false);
        assert!(e.context().is_none());
        assert_eq!(e.backend().connections(), 0);
        assert!(!e.is_bgm_playing());
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let bad = EngineConfig { tempo_bpm: -1.0, ..manual() };
        let e = AudioEngine::new(bad, OfflineBackend::new(8_000.0), MemoryStore::new(false));
        assert_eq!(e.config().tempo_bpm, 105.0);
    }

    #[test]
    fn start_bgm_needs_a_context() {
        let mut e = engine(false);
        e.start_bgm();
        assert!(!e.is_bgm_playing());
        assert!(e.context().is_none());
    }

    #[test]
    fn init_audio_resumes_and_starts_music() {
        let mut e = engine(false);
        e.init_audio();
        let ctx = e.context().unwrap().clone();
        assert_eq!(ctx.state(), ContextState::Running);
        assert!(ctx.has_reverb());
        assert!(e.is_bgm_playing());
        assert_eq!(ctx.active_looping_sources(), 1);
        let (next, step) = e.scheduler_position();
        assert!((next - 0.1).abs() < 1e-9);
        assert_eq!(step, 0);
    }

    #[test]
    fn muted_init_stays_quiet() {
        let mut e = engine(true);
        e.init_audio();
        let ctx = e.context().unwrap().clone();
        assert_eq!(ctx.master_gain_at(0.0), 0.0);
        assert!(!e.is_bgm_playing());
        e.start_bgm();
        assert!(!e.is_bgm_playing());
    }

    #[test]
    fn click_never_creates_the_context() {
        let mut e = engine(false);
        e.play_click();
        assert!(e.context().is_none());
        e.play_correct();
        let ctx = e.context().unwrap().clone();
        assert_eq!(ctx.voice_count(), 3);
        e.play_click();
        assert_eq!(ctx.voice_count(), 4);
    }

    #[test]
    fn sfx_are_gated_by_mute() {
        let mut e = engine(true);
        e.play_game_end();
        e.play_incorrect();
        assert!(e.context().is_none());
    }

    #[test]
    fn pump_places_beats_as_the_clock_moves() {
        let mut e = engine(false);
        e.init_audio();
        let ctx = e.context().unwrap().clone();
        let frames_per_pump = 200; // 25 ms at 8 kHz
        let mut placed = 0;
        for _ in 0..80 {
            ctx.render_frames(frames_per_pump);
            placed += e.pump();
        }
        // Two seconds of audio at ~3.5 steps per second.
        assert!((6..=8).contains(&placed), "placed={placed}");
    }
}
