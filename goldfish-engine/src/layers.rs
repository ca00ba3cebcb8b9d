//! Soundtrack layers: one `VoiceSpec` builder per instrument.
//!
//! Every builder takes the absolute start time `t` (audio-clock seconds) and
//! returns a voice routed to the BGM bus. Nothing here touches the graph
//! directly; [`play_plan`] and [`LayerSink`] hand the voices to a context.

use std::sync::Arc;

use rand::Rng;

use goldfish_core::envelopes::{ParamTimeline, SILENCE_FLOOR};
use goldfish_core::filters::SvfMode;
use goldfish_core::noise::{rumble_noise, white_noise, RUMBLE_LEAK, RUMBLE_MAKEUP};

use crate::context::AudioContext;
use crate::graph::{Bus, VoiceSpec};
use crate::nodes::Wave;
use crate::pattern::{plan_beat, BeatPlan};
use crate::scheduler::BeatSink;

pub const RUMBLE_SECONDS: f64 = 2.0;
pub const RUMBLE_CUTOFF_HZ: f32 = 200.0;
pub const RUMBLE_GAIN: f32 = 0.4;

pub const SHAKER_SECONDS: f64 = 0.05;
pub const SHAKER_CUTOFF_HZ: f32 = 5_000.0;

pub const KICK_SECONDS: f64 = 0.3;
const KICK_START_HZ: f32 = 150.0;
const KICK_END_HZ: f32 = 0.01;
const KICK_GAIN: f32 = 0.6;

const MARIMBA_PEAK: f32 = 0.4;
const MARIMBA_ATTACK: f64 = 0.01;
const MARIMBA_DECAY: f64 = 0.4;
pub const MARIMBA_SECONDS: f64 = 0.5;

const BUBBLE_BASE_HZ: f32 = 400.0;
const BUBBLE_SPREAD_HZ: f32 = 400.0;
const BUBBLE_RISE_HZ: f32 = 300.0;
const BUBBLE_SWEEP: f64 = 0.1;
const BUBBLE_PEAK: f32 = 0.3;
const BUBBLE_ATTACK: f64 = 0.02;
const BUBBLE_FLOOR: f32 = 0.01;
pub const BUBBLE_SECONDS: f64 = 0.15;

#[inline]
fn frames(sample_rate: f32, seconds: f64) -> usize {
    (f64::from(sample_rate) * seconds) as usize
}

/// Two seconds of leaky-integrated noise, the loop under the rumble bed.
pub fn rumble_buffer<R: Rng + ?Sized>(sample_rate: f32, rng: &mut R) -> Arc<[f32]> {
    Arc::from(rumble_noise(rng, frames(sample_rate, RUMBLE_SECONDS), RUMBLE_LEAK, RUMBLE_MAKEUP))
}

/// Low, dark bed that loops until stopped.
pub fn rumble_voice(buffer: Arc<[f32]>, t: f64) -> VoiceSpec {
    VoiceSpec::buffer(buffer, true)
        .filter(SvfMode::Lowpass, RUMBLE_CUTOFF_HZ)
        .gain(ParamTimeline::new(RUMBLE_GAIN))
        .route(Bus::Bgm)
        .start_at(t)
}

/// 50 ms high-passed noise tick at level `vol`.
pub fn shaker_voice<R: Rng + ?Sized>(sample_rate: f32, vol: f32, t: f64, rng: &mut R) -> VoiceSpec {
    let burst: Arc<[f32]> = Arc::from(white_noise(rng, frames(sample_rate, SHAKER_SECONDS)));
    let mut gain = ParamTimeline::new(0.0);
    gain.set_value_at_time(vol, t)
        .exponential_ramp_to_value_at_time(SILENCE_FLOOR, t + SHAKER_SECONDS);
    VoiceSpec::buffer(burst, false)
        .filter(SvfMode::Highpass, SHAKER_CUTOFF_HZ)
        .gain(gain)
        .route(Bus::Bgm)
        .start_at(t)
}

/// Sine thump with a fast downward pitch sweep.
pub fn kick_voice(t: f64) -> VoiceSpec {
    let end = t + KICK_SECONDS;
    let mut freq = ParamTimeline::new(KICK_START_HZ);
    freq.set_value_at_time(KICK_START_HZ, t)
        .exponential_ramp_to_value_at_time(KICK_END_HZ, end);
    let mut gain = ParamTimeline::new(0.0);
    gain.set_value_at_time(KICK_GAIN, t)
        .exponential_ramp_to_value_at_time(SILENCE_FLOOR, end);
    VoiceSpec::oscillator(Wave::Sine, freq)
        .gain(gain)
        .route(Bus::Bgm)
        .start_at(t)
        .stop_at(end)
}

/// Short mallet note; the only layer that feeds the reverb.
pub fn marimba_voice(hz: f32, t: f64) -> VoiceSpec {
    let mut gain = ParamTimeline::new(0.0);
    gain.percussive(t, MARIMBA_PEAK, MARIMBA_ATTACK, SILENCE_FLOOR, t + MARIMBA_DECAY);
    VoiceSpec::oscillator(Wave::Sine, ParamTimeline::new(hz))
        .gain(gain)
        .route(Bus::Bgm)
        .reverb_send(true)
        .start_at(t)
        .stop_at(t + MARIMBA_SECONDS)
}

/// Rising blip at a random pitch between 400 and 800 Hz.
pub fn bubble_voice<R: Rng + ?Sized>(t: f64, rng: &mut R) -> VoiceSpec {
    let start_hz = BUBBLE_BASE_HZ + rng.gen_range(0.0..BUBBLE_SPREAD_HZ);
    let mut freq = ParamTimeline::new(start_hz);
    freq.set_value_at_time(start_hz, t)
        .exponential_ramp_to_value_at_time(start_hz + BUBBLE_RISE_HZ, t + BUBBLE_SWEEP);
    let mut gain = ParamTimeline::new(0.0);
    gain.percussive(t, BUBBLE_PEAK, BUBBLE_ATTACK, BUBBLE_FLOOR, t + BUBBLE_SECONDS);
    VoiceSpec::oscillator(Wave::Sine, freq)
        .gain(gain)
        .route(Bus::Bgm)
        .start_at(t)
        .stop_at(t + BUBBLE_SECONDS)
}

/// Put every voice of `plan` on the graph at time `t`.
pub fn play_plan<R: Rng + ?Sized>(ctx: &AudioContext, plan: &BeatPlan, t: f64, rng: &mut R) {
    let sr = ctx.sample_rate();
    ctx.play(shaker_voice(sr, plan.shaker, t, rng));
    if plan.kick {
        ctx.play(kick_voice(t));
    }
    if let Some(hz) = plan.melody {
        ctx.play(marimba_voice(hz, t));
    }
    if plan.bubble {
        ctx.play(bubble_voice(t, rng));
    }
}

/// Turns scheduled beats into voices on a context.
pub struct LayerSink<'a, R: Rng + ?Sized> {
    ctx: &'a AudioContext,
    rng: &'a mut R,
}

impl<'a, R: Rng + ?Sized> LayerSink<'a, R> {
    pub fn new(ctx: &'a AudioContext, rng: &'a mut R) -> Self {
        Self { ctx, rng }
    }
}

impl<R: Rng + ?Sized> BeatSink for LayerSink<'_, R> {
    fn schedule(&mut self, step: u32, time: f64) {
        let plan = plan_beat(step, &mut *self.rng);
        play_plan(self.ctx, &plan, time, &mut *self.rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn kick_sweeps_down_and_stops() {
        let v = kick_voice(1.0);
        assert_eq!(v.stop_time(), Some(1.3));
        assert_eq!(v.bus(), Bus::Bgm);
        let crate::nodes::SourceNode::Osc(osc) = v.source() else {
            panic!("kick is an oscillator");
        };
        assert_eq!(osc.frequency().value_at(1.0), 150.0);
        assert!((osc.frequency().value_at(1.3) - 0.01).abs() < 1e-6);
        assert!((v.gain_timeline().value_at(1.0) - 0.6).abs() < 1e-6);
        assert!((v.gain_timeline().value_at(1.3) - 0.001).abs() < 1e-6);
    }

    #[test]
    fn marimba_feeds_reverb() {
        let v = marimba_voice(880.0, 2.0);
        assert!(v.sends_to_reverb());
        assert_eq!(v.stop_time(), Some(2.5));
        assert_eq!(v.gain_timeline().value_at(2.0), 0.0);
        assert!((v.gain_timeline().value_at(2.01) - 0.4).abs() < 1e-5);
        assert!((v.gain_timeline().value_at(2.4) - 0.001).abs() < 1e-6);
        assert!(!kick_voice(0.0).sends_to_reverb());
    }

    #[test]
    fn bubble_pitch_in_range() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..100 {
            let v = bubble_voice(0.0, &mut rng);
            let crate::nodes::SourceNode::Osc(osc) = v.source() else {
                panic!("bubble is an oscillator");
            };
            let f0 = osc.frequency().value_at(0.0);
            assert!((400.0..800.0).contains(&f0), "f0={f0}");
            assert!((osc.frequency().value_at(0.1) - (f0 + 300.0)).abs() < 1e-3);
            assert_eq!(v.stop_time(), Some(0.15));
        }
    }

    #[test]
    fn rumble_loops_through_lowpass() {
        let mut rng = SmallRng::seed_from_u64(5);
        let buf = rumble_buffer(8_000.0, &mut rng);
        assert_eq!(buf.len(), 16_000);
        let v = rumble_voice(buf, 0.5);
        assert!(v.source().is_looping());
        assert_eq!(v.filter_settings(), Some((SvfMode::Lowpass, 200.0)));
        assert_eq!(v.gain_timeline().value_at(10.0), 0.4);
        assert_eq!(v.stop_time(), None);
    }

    #[test]
    fn shaker_is_short_highpassed_noise() {
        let mut rng = SmallRng::seed_from_u64(9);
        let v = shaker_voice(8_000.0, 0.04, 1.0, &mut rng);
        assert_eq!(v.filter_settings(), Some((SvfMode::Highpass, 5_000.0)));
        assert!(!v.source().is_looping());
        assert!((v.gain_timeline().value_at(1.0) - 0.04).abs() < 1e-7);
        assert!((v.gain_timeline().value_at(1.05) - 0.001).abs() < 1e-6);
    }

    #[test]
    fn plan_places_one_voice_per_layer() {
        let ctx = AudioContext::new(
            8_000.0,
            crate::graph::GraphConfig { bgm_level: 0.12, master_initial: 1.0, reverb: None },
        );
        let mut rng = SmallRng::seed_from_u64(1);
        let plan = BeatPlan { step: 0, shaker: 0.04, kick: true, melody: Some(523.25), bubble: true };
        play_plan(&ctx, &plan, 0.1, &mut rng);
        assert_eq!(ctx.voice_count(), 4);

        let quiet = BeatPlan { step: 1, shaker: 0.03, kick: false, melody: None, bubble: false };
        play_plan(&ctx, &quiet, 0.2, &mut rng);
        assert_eq!(ctx.voice_count(), 5);
    }
}
