//! One-shot game sound effects.
//!
//! Each effect is a short list of [`Tone`]s played straight into the master
//! bus, relative to the moment the game event fires.

use goldfish_core::envelopes::ParamTimeline;

use crate::graph::{Bus, VoiceSpec};
use crate::nodes::Wave;

/// Level every tone decays to by the end of its duration.
const TONE_FLOOR: f32 = 0.01;
/// Share of the duration spent on the attack.
const TONE_ATTACK: f64 = 0.1;

const CLICK_START_HZ: f32 = 800.0;
const CLICK_END_HZ: f32 = 400.0;
const CLICK_GAIN: f32 = 0.5;
pub const CLICK_SECONDS: f64 = 0.1;

/// A single pitched blip.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tone {
    pub freq: f32,
    pub wave: Wave,
    /// Seconds.
    pub duration: f64,
    /// Delay from the trigger, seconds.
    pub offset: f64,
    /// Optional linear glide to this frequency over the duration.
    pub slide_to: Option<f32>,
}

impl Tone {
    pub const fn new(freq: f32, wave: Wave, duration: f64, offset: f64) -> Self {
        Self { freq, wave, duration, offset, slide_to: None }
    }

    pub const fn slide(mut self, to: f32) -> Self {
        self.slide_to = Some(to);
        self
    }
}

/// Voice for `tone` triggered at absolute time `now`.
pub fn tone_voice(tone: &Tone, now: f64) -> VoiceSpec {
    let start = now + tone.offset;
    let end = start + tone.duration;

    let mut freq = ParamTimeline::new(tone.freq);
    freq.set_value_at_time(tone.freq, start);
    if let Some(to) = tone.slide_to {
        freq.linear_ramp_to_value_at_time(to, end);
    }

    let mut gain = ParamTimeline::new(0.0);
    gain.percussive(start, 1.0, tone.duration * TONE_ATTACK, TONE_FLOOR, end);

    VoiceSpec::oscillator(tone.wave, freq)
        .gain(gain)
        .route(Bus::Master)
        .start_at(start)
        .stop_at(end)
}

/// UI click: a quick downward chirp.
pub fn click_voice(now: f64) -> VoiceSpec {
    let end = now + CLICK_SECONDS;
    let mut freq = ParamTimeline::new(CLICK_START_HZ);
    freq.set_value_at_time(CLICK_START_HZ, now)
        .exponential_ramp_to_value_at_time(CLICK_END_HZ, end);
    let mut gain = ParamTimeline::new(CLICK_GAIN);
    gain.set_value_at_time(CLICK_GAIN, now)
        .exponential_ramp_to_value_at_time(TONE_FLOOR, end);
    VoiceSpec::oscillator(Wave::Sine, freq)
        .gain(gain)
        .route(Bus::Master)
        .start_at(now)
        .stop_at(end)
}

const CORRECT: [Tone; 3] = [
    Tone::new(523.25, Wave::Sine, 0.2, 0.0),
    Tone::new(659.25, Wave::Sine, 0.2, 0.1),
    Tone::new(783.99, Wave::Sine, 0.4, 0.2),
];

const INCORRECT: [Tone; 2] = [
    Tone::new(150.0, Wave::Sawtooth, 0.3, 0.0).slide(80.0),
    Tone::new(100.0, Wave::Sawtooth, 0.3, 0.15).slide(50.0),
];

const GAME_START: [Tone; 5] = [
    Tone::new(440.0, Wave::Sine, 0.4, 0.0),
    Tone::new(554.0, Wave::Sine, 0.4, 0.1),
    Tone::new(659.0, Wave::Sine, 0.4, 0.2),
    Tone::new(880.0, Wave::Sine, 0.4, 0.3),
    Tone::new(1108.0, Wave::Sine, 0.4, 0.4),
];

// Triple pickup into a held major chord.
const GAME_END: [Tone; 6] = [
    Tone::new(523.25, Wave::Triangle, 0.2, 0.0),
    Tone::new(523.25, Wave::Triangle, 0.2, 0.15),
    Tone::new(523.25, Wave::Triangle, 0.2, 0.30),
    Tone::new(659.25, Wave::Triangle, 0.6, 0.45),
    Tone::new(783.99, Wave::Triangle, 0.8, 0.45),
    Tone::new(1046.5, Wave::Triangle, 1.0, 0.45),
];

/// Game events with a tone-list sound.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sfx {
    Correct,
    Incorrect,
    GameStart,
    GameEnd,
}

impl Sfx {
    pub fn tones(self) -> &'static [Tone] {
        match self {
            Sfx::Correct => &CORRECT,
            Sfx::Incorrect => &INCORRECT,
            Sfx::GameStart => &GAME_START,
            Sfx::GameEnd => &GAME_END,
        }
    }

    /// Every voice of this effect, triggered at `now`.
    pub fn voices(self, now: f64) -> impl Iterator<Item = VoiceSpec> {
        self.tones().iter().map(move |t| tone_voice(t, now))
    }

    /// Seconds from trigger until the last tone ends.
    pub fn length(self) -> f64 {
        self.tones().iter().map(|t| t.offset + t.duration).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::SourceNode;

    fn freq_of(v: &VoiceSpec) -> &ParamTimeline {
        match v.source() {
            SourceNode::Osc(o) => o.frequency(),
            SourceNode::Buffer(_) => panic!("tones are oscillators"),
        }
    }

    #[test]
    fn tone_envelope_shape() {
        let v = tone_voice(&Tone::new(440.0, Wave::Sine, 0.4, 0.1), 1.0);
        let g = v.gain_timeline();
        assert!((v.start_time() - 1.1).abs() < 1e-12);
        assert!((v.stop_time().unwrap() - 1.5).abs() < 1e-12);
        assert_eq!(g.value_at(1.1), 0.0);
        assert!((g.value_at(1.14) - 1.0).abs() < 1e-3);
        assert!((g.value_at(1.5) - 0.01).abs() < 1e-6);
        assert_eq!(v.bus(), Bus::Master);
        assert!(!v.sends_to_reverb());
    }

    #[test]
    fn slide_is_linear() {
        let v = tone_voice(&INCORRECT[0], 0.0);
        let f = freq_of(&v);
        assert_eq!(f.value_at(0.0), 150.0);
        assert!((f.value_at(0.15) - 115.0).abs() < 1e-3);
        assert!((f.value_at(0.3) - 80.0).abs() < 1e-3);
    }

    #[test]
    fn fixed_tones_hold_pitch() {
        let v = tone_voice(&CORRECT[2], 0.0);
        let f = freq_of(&v);
        assert_eq!(f.value_at(0.3), 783.99);
        assert_eq!(f.value_at(0.6), 783.99);
    }

    #[test]
    fn click_chirps_down() {
        let v = click_voice(2.0);
        let f = freq_of(&v);
        assert_eq!(f.value_at(2.0), 800.0);
        assert!((f.value_at(2.1) - 400.0).abs() < 1e-3);
        assert!((v.gain_timeline().value_at(2.0) - 0.5).abs() < 1e-6);
        assert_eq!(v.bus(), Bus::Master);
    }

    #[test]
    fn effect_lengths() {
        assert!((Sfx::Correct.length() - 0.6).abs() < 1e-9);
        assert!((Sfx::Incorrect.length() - 0.45).abs() < 1e-9);
        assert!((Sfx::GameStart.length() - 0.8).abs() < 1e-9);
        assert!((Sfx::GameEnd.length() - 1.45).abs() < 1e-9);
        assert_eq!(Sfx::GameEnd.voices(0.0).count(), 6);
        assert!(Sfx::GameEnd.tones().iter().all(|t| t.wave == Wave::Triangle));
    }

    fn pitches_and_offsets(sfx: Sfx) -> Vec<(f32, f64)> {
        sfx.tones().iter().map(|t| (t.freq, t.offset)).collect()
    }

    #[test]
    fn game_start_is_a_rising_arpeggio() {
        let tones = pitches_and_offsets(Sfx::GameStart);
        let expected = [440.0, 554.0, 659.0, 880.0, 1108.0];
        assert_eq!(tones.len(), expected.len());
        for (i, ((freq, offset), want)) in tones.into_iter().zip(expected).enumerate() {
            assert_eq!(freq, want);
            assert!((offset - 0.1 * i as f64).abs() < 1e-12, "tone {i} at {offset}");
        }
        assert!(Sfx::GameStart.tones().iter().all(|t| t.wave == Wave::Sine && t.duration == 0.4));
    }

    #[test]
    fn correct_climbs_a_major_triad() {
        let tones = pitches_and_offsets(Sfx::Correct);
        assert_eq!(tones, vec![(523.25, 0.0), (659.25, 0.1), (783.99, 0.2)]);
        assert!(Sfx::Correct.tones().iter().all(|t| t.wave == Wave::Sine && t.slide_to.is_none()));

        let incorrect = pitches_and_offsets(Sfx::Incorrect);
        assert_eq!(incorrect, vec![(150.0, 0.0), (100.0, 0.15)]);
    }
}
