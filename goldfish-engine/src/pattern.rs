//! The soundtrack's beat pattern: which layers fire on which step.
//!
//! A loop is 16 eighth-note steps. Shaker on every step, kick on every
//! quarter of the loop, a marimba note that is twice as likely on off-beats,
//! and a rare bubble anywhere.

use rand::seq::SliceRandom;
use rand::Rng;

/// Steps per loop.
pub const STEPS_PER_LOOP: u32 = 16;

/// Pentatonic marimba notes (Hz), C5 up to C6.
pub const MELODY_SCALE: [f32; 6] = [523.25, 587.33, 659.25, 783.99, 880.0, 1046.5];

pub const SHAKER_ON_BEAT: f32 = 0.04;
pub const SHAKER_OFF_BEAT: f32 = 0.03;

pub const MELODY_CHANCE_ON_BEAT: f64 = 0.3;
pub const MELODY_CHANCE_OFF_BEAT: f64 = 0.6;

pub const BUBBLE_CHANCE: f64 = 0.05;

#[inline]
fn on_beat(step: u32) -> bool { step % 2 == 0 }

/// Shaker level for `step`; accented on even steps.
#[inline]
pub fn shaker_level(step: u32) -> f32 {
    if on_beat(step) { SHAKER_ON_BEAT } else { SHAKER_OFF_BEAT }
}

#[inline]
pub fn has_kick(step: u32) -> bool { step % 4 == 0 }

/// Probability of a marimba note on `step`.
#[inline]
pub fn melody_chance(step: u32) -> f64 {
    if on_beat(step) { MELODY_CHANCE_ON_BEAT } else { MELODY_CHANCE_OFF_BEAT }
}

/// Everything that sounds on one step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BeatPlan {
    pub step: u32,
    /// Shaker level (always present).
    pub shaker: f32,
    pub kick: bool,
    /// Marimba note frequency, if one was drawn.
    pub melody: Option<f32>,
    pub bubble: bool,
}

/// Roll the dice for `step`.
pub fn plan_beat<R: Rng + ?Sized>(step: u32, rng: &mut R) -> BeatPlan {
    let melody = if rng.gen_bool(melody_chance(step)) {
        MELODY_SCALE.choose(rng).copied()
    } else {
        None
    };
    BeatPlan {
        step,
        shaker: shaker_level(step),
        kick: has_kick(step),
        melody,
        bubble: rng.gen_bool(BUBBLE_CHANCE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn kick_and_shaker_placement() {
        let mut rng = SmallRng::seed_from_u64(7);
        let plans: Vec<BeatPlan> = (0..STEPS_PER_LOOP).map(|s| plan_beat(s, &mut rng)).collect();
        let kicks: Vec<u32> = plans.iter().filter(|p| p.kick).map(|p| p.step).collect();
        assert_eq!(kicks, vec![0, 4, 8, 12]);
        for p in &plans {
            let want = if p.step % 2 == 0 { 0.04 } else { 0.03 };
            assert_eq!(p.shaker, want);
        }
    }

    #[test]
    fn melody_notes_come_from_the_scale() {
        let mut rng = SmallRng::seed_from_u64(11);
        for i in 0..2_000 {
            if let Some(f) = plan_beat(i % STEPS_PER_LOOP, &mut rng).melody {
                assert!(MELODY_SCALE.contains(&f));
            }
        }
    }

    #[test]
    fn melody_and_bubble_rates() {
        let mut rng = SmallRng::seed_from_u64(42);
        let trials = 20_000;
        let (mut even, mut odd, mut bubbles) = (0, 0, 0);
        for _ in 0..trials {
            if plan_beat(2, &mut rng).melody.is_some() { even += 1; }
            let p = plan_beat(3, &mut rng);
            if p.melody.is_some() { odd += 1; }
            if p.bubble { bubbles += 1; }
        }
        let even = even as f64 / trials as f64;
        let odd = odd as f64 / trials as f64;
        let bubbles = bubbles as f64 / trials as f64;
        assert!((even - 0.3).abs() < 0.02, "even={even}");
        assert!((odd - 0.6).abs() < 0.02, "odd={odd}");
        assert!((bubbles - 0.05).abs() < 0.01, "bubbles={bubbles}");
    }
}
