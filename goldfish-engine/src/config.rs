//! Engine configuration.
//!
//! Every field has a default matching the shipped soundtrack, so an empty
//! JSON object (or no file at all) is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, AudioResult};

/// How scheduler passes are driven once BGM is running.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Drive {
    /// A background ticker thread wakes every `lookahead_ms`.
    #[default]
    Threaded,
    /// The host calls [`AudioEngine::pump`](crate::engine::AudioEngine::pump) itself.
    Manual,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Beats per minute; the scheduler steps in 8th notes.
    pub tempo_bpm: f64,
    /// Ticker wake-up interval.
    pub lookahead_ms: u64,
    /// How far ahead of the audio clock beats are placed.
    pub schedule_ahead_s: f64,
    /// Delay between `start_bgm` and the first beat.
    pub start_offset_s: f64,
    /// Fixed level of the soundtrack sub-mix under master.
    pub bgm_level: f32,
    /// Time constant of the master gain ramp on mute toggles.
    pub mute_ramp_tau_s: f64,
    pub reverb_duration_s: f64,
    pub reverb_decay: f64,
    /// Sample rate used by the offline backend.
    pub offline_sample_rate: u32,
    /// Seed for every random choice; `None` draws from the OS.
    pub seed: Option<u64>,
    pub drive: Drive,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: 105.0,
            lookahead_ms: 25,
            schedule_ahead_s: 0.1,
            start_offset_s: 0.1,
            bgm_level: 0.12,
            mute_ramp_tau_s: 0.2,
            reverb_duration_s: 2.0,
            reverb_decay: 2.0,
            offline_sample_rate: 48_000,
            seed: None,
            drive: Drive::Threaded,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> AudioResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> AudioResult<()> {
        let positive = [
            ("tempo_bpm", self.tempo_bpm),
            ("schedule_ahead_s", self.schedule_ahead_s),
            ("reverb_duration_s", self.reverb_duration_s),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(AudioError::Config(format!("{name} must be positive, got {v}")));
            }
        }
        if self.lookahead_ms == 0 {
            return Err(AudioError::Config("lookahead_ms must be at least 1".into()));
        }
        if !(self.start_offset_s.is_finite() && self.start_offset_s >= 0.0) {
            return Err(AudioError::Config(format!(
                "start_offset_s must be non-negative, got {}",
                self.start_offset_s
            )));
        }
        if !(0.0..=1.0).contains(&self.bgm_level) {
            return Err(AudioError::Config(format!("bgm_level must be in [0, 1], got {}", self.bgm_level)));
        }
        if self.offline_sample_rate == 0 {
            return Err(AudioError::Config("offline_sample_rate must be non-zero".into()));
        }
        Ok(())
    }

    #[inline]
    pub fn lookahead(&self) -> Duration {
        Duration::from_millis(self.lookahead_ms)
    }
}
