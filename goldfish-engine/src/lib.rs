//! Goldfish Engine: procedural soundtrack and game sounds for the goldfish quiz.
//!
//! Crate layout:
//! - [`engine`]    : `AudioEngine`, the facade the game talks to
//! - [`context`]   : audio clock, power state, shared render graph handle
//! - [`graph`]     : voices, buses, the `Generator` trait
//! - [`nodes`]     : oscillators and buffer sources
//! - [`reverb`]    : synthetic impulse response + FFT convolver
//! - [`pattern`]   : the 16-step beat pattern
//! - [`scheduler`] : lookahead beat scheduler and its ticker thread
//! - [`layers`]    : soundtrack instruments (rumble, shaker, kick, marimba, bubble)
//! - [`sfx`]       : one-shot game effects
//! - [`store`]     : mute flag persistence
//! - [`backend`]   : offline and cpal outputs
//! - [`config`], [`error`]
//!
//! Features
//! - `realtime` (default): cpal output backend
//! - `fast-math`: forwarded to `goldfish-core`

pub mod backend;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod layers;
pub mod nodes;
pub mod pattern;
pub mod reverb;
pub mod scheduler;
pub mod sfx;
pub mod store;

pub use backend::{AudioBackend, OfflineBackend};
pub use config::{Drive, EngineConfig};
pub use context::{AudioContext, ContextState};
pub use engine::AudioEngine;
pub use error::{AudioError, AudioResult};
pub use graph::{Bus, Generator, SourceId, VoiceSpec};
pub use sfx::Sfx;
pub use store::{JsonFileStore, MemoryStore, MuteStore};

cfg_if::cfg_if! {
    if #[cfg(feature = "realtime")] {
        pub use backend::{list_output_devices, CpalBackend};

        /// Backend used when the host does not pick one.
        pub type DefaultBackend = CpalBackend;
    } else {
        /// Backend used when the host does not pick one.
        pub type DefaultBackend = OfflineBackend;
    }
}
