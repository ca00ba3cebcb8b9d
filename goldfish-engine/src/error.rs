//! Error type shared by the engine layers.
//!
//! Application-facing entry points on [`AudioEngine`](crate::engine::AudioEngine)
//! never return these: audio is cosmetic, so failures are logged and the
//! operation degrades to silence. Lower layers propagate with `?`.

use thiserror::Error;

use crate::graph::SourceId;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio output is not available: {0}")]
    Unsupported(String),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("source {0} was already stopped")]
    AlreadyStopped(SourceId),

    #[error("unknown source {0}")]
    UnknownSource(SourceId),

    #[error("mute store error: {0}")]
    Store(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;
