//! Mute flag persistence.
//!
//! The flag lives under the key [`MUTE_KEY`] in a small JSON key/value file so
//! the host can keep other settings next to it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{AudioError, AudioResult};

pub const MUTE_KEY: &str = "goldfish_muted";

/// Where the mute flag is read from once and written to on every toggle.
pub trait MuteStore {
    /// Stored flag; `false` when nothing was stored yet.
    fn load(&self) -> AudioResult<bool>;
    fn save(&mut self, muted: bool) -> AudioResult<()>;
}

impl<S: MuteStore + ?Sized> MuteStore for Box<S> {
    fn load(&self) -> AudioResult<bool> { (**self).load() }
    fn save(&mut self, muted: bool) -> AudioResult<()> { (**self).save(muted) }
}

/// In-memory store. Clones share the flag, so a test can keep one handle and
/// give the other to the engine.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    muted: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new(muted: bool) -> Self {
        Self { muted: Arc::new(AtomicBool::new(muted)) }
    }

    pub fn get(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }
}

impl MuteStore for MemoryStore {
    fn load(&self) -> AudioResult<bool> {
        Ok(self.get())
    }

    fn save(&mut self, muted: bool) -> AudioResult<()> {
        self.muted.store(muted, Ordering::Release);
        Ok(())
    }
}

/// JSON object on disk, e.g. `{ "goldfish_muted": true }`.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<tmp>/goldfish/settings.json`
    pub fn default_location() -> PathBuf {
        std::env::temp_dir().join("goldfish").join("settings.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> AudioResult<Map<String, Value>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            other => Err(AudioError::Store(format!(
                "{} holds {}, expected a JSON object",
                self.path.display(),
                kind(&other)
            ))),
        }
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl MuteStore for JsonFileStore {
    fn load(&self) -> AudioResult<bool> {
        let map = self.read_map()?;
        Ok(match map.get(MUTE_KEY) {
            Some(Value::Bool(b)) => *b,
            // Written by hosts that store every setting as a string.
            Some(Value::String(s)) => s == "true",
            _ => false,
        })
    }

    fn save(&mut self, muted: bool) -> AudioResult<()> {
        let mut map = self.read_map().unwrap_or_else(|e| {
            log::warn!("Replacing unreadable settings file {}: {}", self.path.display(), e);
            Map::new()
        });
        map.insert(MUTE_KEY.to_owned(), Value::Bool(muted));
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(map))?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_clones_share_state() {
        let probe = MemoryStore::new(false);
        let mut handed_out = probe.clone();
        handed_out.save(true).unwrap();
        assert!(probe.get());
        assert!(probe.load().unwrap());
    }

    #[test]
    fn missing_file_reads_unmuted() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope.json"));
        assert!(!store.load().unwrap());
    }

    #[test]
    fn file_round_trip_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "volume": 7 }"#).unwrap();

        let mut store = JsonFileStore::new(&path);
        store.save(true).unwrap();
        assert!(store.load().unwrap());
        store.save(false).unwrap();
        assert!(!store.load().unwrap());

        let v: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["volume"], 7);
        assert_eq!(v[MUTE_KEY], false);
    }

    #[test]
    fn string_flag_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        fs::write(&path, r#"{ "goldfish_muted": "true" }"#).unwrap();
        assert!(JsonFileStore::new(&path).load().unwrap());
        fs::write(&path, r#"{ "goldfish_muted": "false" }"#).unwrap();
        assert!(!JsonFileStore::new(&path).load().unwrap());
    }

    #[test]
    fn non_object_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(JsonFileStore::new(&path).load(), Err(AudioError::Store(_))));
        // Saving over it recovers.
        let mut store = JsonFileStore::new(&path);
        store.save(true).unwrap();
        assert!(store.load().unwrap());
    }
}
