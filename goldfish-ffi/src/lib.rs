//! C ABI wrapper for the goldfish quiz audio engine.
//!
//! Exposes the engine's entry points to a non-Rust UI shell: create/destroy a
//! handle, the user-gesture init, mute toggling, soundtrack start/stop and the
//! one-shot game sounds.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `GoldfishAudio` (heap-allocated; you own/delete it).
//! - Every function accepts a null handle and does nothing.
//! - `goldfish_audio_create` plays on the default output device. Hosts that run
//!   their own audio callback use `goldfish_audio_create_offline` and pull
//!   samples with `goldfish_audio_render_interleaved_f32`.
//!
//! Threading
//! - The object is NOT thread-safe; call all functions from the same thread.

use std::ffi::{c_char, CStr};
use std::path::PathBuf;

use goldfish_engine::{
    AudioEngine, CpalBackend, Drive, EngineConfig, JsonFileStore, MemoryStore, MuteStore,
    OfflineBackend,
};

type Store = Box<dyn MuteStore>;

enum Inner {
    Device(AudioEngine<CpalBackend, Store>),
    Offline(AudioEngine<OfflineBackend, Store>),
}

/// Runs `$body` against whichever engine the handle wraps.
macro_rules! with_engine {
    ($handle:expr, |$e:ident| $body:expr) => {
        match $handle {
            Inner::Device($e) => $body,
            Inner::Offline($e) => $body,
        }
    };
}

/// Opaque engine wrapper handed to C.
pub struct GoldfishAudio {
    inner: Inner,
}

/// JSON settings file at `path`, or an in-memory flag when `path` is null.
fn store_from(path: *const c_char) -> Store {
    if path.is_null() {
        return Box::new(MemoryStore::default());
    }
    let path = unsafe { CStr::from_ptr(path) };
    match path.to_str() {
        Ok(p) => Box::new(JsonFileStore::new(PathBuf::from(p))),
        Err(_) => {
            log::warn!("store path is not UTF-8; the mute flag will not persist");
            Box::new(MemoryStore::default())
        }
    }
}

fn into_handle(inner: Inner) -> *mut GoldfishAudio {
    Box::into_raw(Box::new(GoldfishAudio { inner }))
}

/// # Safety
/// `handle` is null or came from one of the create functions and was not destroyed.
unsafe fn handle_mut<'a>(handle: *mut GoldfishAudio) -> Option<&'a mut Inner> {
    unsafe { handle.as_mut() }.map(|h| &mut h.inner)
}

// --- Creation / destruction -------------------------------------------------------

/// Engine on the default output device. `store_path` (nullable, UTF-8) is the
/// settings file holding the mute flag. Audio is not opened until
/// `goldfish_audio_init` or another call needs it.
#[no_mangle]
pub extern "C" fn goldfish_audio_create(store_path: *const c_char) -> *mut GoldfishAudio {
    let engine = AudioEngine::new(EngineConfig::default(), CpalBackend::new(), store_from(store_path));
    into_handle(Inner::Device(engine))
}

/// Engine without a device, rendered by the host at `sample_rate`.
#[no_mangle]
pub extern "C" fn goldfish_audio_create_offline(store_path: *const c_char, sample_rate: u32) -> *mut GoldfishAudio {
    let cfg = EngineConfig { drive: Drive::Manual, ..EngineConfig::default() };
    let backend = OfflineBackend::new(sample_rate.max(1) as f32);
    let engine = AudioEngine::new(cfg, backend, store_from(store_path));
    into_handle(Inner::Offline(engine))
}

/// Destroy a handle returned by one of the create functions.
#[no_mangle]
pub extern "C" fn goldfish_audio_destroy(handle: *mut GoldfishAudio) {
    if !handle.is_null() {
        unsafe { drop(Box::from_raw(handle)); }
    }
}

// --- Entry points -----------------------------------------------------------------

/// Call from the first user gesture: opens and resumes audio, starts the music unless muted.
#[no_mangle]
pub extern "C" fn goldfish_audio_init(handle: *mut GoldfishAudio) {
    if let Some(inner) = unsafe { handle_mut(handle) } {
        with_engine!(inner, |e| e.init_audio());
    }
}

/// Flip and persist the mute flag. Returns the new state (`false` for a null handle).
#[no_mangle]
pub extern "C" fn goldfish_audio_toggle_mute(handle: *mut GoldfishAudio) -> bool {
    match unsafe { handle_mut(handle) } {
        Some(inner) => with_engine!(inner, |e| e.toggle_mute()),
        None => false,
    }
}

#[no_mangle]
pub extern "C" fn goldfish_audio_get_mute_state(handle: *mut GoldfishAudio) -> bool {
    match unsafe { handle_mut(handle) } {
        Some(inner) => with_engine!(inner, |e| e.get_mute_state()),
        None => false,
    }
}

#[no_mangle]
pub extern "C" fn goldfish_audio_start_bgm(handle: *mut GoldfishAudio) {
    if let Some(inner) = unsafe { handle_mut(handle) } {
        with_engine!(inner, |e| e.start_bgm());
    }
}

#[no_mangle]
pub extern "C" fn goldfish_audio_stop_bgm(handle: *mut GoldfishAudio) {
    if let Some(inner) = unsafe { handle_mut(handle) } {
        with_engine!(inner, |e| e.stop_bgm());
    }
}

#[no_mangle]
pub extern "C" fn goldfish_audio_play_click(handle: *mut GoldfishAudio) {
    if let Some(inner) = unsafe { handle_mut(handle) } {
        with_engine!(inner, |e| e.play_click());
    }
}

#[no_mangle]
pub extern "C" fn goldfish_audio_play_correct(handle: *mut GoldfishAudio) {
    if let Some(inner) = unsafe { handle_mut(handle) } {
        with_engine!(inner, |e| e.play_correct());
    }
}

#[no_mangle]
pub extern "C" fn goldfish_audio_play_incorrect(handle: *mut GoldfishAudio) {
    if let Some(inner) = unsafe { handle_mut(handle) } {
        with_engine!(inner, |e| e.play_incorrect());
    }
}

#[no_mangle]
pub extern "C" fn goldfish_audio_play_game_start(handle: *mut GoldfishAudio) {
    if let Some(inner) = unsafe { handle_mut(handle) } {
        with_engine!(inner, |e| e.play_game_start());
    }
}

#[no_mangle]
pub extern "C" fn goldfish_audio_play_game_end(handle: *mut GoldfishAudio) {
    if let Some(inner) = unsafe { handle_mut(handle) } {
        with_engine!(inner, |e| e.play_game_end());
    }
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` of audio into an interleaved f32 buffer with `channels`
/// channels and run a scheduler pass. Only offline handles render; device
/// handles are driven by their own stream.
///
/// Returns the number of frames rendered (0 on error or for device handles).
#[no_mangle]
pub extern "C" fn goldfish_audio_render_interleaved_f32(
    handle: *mut GoldfishAudio,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    if out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let Some(Inner::Offline(engine)) = (unsafe { handle_mut(handle) }) else {
        return 0;
    };
    let out = unsafe {
        std::slice::from_raw_parts_mut(out_interleaved, (frames as usize) * (channels as usize))
    };
    match engine.context() {
        Some(ctx) => ctx.render(out, channels as usize),
        None => out.fill(0.0),
    }
    engine.pump();
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;

    #[test]
    fn null_handles_are_ignored() {
        goldfish_audio_init(ptr::null_mut());
        goldfish_audio_start_bgm(ptr::null_mut());
        goldfish_audio_play_click(ptr::null_mut());
        assert!(!goldfish_audio_toggle_mute(ptr::null_mut()));
        assert!(!goldfish_audio_get_mute_state(ptr::null_mut()));
        goldfish_audio_destroy(ptr::null_mut());
    }

    #[test]
    fn offline_handle_plays_and_renders() {
        let h = goldfish_audio_create_offline(ptr::null(), 8_000);
        let mut buf = vec![0.0_f32; 400];
        // Before init the context does not exist yet.
        assert_eq!(goldfish_audio_render_interleaved_f32(h, buf.as_mut_ptr(), 200, 2), 200);
        assert!(buf.iter().all(|&s| s == 0.0));

        goldfish_audio_init(h);
        goldfish_audio_play_game_start(h);
        let mut peak = 0.0_f32;
        for _ in 0..40 {
            goldfish_audio_render_interleaved_f32(h, buf.as_mut_ptr(), 200, 2);
            peak = buf.iter().fold(peak, |p, s| p.max(s.abs()));
        }
        assert!(peak > 0.01);
        goldfish_audio_stop_bgm(h);
        goldfish_audio_destroy(h);
    }

    #[test]
    fn mute_flag_persists_through_the_store_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = CString::new(dir.path().join("settings.json").to_str().unwrap()).unwrap();

        let h = goldfish_audio_create_offline(path.as_ptr(), 8_000);
        assert!(!goldfish_audio_get_mute_state(h));
        assert!(goldfish_audio_toggle_mute(h));
        goldfish_audio_destroy(h);

        let h = goldfish_audio_create_offline(path.as_ptr(), 8_000);
        assert!(goldfish_audio_get_mute_state(h));
        goldfish_audio_destroy(h);
    }
}
