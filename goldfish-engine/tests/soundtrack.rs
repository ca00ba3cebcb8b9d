use std::thread;
use std::time::Duration;

use goldfish_engine::{AudioEngine, Drive, EngineConfig, MemoryStore, OfflineBackend};

const SR: f32 = 8_000.0;

fn engine(drive: Drive) -> AudioEngine<OfflineBackend, MemoryStore> {
    let cfg = EngineConfig { drive, seed: Some(11), ..EngineConfig::default() };
    AudioEngine::new(cfg, OfflineBackend::new(SR), MemoryStore::default())
}

#[test]
fn start_and_stop_are_symmetric() {
    let mut e = engine(Drive::Manual);
    // Stop before anything exists is fine.
    e.stop_bgm();

    e.init_audio();
    let ctx = e.get_context().unwrap();
    assert_eq!(ctx.active_looping_sources(), 1);
    let rumble = e.rumble_source().unwrap();
    assert!(ctx.is_active(rumble));

    // Starting again does not stack a second rumble.
    e.start_bgm();
    assert_eq!(ctx.active_looping_sources(), 1);

    e.stop_bgm();
    assert_eq!(ctx.active_looping_sources(), 0);
    assert!(!ctx.is_active(rumble));
    e.stop_bgm();
    e.stop_bgm();
    assert!(!e.is_bgm_playing());

    e.start_bgm();
    assert_eq!(ctx.active_looping_sources(), 1);
    assert_ne!(e.rumble_source(), Some(rumble));
}

#[test]
fn restart_places_first_beat_after_the_offset() {
    let mut e = engine(Drive::Manual);
    e.init_audio();
    let ctx = e.get_context().unwrap();
    ctx.render_frames(8_000);
    e.pump();
    e.stop_bgm();

    ctx.render_frames(1_000);
    let now = ctx.current_time();
    e.start_bgm();
    let (next, step) = e.scheduler_position();
    assert_eq!(step, 0);
    assert!((next - (now + 0.1)).abs() < 1e-9);
}

#[test]
fn soundtrack_is_audible_and_bounded() {
    let mut e = engine(Drive::Manual);
    e.init_audio();
    let ctx = e.get_context().unwrap();
    let mut peak = 0.0_f32;
    let mut energy = 0.0_f64;
    // Four seconds in 25 ms blocks.
    for _ in 0..160 {
        let block = ctx.render_frames(200);
        e.pump();
        for s in block {
            assert!(s.is_finite() && s.abs() <= 1.0);
            peak = peak.max(s.abs());
            energy += f64::from(s * s);
        }
    }
    assert!(peak > 0.01, "peak={peak}");
    assert!(energy > 0.0);
}

#[test]
fn threaded_drive_keeps_scheduling() {
    let mut e = engine(Drive::Threaded);
    e.init_audio();
    let ctx = e.get_context().unwrap();
    let (first_next, _) = e.scheduler_position();

    // Advance the clock from the test thread while the ticker keeps up.
    for _ in 0..40 {
        ctx.render_frames(200);
        thread::sleep(Duration::from_millis(5));
    }
    thread::sleep(Duration::from_millis(60));
    let (next, _) = e.scheduler_position();
    assert!(next > first_next, "ticker never advanced the scheduler");
    assert!(next < ctx.current_time() + 0.1 + 0.3);

    e.stop_bgm();
    let (stopped_at, _) = e.scheduler_position();
    ctx.render_frames(8_000);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(e.scheduler_position().0, stopped_at);
}
