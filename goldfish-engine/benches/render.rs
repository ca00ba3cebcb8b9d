//! Render-path benchmarks.
//!
//! Run with: cargo bench -p goldfish-engine
//!
//! At 48 kHz a 512-frame block has a 10.67 ms deadline; the full soundtrack
//! (rumble, beats, reverb) should stay far below that.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::SmallRng, SeedableRng};

use goldfish_engine::reverb::{create_impulse_response, Convolver};
use goldfish_engine::{AudioEngine, Drive, EngineConfig, MemoryStore, OfflineBackend};

const SAMPLE_RATE: f32 = 48_000.0;
const BLOCK_SIZES: &[usize] = &[128, 256, 512];

fn bench_convolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverb/convolver");
    let mut rng = SmallRng::seed_from_u64(1);
    let ir = create_impulse_response(SAMPLE_RATE, 2.0, 2.0, &mut rng);

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.05).sin() * 0.2).collect();
        let mut l = vec![0.0; size];
        let mut r = vec![0.0; size];
        let mut conv = Convolver::new(&ir);
        group.bench_with_input(BenchmarkId::new("two_seconds", size), &size, |b, _| {
            b.iter(|| {
                conv.process(black_box(&input), &mut l, &mut r);
                l[0] + r[0]
            })
        });
    }
    group.finish();
}

fn bench_soundtrack(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/soundtrack");

    for &size in BLOCK_SIZES {
        let cfg = EngineConfig { drive: Drive::Manual, seed: Some(7), ..EngineConfig::default() };
        let mut engine = AudioEngine::new(cfg, OfflineBackend::new(SAMPLE_RATE), MemoryStore::default());
        engine.init_audio();
        let Some(ctx) = engine.get_context() else { return };
        let mut out = vec![0.0; size * 2];
        group.bench_with_input(BenchmarkId::new("stereo_block", size), &size, |b, _| {
            b.iter(|| {
                ctx.render(black_box(&mut out), 2);
                engine.pump();
                out[0]
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_convolver, bench_soundtrack);
criterion_main!(benches);
