//! Benchmarks for the DAHDSR volume envelope.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use scoreplay::soundfont::EnvelopeParams;
use scoreplay::synth::VolumeEnvelope;

use crate::BLOCK_SIZES;

fn params() -> EnvelopeParams {
    EnvelopeParams {
        delay: 0.0,
        attack: 4_410.0,
        hold: 0.0,
        decay: 4_410.0,
        sustain: 0.7,
        release: 13_230.0,
    }
}

fn run(env: &mut VolumeEnvelope, gate: bool, buffer: &mut [f32]) {
    for sample in buffer.iter_mut() {
        *sample = env.level(gate).unwrap_or(0.0);
        env.advance(1.0);
    }
}

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("synth/envelope");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Attack phase (ramping up)
        let mut env = VolumeEnvelope::new(params());
        group.bench_with_input(BenchmarkId::new("attack", size), &size, |b, _| {
            b.iter(|| run(black_box(&mut env), true, black_box(&mut buffer)))
        });

        // Sustain phase (holding steady)
        let mut env = VolumeEnvelope::new(params());
        let mut skip = vec![0.0f32; 10_000];
        run(&mut env, true, &mut skip);
        group.bench_with_input(BenchmarkId::new("sustain", size), &size, |b, _| {
            b.iter(|| run(black_box(&mut env), true, black_box(&mut buffer)))
        });

        // Release phase (ramping down)
        let mut env = VolumeEnvelope::new(params());
        run(&mut env, true, &mut skip);
        group.bench_with_input(BenchmarkId::new("release", size), &size, |b, _| {
            b.iter(|| run(black_box(&mut env), false, black_box(&mut buffer)))
        });
    }

    group.finish();
}
