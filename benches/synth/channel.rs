//! Benchmarks for a single channel playing plain looped samples.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use scoreplay::synth::{MonoSample, SynthChannel, Waveform};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn channel(waveform: Waveform) -> SynthChannel {
    let mut channel = SynthChannel::new(SAMPLE_RATE);
    channel.set_sample(Arc::new(MonoSample::single_cycle(waveform, 256, SAMPLE_RATE)));
    channel
}

pub fn bench_channel(c: &mut Criterion) {
    let mut group = c.benchmark_group("synth/channel");

    for &size in BLOCK_SIZES {
        let (mut l, mut r) = (vec![0.0f32; size], vec![0.0f32; size]);

        // One held note: the cost floor of a sounding voice
        let mut single = channel(Waveform::Saw);
        single.note_on(None, 57, 100);
        group.bench_with_input(BenchmarkId::new("single_note", size), &size, |b, _| {
            b.iter(|| single.process(&[], black_box(&mut l), black_box(&mut r), 1.0, 0.5))
        });

        // A four-note chord
        let mut chord = channel(Waveform::Sine);
        for pitch in [48, 55, 60, 64] {
            chord.note_on(None, pitch, 100);
        }
        group.bench_with_input(BenchmarkId::new("chord_4", size), &size, |b, _| {
            b.iter(|| chord.process(&[], black_box(&mut l), black_box(&mut r), 1.0, 0.5))
        });

        // Retriggering every block puts a crossfade at the head of each block
        let mut retrigger = channel(Waveform::Pulse);
        group.bench_with_input(BenchmarkId::new("retrigger", size), &size, |b, _| {
            b.iter(|| {
                retrigger.note_on(None, 60, 100);
                retrigger.process(&[], black_box(&mut l), black_box(&mut r), 1.0, 0.5);
            })
        });
    }

    group.finish();
}
