//! Benchmarks for SoundFont devices under polyphonic load.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use scoreplay::soundfont::DRUM_BANK;
use scoreplay::synth::MusicDevice;
use uuid::Uuid;

use super::bank;
use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn device(program: u8, bank_number: u16) -> MusicDevice {
    let mut device = MusicDevice::new(Uuid::new_v4(), SAMPLE_RATE, Some(bank()), 1024);
    device.set_program_of_all_channels(program, bank_number);
    device
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");

    for &size in BLOCK_SIZES {
        let (mut l, mut r) = (vec![0.0f32; size], vec![0.0f32; size]);

        // Sustained notes on one channel, up to a full voice pool
        for notes in [1u8, 4, 16] {
            let mut poly = device(0, 0);
            for i in 0..notes {
                poly.send_midi(0x90, 48 + i, 100);
            }
            group.bench_with_input(BenchmarkId::new(format!("sine_x{notes}"), size), &size, |b, _| {
                b.iter(|| poly.process(black_box(&mut l), black_box(&mut r)))
            });
        }

        // A chord on each of eight channels
        let mut wide = device(0, 0);
        for channel in 0..8u8 {
            for pitch in [48, 52, 55, 60] {
                wide.send_midi(0x90 | channel, pitch + channel, 90);
            }
        }
        group.bench_with_input(BenchmarkId::new("eight_channels", size), &size, |b, _| {
            b.iter(|| wide.process(black_box(&mut l), black_box(&mut r)))
        });

        // Drum hits scheduled inside the block split the render into sub-blocks
        let mut drums = device(0, DRUM_BANK);
        group.bench_with_input(BenchmarkId::new("scheduled_hits", size), &size, |b, _| {
            b.iter(|| {
                for (i, key) in [36u8, 38, 42, 46].into_iter().enumerate() {
                    drums.schedule_midi(0x99, key, 100, (i * size / 4) as u32);
                }
                drums.process(black_box(&mut l), black_box(&mut r));
            })
        });
    }

    group.finish();
}
