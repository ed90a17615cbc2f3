//! Benchmarks for the sequencer rendering a song through the rack.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use scoreplay::sequencing::{
    Bar, Chord, Duration, Note, Phrase, Song, TempoTimeline, TimeSignature, Track, TrackKind,
};
use scoreplay::{EngineConfig, EngineContext, MetronomeSettings, Sequencer};

use super::bank;
use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn eighths(root: u8) -> Phrase {
    (0..8).fold(Phrase::new(), |phrase, i| {
        phrase.chord(
            Chord::note(Duration::EIGHTH, root + (i % 4) * 3)
                .with_note(Note::new(root + 12)),
        )
    })
}

fn beat() -> Phrase {
    [36, 42, 38, 42, 36, 42, 38, 42]
        .into_iter()
        .fold(Phrase::new(), |phrase, hit| phrase.chord(Chord::note(Duration::EIGHTH, hit)))
}

/// Eight bars, four tracks, the first four bars repeated.
fn song() -> Song {
    let mut tracks: Vec<Track> = (0..3)
        .map(|i| Track::new(&format!("Part {i}"), TrackKind::Standard))
        .collect();
    let mut drums = Track::new("Drums", TrackKind::Drums);
    for bar in 0..8 {
        for (i, track) in tracks.iter_mut().enumerate() {
            track.set_phrase(0, bar, eighths(36 + 12 * i as u8));
        }
        drums.set_phrase(0, bar, beat());
    }
    tracks.push(drums);

    let mut builder = Song::builder()
        .bar(Bar::new(TimeSignature::FOUR_FOUR).repeat_start())
        .bars(2, TimeSignature::FOUR_FOUR)
        .bar(Bar::new(TimeSignature::FOUR_FOUR).repeat_end(2))
        .bars(4, TimeSignature::FOUR_FOUR)
        .tempo(TempoTimeline::constant(140));
    for track in tracks {
        builder = builder.track(track);
    }
    builder.build().expect("bench song is valid")
}

pub fn bench_sequencer(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/sequencer");
    let song = song();

    for &size in BLOCK_SIZES {
        let (mut l, mut r) = (vec![0.0f32; size], vec![0.0f32; size]);

        for (name, metronome) in [("song", false), ("song_with_metronome", true)] {
            let config = EngineConfig {
                metronome: MetronomeSettings {
                    enabled: metronome,
                    eighth_click_volume: 0.5,
                    ..MetronomeSettings::default()
                },
                ..EngineConfig::default().with_sample_rate(SAMPLE_RATE)
            };
            let context = EngineContext::new(config).with_soundfont(bank());
            let (mut sequencer, mut engine) = Sequencer::build(&song, context);
            let _ = sequencer.set_loop_start_indicator(0, 0);
            let _ = sequencer.set_loop_end_indicator(7, 1920);
            let _ = sequencer.set_loop_playback_enabled(true);
            let _ = sequencer.jump_to(0, 0);
            let _ = sequencer.start_playback();

            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| engine.process(black_box(&mut l), black_box(&mut r)))
            });
        }
    }

    group.finish();
}
