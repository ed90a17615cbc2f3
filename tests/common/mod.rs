#![allow(dead_code)]

use std::sync::Arc;

use scoreplay::sequencing::{Bar, Chord, Duration, Phrase, Song, TempoTimeline, TimeSignature, Track, TrackKind};
use scoreplay::soundfont::builder::{InstrumentSpec, PresetSpec, SampleSpec};
use scoreplay::soundfont::generator::{
    GEN_EXCLUSIVE_CLASS, GEN_INSTRUMENT, GEN_KEY_RANGE, GEN_RELEASE_VOL_ENV, GEN_SAMPLE_ID, GEN_SAMPLE_MODES,
    GEN_SUSTAIN_VOL_ENV,
};
use scoreplay::soundfont::{GeneratorRecord, SoundFont, SoundFontBuilder, DRUM_BANK};
use scoreplay::{EngineConfig, EngineContext, Sequencer, SequencerEngine};

pub const SAMPLE_RATE: f32 = 44_100.0;

/// Sustaining sine.
pub const SINE_PROGRAM: u8 = 0;
/// Sine zone in exclusive class 1.
pub const EXCLUSIVE_PROGRAM: u8 = 1;
/// Sine zone with a fully attenuated sustain.
pub const SILENT_SUSTAIN_PROGRAM: u8 = 2;

/// A four-preset bank built in memory.
pub fn test_bank() -> Arc<SoundFont> {
    let mut builder = SoundFontBuilder::new("Fixture");
    let sine = builder.add_sample(SampleSpec::sine("sine", 44_100, 69, 441));
    let click = builder.add_sample(SampleSpec::click("click", 44_100, 60, 2_000));

    let looped = |sample: u16, extra: Vec<GeneratorRecord>| {
        let mut zone = vec![GeneratorRecord::range(GEN_KEY_RANGE, 0, 127)];
        zone.extend(extra);
        zone.push(GeneratorRecord::new(GEN_SAMPLE_MODES, 1));
        zone.push(GeneratorRecord::unsigned(GEN_SAMPLE_ID, sample));
        zone
    };

    let instruments = [
        (SINE_PROGRAM, 0, looped(sine, Vec::new())),
        (
            EXCLUSIVE_PROGRAM,
            0,
            looped(sine, vec![GeneratorRecord::new(GEN_EXCLUSIVE_CLASS, 1)]),
        ),
        (
            SILENT_SUSTAIN_PROGRAM,
            0,
            looped(sine, vec![GeneratorRecord::new(GEN_SUSTAIN_VOL_ENV, 1000)]),
        ),
        (0, DRUM_BANK, vec![GeneratorRecord::unsigned(GEN_SAMPLE_ID, click)]),
    ];

    for (index, (program, bank, zone)) in instruments.into_iter().enumerate() {
        let instrument = builder.add_instrument(InstrumentSpec {
            name: format!("inst{index}"),
            global: vec![GeneratorRecord::new(GEN_RELEASE_VOL_ENV, -6000)],
            zones: vec![zone],
        });
        builder.add_preset(PresetSpec {
            name: format!("preset{index}"),
            program: program as u16,
            bank,
            global: Vec::new(),
            zones: vec![vec![GeneratorRecord::unsigned(GEN_INSTRUMENT, instrument)]],
        });
    }

    Arc::new(SoundFont::from_bytes(&builder.build()).expect("fixture bank parses"))
}

pub fn context() -> EngineContext {
    EngineContext::new(EngineConfig::default().with_sample_rate(SAMPLE_RATE)).with_soundfont(test_bank())
}

/// A phrase of the given pitches as quarter notes, padded with rests.
pub fn quarters(pitches: &[u8]) -> Phrase {
    let mut phrase = pitches
        .iter()
        .fold(Phrase::new(), |phrase, &pitch| phrase.chord(Chord::note(Duration::QUARTER, pitch)));
    for _ in pitches.len()..4 {
        phrase = phrase.chord(Chord::rest(Duration::QUARTER));
    }
    phrase
}

/// `bars` bars of 4/4 at `bpm`, one track playing `phrase` in every bar.
pub fn song_with(bars: usize, bpm: u16, phrase: Phrase) -> Song {
    let mut track = Track::new("Lead", TrackKind::Standard).program(SINE_PROGRAM);
    for bar in 0..bars {
        track.set_phrase(0, bar, phrase.clone());
    }
    Song::builder()
        .bars(bars, TimeSignature::FOUR_FOUR)
        .track(track)
        .tempo(TempoTimeline::constant(bpm))
        .build()
        .expect("fixture song is valid")
}

pub fn plain_bars(count: usize) -> Vec<Bar> {
    vec![Bar::new(TimeSignature::FOUR_FOUR); count]
}

pub fn build(song: &Song) -> (Sequencer, SequencerEngine) {
    Sequencer::build(song, context())
}

/// Render `blocks` blocks of `frames` frames.
pub fn run(engine: &mut SequencerEngine, blocks: usize, frames: usize) {
    let (mut l, mut r) = (vec![0.0; frames], vec![0.0; frames]);
    for _ in 0..blocks {
        engine.process(&mut l, &mut r);
    }
}
