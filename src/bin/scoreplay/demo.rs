//! Demo song and a synthesized fallback bank

use scoreplay::sequencing::{
    Bar, Chord, DirectionJump, DirectionTarget, Duration, Dynamics, Note, Phrase, Song, SongError, TempoTimeline,
    TimeSignature, Track, TrackKind,
};
use scoreplay::soundfont::builder::{InstrumentSpec, PresetSpec, SampleSpec};
use scoreplay::soundfont::generator::{
    GEN_ATTACK_VOL_ENV, GEN_DECAY_VOL_ENV, GEN_INSTRUMENT, GEN_RELEASE_VOL_ENV, GEN_SAMPLE_ID, GEN_SAMPLE_MODES,
    GEN_SUSTAIN_VOL_ENV,
};
use scoreplay::soundfont::{GeneratorRecord, SoundFont, SoundFontBuilder, DRUM_BANK};
use scoreplay::SoundFontError;

const LEAD_PROGRAM: u8 = 0;
const BASS_PROGRAM: u8 = 33;

fn quarters(pitches: [u8; 4]) -> Phrase {
    pitches
        .into_iter()
        .fold(Phrase::new(), |phrase, pitch| phrase.chord(Chord::note(Duration::QUARTER, pitch)))
}

fn beat() -> Phrase {
    // kick, snare, kick, snare; closed hi-hat on every beat
    [36, 38, 36, 38].into_iter().fold(Phrase::new(), |phrase, hit| {
        phrase.chord(
            Chord::note(Duration::QUARTER, hit)
                .with_note(Note::new(42))
                .with_dynamics(Dynamics::F),
        )
    })
}

/// Four bars: a repeated opening, then a Da Capo back to the Fine at bar 2.
///
/// Performed as 1 2 1 2 3 4 1 2.
pub fn song() -> Result<Song, SongError> {
    let lead_lines = [[60, 64, 67, 64], [65, 69, 72, 69], [67, 71, 74, 71], [72, 67, 64, 60]];
    let bass_lines = [[36, 36, 43, 43], [41, 41, 45, 45], [43, 43, 38, 38], [36, 43, 36, 36]];

    let mut lead = Track::new("Lead", TrackKind::Standard).program(LEAD_PROGRAM);
    let mut bass = Track::new("Bass", TrackKind::Standard).program(BASS_PROGRAM);
    let mut drums = Track::new("Drums", TrackKind::Drums);
    for bar in 0..4 {
        lead.set_phrase(0, bar, quarters(lead_lines[bar]));
        bass.set_phrase(0, bar, quarters(bass_lines[bar]));
        drums.set_phrase(0, bar, beat());
    }

    Song::builder()
        .bar(Bar::new(TimeSignature::FOUR_FOUR).repeat_start())
        .bar(Bar::new(TimeSignature::FOUR_FOUR).repeat_end(2).target(DirectionTarget::Fine))
        .bar(Bar::new(TimeSignature::FOUR_FOUR))
        .bar(Bar::new(TimeSignature::FOUR_FOUR).jump(DirectionJump::DaCapoAlFine))
        .track(lead)
        .track(bass)
        .track(drums)
        .tempo(TempoTimeline::constant(110))
        .build()
}

/// A tiny bank covering the demo's programs: sine tones and a noise kit.
pub fn fallback_soundfont() -> Result<SoundFont, SoundFontError> {
    let mut builder = SoundFontBuilder::new("scoreplay fallback");

    // 44 kHz keeps a whole number of A4 cycles in the loop
    let tone = builder.add_sample(SampleSpec::sine("tone", 44_000, 69, 1_000));
    let noise = builder.add_sample(SampleSpec::click("noise", 44_000, 60, 6_000));

    let envelope = vec![
        GeneratorRecord::new(GEN_ATTACK_VOL_ENV, -6000),
        GeneratorRecord::new(GEN_DECAY_VOL_ENV, 1200),
        GeneratorRecord::new(GEN_SUSTAIN_VOL_ENV, 300),
        GeneratorRecord::new(GEN_RELEASE_VOL_ENV, -1200),
    ];
    let sine = builder.add_instrument(InstrumentSpec {
        name: "sine".to_string(),
        global: envelope,
        zones: vec![vec![
            GeneratorRecord::new(GEN_SAMPLE_MODES, 1),
            GeneratorRecord::unsigned(GEN_SAMPLE_ID, tone),
        ]],
    });
    let kit = builder.add_instrument(InstrumentSpec {
        name: "kit".to_string(),
        global: Vec::new(),
        zones: vec![vec![GeneratorRecord::unsigned(GEN_SAMPLE_ID, noise)]],
    });

    for (name, program, bank, instrument) in [
        ("Lead", LEAD_PROGRAM, 0, sine),
        ("Bass", BASS_PROGRAM, 0, sine),
        ("Kit", 0, DRUM_BANK, kit),
    ] {
        builder.add_preset(PresetSpec {
            name: name.to_string(),
            program: program as u16,
            bank,
            global: Vec::new(),
            zones: vec![vec![GeneratorRecord::unsigned(GEN_INSTRUMENT, instrument)]],
        });
    }

    SoundFont::from_bytes(&builder.build())
}
