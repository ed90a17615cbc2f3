//! Symbolic song model: bars with form directions, tracks of voiced chords.
//!
//! Phrases are stored per bar; chord positions inside a bar are implied by
//! the running sum of chord durations.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::duration::Duration;
use super::tempo::TempoTimeline;
use super::time_signature::TimeSignature;
use crate::PPQ;

/// Jump instruction written on a bar. Discriminants are bit positions in
/// [`Bar::direction_jumps`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionJump {
    DaCapo = 0,
    DaCapoAlFine = 1,
    DaCapoAlCoda = 2,
    DaCapoAlDoubleCoda = 3,
    DalSegno = 4,
    DalSegnoAlFine = 5,
    DalSegnoAlCoda = 6,
    DalSegnoAlDoubleCoda = 7,
    DalSegnoSegno = 8,
    DalSegnoSegnoAlFine = 9,
    DalSegnoSegnoAlCoda = 10,
    DalSegnoSegnoAlDoubleCoda = 11,
    ToCoda = 12,
    ToDoubleCoda = 13,
}

impl DirectionJump {
    pub const COUNT: usize = 14;

    pub const ALL: [DirectionJump; Self::COUNT] = [
        DirectionJump::DaCapo,
        DirectionJump::DaCapoAlFine,
        DirectionJump::DaCapoAlCoda,
        DirectionJump::DaCapoAlDoubleCoda,
        DirectionJump::DalSegno,
        DirectionJump::DalSegnoAlFine,
        DirectionJump::DalSegnoAlCoda,
        DirectionJump::DalSegnoAlDoubleCoda,
        DirectionJump::DalSegnoSegno,
        DirectionJump::DalSegnoSegnoAlFine,
        DirectionJump::DalSegnoSegnoAlCoda,
        DirectionJump::DalSegnoSegnoAlDoubleCoda,
        DirectionJump::ToCoda,
        DirectionJump::ToDoubleCoda,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Landing mark written on a bar. Discriminants are bit positions in
/// [`Bar::direction_targets`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionTarget {
    Coda = 0,
    DoubleCoda = 1,
    Segno = 2,
    SegnoSegno = 3,
    Fine = 4,
}

impl DirectionTarget {
    pub const COUNT: usize = 5;

    pub const ALL: [DirectionTarget; Self::COUNT] = [
        DirectionTarget::Coda,
        DirectionTarget::DoubleCoda,
        DirectionTarget::Segno,
        DirectionTarget::SegnoSegno,
        DirectionTarget::Fine,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bar {
    pub time_signature: TimeSignature,
    pub repeat_start: bool,
    pub repeat_end: bool,
    /// Total plays of a repeated section; values below 2 mean 2.
    pub repeat_count: u8,
    /// Bit `i` set: this bar belongs to ending `i + 1`.
    pub alternate_endings: u8,
    pub direction_jumps: u16,
    pub direction_targets: u8,
}

impl Bar {
    pub fn new(time_signature: TimeSignature) -> Self {
        Self {
            time_signature,
            ..Self::default()
        }
    }

    pub fn repeat_start(mut self) -> Self {
        self.repeat_start = true;
        self
    }

    pub fn repeat_end(mut self, count: u8) -> Self {
        self.repeat_end = true;
        self.repeat_count = count;
        self
    }

    /// Mark this bar as part of the given 1-based endings.
    pub fn alternate_ending(mut self, endings: &[u8]) -> Self {
        for ending in endings {
            if (1..=8).contains(ending) {
                self.alternate_endings |= 1 << (ending - 1);
            }
        }
        self
    }

    pub fn jump(mut self, jump: DirectionJump) -> Self {
        self.direction_jumps |= jump.bit();
        self
    }

    pub fn target(mut self, target: DirectionTarget) -> Self {
        self.direction_targets |= target.bit();
        self
    }

    pub fn has_jump(&self, jump: DirectionJump) -> bool {
        self.direction_jumps & jump.bit() != 0
    }

    pub fn has_target(&self, target: DirectionTarget) -> bool {
        self.direction_targets & target.bit() != 0
    }

    pub fn has_alternate_endings(&self) -> bool {
        self.alternate_endings != 0
    }

    pub fn duration_ticks(&self) -> u32 {
        self.time_signature.bar_ticks(PPQ)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dynamics {
    #[default]
    Undefined,
    Ppp,
    Pp,
    P,
    Mp,
    Mf,
    F,
    Ff,
    Fff,
}

impl Dynamics {
    pub fn velocity(self) -> u8 {
        match self {
            Dynamics::Undefined => 90,
            Dynamics::Ppp => 13,
            Dynamics::Pp => 26,
            Dynamics::P => 39,
            Dynamics::Mp => 52,
            Dynamics::Mf => 65,
            Dynamics::F => 78,
            Dynamics::Ff => 91,
            Dynamics::Fff => 104,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChordFlags {
    pub staccato: bool,
    pub palm_mute: bool,
    pub accent: bool,
    pub strong_accent: bool,
    pub let_ring: bool,
    pub strum_up: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoteFlags {
    pub tie_origin: bool,
    pub tie_destination: bool,
    pub dead: bool,
    pub ghost: bool,
    pub left_stick: bool,
}

/// Ornamental note played just before its parent note.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraceNote {
    pub pitch: u8,
    pub string: u8,
    pub dead: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    /// MIDI pitch.
    pub pitch: u8,
    /// Tablature string index, 0 = highest string.
    pub string: u8,
    pub flags: NoteFlags,
    pub grace_notes: Vec<GraceNote>,
}

impl Note {
    pub fn new(pitch: u8) -> Self {
        Self {
            pitch,
            string: 0,
            flags: NoteFlags::default(),
            grace_notes: Vec::new(),
        }
    }

    pub fn on_string(mut self, string: u8) -> Self {
        self.string = string;
        self
    }

    pub fn with_flags(mut self, flags: NoteFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_grace(mut self, grace: GraceNote) -> Self {
        self.grace_notes.push(grace);
        self
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chord {
    pub duration: Duration,
    pub dynamics: Dynamics,
    pub flags: ChordFlags,
    pub notes: Vec<Note>,
}

impl Chord {
    /// A chord with no notes: a rest.
    pub fn rest(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn note(duration: Duration, pitch: u8) -> Self {
        Self::rest(duration).with_note(Note::new(pitch))
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_dynamics(mut self, dynamics: Dynamics) -> Self {
        self.dynamics = dynamics;
        self
    }

    pub fn with_flags(mut self, flags: ChordFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn duration_ticks(&self) -> u32 {
        self.duration.to_ticks(PPQ)
    }

    pub fn has_note_on_string(&self, string: u8) -> bool {
        self.notes.iter().any(|n| n.string == string)
    }
}

/// The chords of one voice in one bar.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Phrase {
    pub chords: Vec<Chord>,
}

impl Phrase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chord(mut self, chord: Chord) -> Self {
        self.chords.push(chord);
        self
    }

    pub fn duration_ticks(&self) -> u32 {
        self.chords.iter().map(Chord::duration_ticks).sum()
    }

    /// `(tick_in_bar, chord)` pairs.
    pub fn positioned(&self) -> impl Iterator<Item = (u32, &Chord)> {
        self.chords.iter().scan(0u32, |tick, chord| {
            let at = *tick;
            *tick += chord.duration_ticks();
            Some((at, chord))
        })
    }
}

/// One rhythmic line of a track, as one phrase per bar.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackVoice {
    pub phrases: Vec<Phrase>,
}

impl TrackVoice {
    pub fn phrase(&self, bar: usize) -> Option<&Phrase> {
        self.phrases.get(bar)
    }

    /// Chords following `(bar, chord)` in reading order, crossing barlines.
    pub fn chords_after(&self, bar: usize, chord: usize) -> impl Iterator<Item = &Chord> {
        self.phrases
            .iter()
            .enumerate()
            .skip(bar)
            .flat_map(move |(index, phrase)| {
                let skip = if index == bar { chord + 1 } else { 0 };
                phrase.chords.iter().skip(skip)
            })
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackKind {
    #[default]
    Standard,
    /// One MIDI channel per string.
    Tablature,
    /// GM percussion on channel 10.
    Drums,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Stable across edits; keys the track's synthesis device.
    pub id: Uuid,
    pub name: String,
    pub kind: TrackKind,
    pub midi_program: u8,
    pub volume: f32,
    pub pan: f32,
    pub solo: bool,
    pub mute: bool,
    /// Transposition in semitones applied at playback.
    pub capo: i8,
    pub voices: Vec<TrackVoice>,
}

impl Track {
    pub fn new(name: &str, kind: TrackKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            midi_program: 0,
            volume: 1.0,
            pan: 0.5,
            solo: false,
            mute: false,
            capo: 0,
            voices: vec![TrackVoice::default()],
        }
    }

    pub fn program(mut self, program: u8) -> Self {
        self.midi_program = program;
        self
    }

    pub fn capo(mut self, capo: i8) -> Self {
        self.capo = capo;
        self
    }

    /// Set the phrase of `voice` at `bar`, growing the voice list as needed.
    pub fn phrase(mut self, voice: usize, bar: usize, phrase: Phrase) -> Self {
        self.set_phrase(voice, bar, phrase);
        self
    }

    pub fn set_phrase(&mut self, voice: usize, bar: usize, phrase: Phrase) {
        if self.voices.len() <= voice {
            self.voices.resize_with(voice + 1, TrackVoice::default);
        }
        let phrases = &mut self.voices[voice].phrases;
        if phrases.len() <= bar {
            phrases.resize_with(bar + 1, Phrase::default);
        }
        phrases[bar] = phrase;
    }

    pub fn is_drums(&self) -> bool {
        self.kind == TrackKind::Drums
    }

    pub fn is_tablature(&self) -> bool {
        self.kind == TrackKind::Tablature
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Song {
    pub bars: Vec<Bar>,
    pub tracks: Vec<Track>,
    pub tempo: TempoTimeline,
}

impl Song {
    pub fn builder() -> SongBuilder {
        SongBuilder::default()
    }

    pub fn bar(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn index_of_track(&self, id: Uuid) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }
}

/// Fluent construction with bar-overflow validation.
#[derive(Debug, Default)]
pub struct SongBuilder {
    bars: Vec<Bar>,
    tracks: Vec<Track>,
    tempo: TempoTimeline,
}

impl SongBuilder {
    pub fn bar(mut self, bar: Bar) -> Self {
        self.bars.push(bar);
        self
    }

    /// Append `count` plain bars.
    pub fn bars(mut self, count: usize, time_signature: TimeSignature) -> Self {
        self.bars.extend((0..count).map(|_| Bar::new(time_signature)));
        self
    }

    pub fn track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn tempo(mut self, tempo: TempoTimeline) -> Self {
        self.tempo = tempo;
        self
    }

    pub fn build(self) -> Result<Song, SongError> {
        for track in &self.tracks {
            for voice in &track.voices {
                if voice.phrases.len() > self.bars.len() {
                    return Err(SongError::PhraseWithoutBar {
                        track: track.name.clone(),
                        bar: voice.phrases.len() - 1,
                    });
                }
                for (index, phrase) in voice.phrases.iter().enumerate() {
                    let expected = self.bars[index].duration_ticks();
                    let actual = phrase.duration_ticks();
                    if actual > expected {
                        return Err(SongError::OverflowsBar {
                            bar: index,
                            expected,
                            actual,
                        });
                    }
                }
            }
        }

        Ok(Song {
            bars: self.bars,
            tracks: self.tracks,
            tempo: self.tempo,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongError {
    /// A phrase is longer than its bar
    OverflowsBar { bar: usize, expected: u32, actual: u32 },
    /// A track has a phrase past the last bar
    PhraseWithoutBar { track: String, bar: usize },
}

impl std::fmt::Display for SongError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SongError::OverflowsBar { bar, expected, actual } => {
                write!(
                    f,
                    "Phrase overflows bar {}: expected at most {} ticks, got {} ticks",
                    bar, expected, actual
                )
            }
            SongError::PhraseWithoutBar { track, bar } => {
                write!(f, "Track {:?} has a phrase at bar {} but the song has no such bar", track, bar)
            }
        }
    }
}

impl std::error::Error for SongError {}
