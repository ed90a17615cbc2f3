pub mod clip;
pub mod duration;
pub mod playlist;
pub mod song;
pub mod tempo;
pub mod time_signature;

pub use clip::{ClipEvent, MidiClip, MidiNoteEvent};
pub use duration::Duration;
pub use playlist::{CompileWarning, Intersection, Playlist, PlaylistBar, PlaylistCompiler};
pub use song::{
    Bar, Chord, ChordFlags, DirectionJump, DirectionTarget, Dynamics, GraceNote, Note, NoteFlags, Phrase, Song,
    SongBuilder, SongError, Track, TrackKind, TrackVoice,
};
pub use tempo::{TempoItem, TempoTimeline, TempoUnit, DEFAULT_TEMPO};
pub use time_signature::TimeSignature;
