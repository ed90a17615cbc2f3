pub mod config;
pub mod context;
pub mod engine; // Sequencer, rack and the audio-thread transport
pub mod error;
pub mod io;
pub mod sequencing; // Songs, playlists and MIDI clips
pub mod soundfont; // SF2 parsing and zone resolution
pub mod synth; // Voices, channels and devices

pub use config::{EngineConfig, MetronomeSettings};
pub use context::EngineContext;
pub use engine::{Sequencer, SequencerEngine};
pub use error::{EngineError, SoundFontError};

pub const MAX_BLOCK_SIZE: usize = 2048;
/// Ticks per quarter note.
pub const PPQ: u32 = 480;
