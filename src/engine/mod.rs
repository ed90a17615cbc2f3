pub mod clock;
pub mod command;
pub mod metronome;
pub mod position;
pub mod rack;
pub mod sequencer;
pub mod transport;

pub use clock::Clock;
pub use command::{JumpTarget, Preclick, Snapshot, TrackMix, TrackPlan};
pub use metronome::{metronome_device, schedule_clicks};
pub use position::{PlaybackListener, PlaybackPosition, PositionReport};
pub use rack::{MusicRack, RenderHooks};
pub use sequencer::Sequencer;
pub use transport::SequencerEngine;
