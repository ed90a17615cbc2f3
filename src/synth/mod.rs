// Purpose: SoundFont voices, channels and MIDI devices
// This layer sits above the SoundFont bank and below the sequencer

pub mod channel;
pub mod device;
pub mod envelope;
pub mod filter;
pub mod source;
pub mod voice;

pub use channel::{ChannelInstrument, SynthChannel, VOICES_PER_CHANNEL};
pub use device::{MusicDevice, ScheduledEvent, NUM_CHANNELS};
pub use envelope::{EnvelopePhase, VolumeEnvelope};
pub use source::{MonoSample, SampleSource, Waveform};
pub use voice::{Voice, VoiceState, XFADE_SIZE};
