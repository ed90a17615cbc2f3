//! Messages between the control thread and the audio thread.
//!
//! Everything the audio thread needs is built on the control thread and
//! moved across an `rtrb` queue; everything it lets go of travels back on a
//! second queue so that deallocation never happens inside the callback.

use std::sync::Arc;

use uuid::Uuid;

use super::position::PlaybackListener;
use crate::config::MetronomeSettings;
use crate::sequencing::{MidiClip, Playlist, TempoTimeline, TimeSignature, TrackKind};
use crate::synth::MusicDevice;

/// Immutable render data of one track.
#[derive(Debug, Clone)]
pub struct TrackPlan {
    pub device_id: Uuid,
    pub name: String,
    pub kind: TrackKind,
    /// One clip per song bar.
    pub clips: Vec<MidiClip>,
}

impl TrackPlan {
    pub fn clip(&self, bar: usize) -> Option<&MidiClip> {
        self.clips.get(bar)
    }
}

/// Everything derived from the song that playback reads.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub playlist: Playlist,
    pub tempo: TempoTimeline,
    pub time_signatures: Vec<TimeSignature>,
    pub tracks: Vec<TrackPlan>,
}

impl Snapshot {
    pub fn time_signature(&self, bar: usize) -> TimeSignature {
        self.time_signatures.get(bar).copied().unwrap_or_default()
    }
}

/// Mutable mix state of one track, owned by the audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMix {
    pub volume: f32,
    pub pan: f32,
    pub solo: bool,
    pub mute: bool,
    pub capo: i8,
    pub program: u8,
    pub bank: u16,
    /// Program the clips were written with; their program changes are
    /// redirected to `program`.
    pub clip_program: u8,
    pub program_change_pending: bool,
}

impl TrackMix {
    /// Volume after solo and mute.
    pub fn effective_volume(&self, any_solo: bool) -> f32 {
        if self.mute || (any_solo && !self.solo) {
            0.0
        } else {
            self.volume
        }
    }

    /// Program to send for a clip program change carrying `program`.
    pub fn map_program(&self, program: u8) -> u8 {
        if program == self.clip_program {
            self.program
        } else {
            program
        }
    }
}

/// Device setup applied when an existing device is kept across a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSetup {
    pub program: u8,
    pub bank: u16,
    pub monophonic: bool,
}

/// The device for one track: either built fresh or kept from the rack.
#[derive(Debug)]
pub enum DeviceSlot {
    New(MusicDevice),
    Keep { id: Uuid, setup: DeviceSetup },
}

/// A complete rebuild, swapped in at the top of a callback.
#[derive(Debug)]
pub struct Installation {
    pub snapshot: Arc<Snapshot>,
    pub mixes: Vec<TrackMix>,
    /// One slot per track, in track order.
    pub slots: Vec<DeviceSlot>,
    /// Empty, with room for every slot; becomes the rack's device list.
    pub devices: Vec<MusicDevice>,
}

/// Metronome pre-count armed by a jump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preclick {
    pub bars: u32,
    pub time_signature: TimeSignature,
}

impl Preclick {
    /// Total length in ticks.
    pub fn duration_ticks(&self) -> f64 {
        self.bar_ticks() * self.bars as f64
    }

    pub fn bar_ticks(&self) -> f64 {
        self.time_signature.bar_ticks(crate::PPQ) as f64
    }
}

/// Resolved destination of a jump.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpTarget {
    pub playlist_index: usize,
    pub bar_index: usize,
    pub tick_in_bar: u32,
    pub tick_in_playlist: f64,
    pub bpm: f64,
    pub preclick: Option<Preclick>,
}

/// Control → audio.
pub enum SequencerCommand {
    Install(Box<Installation>),
    Start,
    Stop,
    JumpTo(JumpTarget),
    SetPlaybackRate(f64),
    SetLoopEnabled(bool),
    SetLoopRange { start: f64, end: f64 },
    SetTrackVolume { track: usize, volume: f32 },
    SetTrackPan { track: usize, pan: f32 },
    SetTrackSolo { track: usize, solo: bool },
    SetTrackMute { track: usize, mute: bool },
    SetTrackCapo { track: usize, capo: i8 },
    SetTrackProgram { track: usize, program: u8 },
    SendMidi { track: usize, status: u8, data1: u8, data2: u8 },
    SetMetronome(MetronomeSettings),
    SetMasterGain(f32),
    AddListener(Box<dyn PlaybackListener>),
}

impl SequencerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SequencerCommand::Install(_) => "install",
            SequencerCommand::Start => "start",
            SequencerCommand::Stop => "stop",
            SequencerCommand::JumpTo(_) => "jump",
            SequencerCommand::SetPlaybackRate(_) => "playback rate",
            SequencerCommand::SetLoopEnabled(_) => "loop enable",
            SequencerCommand::SetLoopRange { .. } => "loop range",
            SequencerCommand::SetTrackVolume { .. } => "track volume",
            SequencerCommand::SetTrackPan { .. } => "track pan",
            SequencerCommand::SetTrackSolo { .. } => "track solo",
            SequencerCommand::SetTrackMute { .. } => "track mute",
            SequencerCommand::SetTrackCapo { .. } => "track capo",
            SequencerCommand::SetTrackProgram { .. } => "track program",
            SequencerCommand::SendMidi { .. } => "midi",
            SequencerCommand::SetMetronome(_) => "metronome",
            SequencerCommand::SetMasterGain(_) => "master gain",
            SequencerCommand::AddListener(_) => "listener",
        }
    }
}

/// Audio → control: values to be dropped off the audio thread.
pub enum Retired {
    /// A processed installation, now holding the previous snapshot, mixes
    /// and device list (with the devices no track uses any more).
    Installation(Box<Installation>),
    Listener(Box<dyn PlaybackListener>),
}
