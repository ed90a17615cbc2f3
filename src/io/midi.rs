//! Channel voice messages as carried by `(status, data1, data2)` triples.

pub const NOTE_OFF: u8 = 0x8;
pub const NOTE_ON: u8 = 0x9;
pub const CONTROL_CHANGE: u8 = 0xB;
pub const PROGRAM_CHANGE: u8 = 0xC;
pub const PITCH_BEND: u8 = 0xE;

pub const CC_BANK_SELECT: u8 = 0x00;
pub const CC_ALL_SOUND_OFF: u8 = 120;

/// Channel reserved for percussion by General MIDI.
pub const DRUM_CHANNEL: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, lsb: u8, msb: u8 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiEvent {
    /// Decode a raw triple. A note-on with velocity 0 is a note-off.
    pub fn from_bytes(status: u8, data1: u8, data2: u8) -> Option<Self> {
        let channel = status & 0x0F;
        match status >> 4 {
            NOTE_OFF => Some(MidiEvent::NoteOff {
                channel,
                key: data1,
                velocity: data2,
            }),
            NOTE_ON if data2 == 0 => Some(MidiEvent::NoteOff {
                channel,
                key: data1,
                velocity: 0,
            }),
            NOTE_ON => Some(MidiEvent::NoteOn {
                channel,
                key: data1,
                velocity: data2,
            }),
            CONTROL_CHANGE => Some(MidiEvent::ControlChange {
                channel,
                controller: data1,
                value: data2,
            }),
            PROGRAM_CHANGE => Some(MidiEvent::ProgramChange {
                channel,
                program: data1,
            }),
            PITCH_BEND => Some(MidiEvent::PitchBend {
                channel,
                lsb: data1,
                msb: data2,
            }),
            _ => None,
        }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        match self {
            MidiEvent::NoteOn { channel, key, velocity } => [(NOTE_ON << 4) | channel, key, velocity],
            MidiEvent::NoteOff { channel, key, velocity } => [(NOTE_OFF << 4) | channel, key, velocity],
            MidiEvent::ControlChange { channel, controller, value } => {
                [(CONTROL_CHANGE << 4) | channel, controller, value]
            }
            MidiEvent::PitchBend { channel, lsb, msb } => [(PITCH_BEND << 4) | channel, lsb, msb],
            MidiEvent::ProgramChange { channel, program } => [(PROGRAM_CHANGE << 4) | channel, program, 0],
        }
    }

    pub fn channel(self) -> u8 {
        match self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. }
            | MidiEvent::ProgramChange { channel, .. } => channel,
        }
    }
}

/// Message kind (upper nibble) of a status byte.
#[inline]
pub fn status_kind(status: u8) -> u8 {
    status >> 4
}
