//! MIDI rendering of one bar of one track.

use super::song::{Chord, Note, Track, TrackVoice};
use crate::io::midi::{CC_BANK_SELECT, CONTROL_CHANGE, DRUM_CHANNEL, PITCH_BEND, PROGRAM_CHANGE};
use crate::soundfont::DRUM_BANK;
use crate::PPQ;

/// General MIDI "Electric Guitar (muted)", used for dead notes.
pub const DEAD_NOTE_PROGRAM: u8 = 28;

const GRACE_NOTE_TICKS: f64 = PPQ as f64 / 8.0;

/// Share of the written length a note sounds, leaving a gap before a repeated note.
const ARTICULATION: f64 = 0.99;

/// A channel message at a tick relative to the bar start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipEvent {
    pub tick: i32,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

/// A note, expanded into note-on/note-off when scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiNoteEvent {
    pub tick: i32,
    pub duration: i32,
    pub channel: u8,
    /// Written pitch; transposition is applied at playback.
    pub pitch: u8,
    pub velocity: u8,
    /// End with all-sound-off on the channel instead of a note-off.
    pub use_sound_off: bool,
}

impl MidiNoteEvent {
    pub fn end_tick(&self) -> i32 {
        self.tick + self.duration
    }
}

/// Channel messages and notes of one (track, bar) pair.
///
/// Ticks are relative to the bar start and may be negative (grace notes
/// before the first beat) or run past the bar (ties, let ring).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MidiClip {
    pub events: Vec<ClipEvent>,
    pub notes: Vec<MidiNoteEvent>,
    pub min_tick: i32,
    pub max_tick: i32,
}

impl MidiClip {
    pub fn for_bar(track: &Track, bar: usize) -> Self {
        let mut writer = ClipWriter {
            track,
            clip: MidiClip::default(),
            channels_used: 0,
        };
        for voice in &track.voices {
            let Some(phrase) = voice.phrase(bar) else {
                continue;
            };
            for (index, (tick, chord)) in phrase.positioned().enumerate() {
                writer.chord(voice, bar, index, chord, tick as f64);
            }
        }
        writer.finish()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.notes.is_empty()
    }

    /// Ticks sounding before the bar start.
    pub fn ticks_before(&self) -> i32 {
        (-self.min_tick).max(0)
    }

    /// Ticks sounding after a bar of `bar_ticks` ends.
    pub fn ticks_after(&self, bar_ticks: i32) -> i32 {
        (self.max_tick - bar_ticks).max(0)
    }
}

struct ClipWriter<'a> {
    track: &'a Track,
    clip: MidiClip,
    channels_used: u16,
}

impl ClipWriter<'_> {
    fn chord(&mut self, voice: &TrackVoice, bar: usize, index: usize, chord: &Chord, start: f64) {
        let chord_ticks = chord.duration_ticks() as f64;
        let flags = chord.flags;

        for note in &chord.notes {
            if note.flags.tie_destination {
                continue;
            }
            let base_velocity = chord.dynamics.velocity() as f64;
            let channel = self.channel_for(note.string);

            for grace in &note.grace_notes {
                let grace_channel = self.channel_for(grace.string);
                let grace_start = start - 1.1 * GRACE_NOTE_TICKS;
                let (mut duration, mut velocity) = (GRACE_NOTE_TICKS, 0.75 * base_velocity);
                if grace.dead {
                    duration *= 0.25;
                    velocity *= 0.5;
                }
                self.select_instrument(grace_channel, grace.dead, grace_start);
                self.push_note(MidiNoteEvent {
                    tick: grace_start as i32,
                    duration: (ARTICULATION * duration) as i32,
                    channel: grace_channel,
                    pitch: grace.pitch,
                    velocity: clamp_velocity(velocity),
                    use_sound_off: false,
                });
            }

            self.select_instrument(channel, note.flags.dead, start);

            let mut duration = chord_ticks;
            if note.flags.tie_origin {
                duration += tied_ticks(voice, bar, index, note);
            }
            if flags.staccato {
                duration *= 0.5;
            }
            if flags.palm_mute {
                duration *= 0.75;
            }
            if note.flags.dead {
                duration *= 0.25;
            }

            let mut velocity = base_velocity;
            if flags.accent {
                velocity += 20.0;
            } else if flags.strong_accent {
                velocity += 30.0;
            }
            if flags.strum_up {
                velocity -= 4.0;
            }
            if note.flags.left_stick {
                velocity -= 4.0;
            }
            if note.flags.ghost {
                velocity *= 0.35;
            }
            if note.flags.dead {
                velocity *= 0.5;
            }

            // wheel back to centre at every note start
            self.push_event(start, (PITCH_BEND << 4) | channel, 0x00, 0x40);

            let use_sound_off = self.track.is_tablature()
                && !flags.let_ring
                && voice
                    .chords_after(bar, index)
                    .next()
                    .is_some_and(|next| !next.has_note_on_string(note.string));

            self.push_note(MidiNoteEvent {
                tick: start as i32,
                duration: (ARTICULATION * duration) as i32,
                channel,
                pitch: note.pitch,
                velocity: clamp_velocity(velocity),
                use_sound_off,
            });
        }
    }

    fn channel_for(&self, string: u8) -> u8 {
        if self.track.is_drums() {
            DRUM_CHANNEL
        } else if self.track.is_tablature() {
            string.min(15)
        } else {
            0
        }
    }

    /// Bank select and program change on first use of a channel. Dead notes
    /// switch to the muted guitar and leave the channel to be re-selected.
    fn select_instrument(&mut self, channel: u8, dead: bool, tick: f64) {
        let bit = 1u16 << channel;
        if dead {
            self.push_event(tick, (CONTROL_CHANGE << 4) | channel, CC_BANK_SELECT, 0);
            self.push_event(tick, (PROGRAM_CHANGE << 4) | channel, DEAD_NOTE_PROGRAM, 0);
            self.channels_used &= !bit;
        } else if self.channels_used & bit == 0 {
            let (program, bank) = if self.track.is_drums() {
                (0, DRUM_BANK as u8)
            } else {
                (self.track.midi_program, 0)
            };
            self.push_event(tick, (CONTROL_CHANGE << 4) | channel, CC_BANK_SELECT, bank);
            self.push_event(tick, (PROGRAM_CHANGE << 4) | channel, program, 0);
            self.channels_used |= bit;
        }
    }

    fn push_event(&mut self, tick: f64, status: u8, data1: u8, data2: u8) {
        self.clip.events.push(ClipEvent {
            tick: tick as i32,
            status,
            data1,
            data2,
        });
    }

    fn push_note(&mut self, note: MidiNoteEvent) {
        self.clip.notes.push(note);
    }

    fn finish(mut self) -> MidiClip {
        let clip = &mut self.clip;
        clip.events.sort_by_key(|e| e.tick);
        clip.notes.sort_by_key(|n| n.tick);
        clip.min_tick = clip.notes.iter().map(|n| n.tick).min().unwrap_or(0).min(0);
        clip.max_tick = clip.notes.iter().map(MidiNoteEvent::end_tick).max().unwrap_or(0);
        self.clip
    }
}

/// Length of the chords a tie chain starting at `note` runs into.
fn tied_ticks(voice: &TrackVoice, bar: usize, index: usize, note: &Note) -> f64 {
    let mut ticks = 0.0;
    for chord in voice.chords_after(bar, index) {
        let Some(destination) = chord
            .notes
            .iter()
            .find(|n| n.flags.tie_destination && n.pitch == note.pitch && n.string == note.string)
        else {
            break;
        };
        ticks += chord.duration_ticks() as f64;
        if !destination.flags.tie_origin {
            break;
        }
    }
    ticks
}

fn clamp_velocity(velocity: f64) -> u8 {
    velocity.clamp(0.0, 127.0) as u8
}
