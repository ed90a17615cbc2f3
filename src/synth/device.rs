use std::collections::VecDeque;
use std::sync::Arc;

use uuid::Uuid;

use super::channel::SynthChannel;
use crate::io::midi::MidiEvent;
use crate::soundfont::SoundFont;

pub const NUM_CHANNELS: usize = 16;

/// A MIDI message due `offset` frames into the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub offset: u32,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

/// A 16-channel SoundFont synthesizer fed by sample-accurate MIDI.
///
/// Events are queued with [`schedule_midi`](Self::schedule_midi) and applied
/// between sub-blocks of [`process`](Self::process), so a note lands on the
/// exact frame it was scheduled for regardless of block size.
///
/// All 16 channels are allocated up front; a channel is only rendered once an
/// event has addressed it.
#[derive(Debug)]
pub struct MusicDevice {
    id: Uuid,
    sample_rate: f32,
    soundfont: Option<Arc<SoundFont>>,
    channels: Vec<SynthChannel>,
    used_channels: u16,
    events: VecDeque<ScheduledEvent>,
    event_capacity: usize,
    dropped_events: u64,
    volume: f32,
    pan: f32,
}

impl MusicDevice {
    pub fn new(id: Uuid, sample_rate: f32, soundfont: Option<Arc<SoundFont>>, event_capacity: usize) -> Self {
        let mut channels: Vec<SynthChannel> =
            (0..NUM_CHANNELS).map(|_| SynthChannel::new(sample_rate)).collect();
        for channel in &mut channels {
            channel.program_change(soundfont.as_deref(), 0);
        }
        Self {
            id,
            sample_rate,
            soundfont,
            channels,
            used_channels: 0,
            events: VecDeque::with_capacity(event_capacity),
            event_capacity,
            dropped_events: 0,
            volume: 1.0,
            pan: 0.5,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn soundfont(&self) -> Option<&Arc<SoundFont>> {
        self.soundfont.as_ref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan;
    }

    pub fn channel(&self, index: usize) -> Option<&SynthChannel> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut SynthChannel> {
        self.channels.get_mut(index)
    }

    /// Queue a message `offset` frames from the start of the next `process` call.
    ///
    /// Events with equal offsets keep their scheduling order. Returns `false`
    /// and counts the event as dropped when the queue is full.
    pub fn schedule_midi(&mut self, status: u8, data1: u8, data2: u8, offset: u32) -> bool {
        if self.events.len() >= self.event_capacity {
            self.dropped_events += 1;
            return false;
        }
        let index = self.events.partition_point(|e| e.offset <= offset);
        self.events.insert(
            index,
            ScheduledEvent {
                offset,
                status,
                data1,
                data2,
            },
        );
        true
    }

    /// Apply a message immediately.
    pub fn send_midi(&mut self, status: u8, data1: u8, data2: u8) {
        let Some(event) = MidiEvent::from_bytes(status, data1, data2) else {
            return;
        };
        let index = event.channel() as usize;
        let font = self.soundfont.as_deref();
        let Some(channel) = self.channels.get_mut(index) else {
            return;
        };
        self.used_channels |= 1 << index;

        match event {
            MidiEvent::NoteOn { key, velocity, .. } => channel.note_on(font, key, velocity),
            MidiEvent::NoteOff { key, .. } => channel.note_off(key),
            MidiEvent::ControlChange { controller, value, .. } => channel.control_change(controller, value),
            MidiEvent::ProgramChange { program, .. } => channel.program_change(font, program),
            MidiEvent::PitchBend { lsb, msb, .. } => channel.pitch_wheel(lsb, msb),
        }
    }

    /// Switch every channel to `(program, bank)`.
    pub fn set_program_of_all_channels(&mut self, program: u8, bank: u16) {
        let font = self.soundfont.as_deref();
        for channel in &mut self.channels {
            channel.select_bank(bank);
            channel.program_change(font, program);
        }
    }

    pub fn set_monophonic(&mut self, monophonic: bool) {
        for channel in &mut self.channels {
            channel.set_monophonic(monophonic);
        }
    }

    pub fn all_sound_off(&mut self) {
        for channel in &mut self.channels {
            channel.all_sound_off();
        }
    }

    pub fn pending_events(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.iter()
    }

    pub fn clear_pending_events(&mut self) {
        self.events.clear();
    }

    /// Events rejected because the pending queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Render and mix into `out_l`/`out_r`, applying due events between sub-blocks.
    pub fn process(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        let mut done = 0;

        while done < frames {
            while let Some(event) = self.events.front().copied() {
                if event.offset != 0 {
                    break;
                }
                self.events.pop_front();
                self.send_midi(event.status, event.data1, event.data2);
            }

            let remaining = frames - done;
            let n = self
                .events
                .front()
                .map_or(remaining, |e| (e.offset as usize).min(remaining));

            self.render(&mut out_l[done..done + n], &mut out_r[done..done + n]);
            for event in &mut self.events {
                event.offset = event.offset.saturating_sub(n as u32);
            }
            done += n;
        }
    }

    fn render(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let pool = self.soundfont.as_deref().map_or(&[][..], SoundFont::samples);
        for (index, channel) in self.channels.iter_mut().enumerate() {
            if self.used_channels & (1 << index) != 0 {
                channel.process(pool, out_l, out_r, self.volume, self.pan);
            }
        }
    }
}
