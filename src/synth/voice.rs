use std::sync::Arc;

use super::source::{MonoSample, MonoSamplePlayer, SampleSource, ZonePlayer};
use crate::io::converter::midi_to_freq;
use crate::soundfont::Generator;

/// Length of the crossfade that replaces any hard voice cut.
pub const XFADE_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,          // Nothing sounding
    Active,        // Key held
    Releasing,     // Key released, tail still sounding
    CrossFading,   // Previous note fading out under the new one
}

/// One monophonic synthesis slot of a channel.
///
/// Starting a note while another is sounding, or stopping one abruptly, moves
/// the current player into the crossfade slot and blends it out over
/// [`XFADE_SIZE`] samples.
#[derive(Debug, Clone)]
pub struct Voice {
    on: bool,
    pitch: u8,
    exclusive_class: u16,
    pitch_wheel: f32,
    output_rate: f32,
    player: Option<SampleSource>,
    xfade_player: Option<SampleSource>,
    xfade_pos: usize,
    fade_in_pos: usize,
}

impl Voice {
    pub fn new(output_rate: f32) -> Self {
        Self {
            on: false,
            pitch: 0,
            exclusive_class: 0,
            pitch_wheel: 0.0,
            output_rate,
            player: None,
            xfade_player: None,
            xfade_pos: XFADE_SIZE,
            fade_in_pos: XFADE_SIZE,
        }
    }

    /// Start `zone` at `pitch`. Any sounding note is crossfaded out.
    pub fn play_zone(&mut self, zone: &Generator, pitch: u8, velocity: u8) {
        self.begin_note();
        self.pitch = pitch;
        self.exclusive_class = zone.exclusive_class;
        self.on = true;

        let speed = self.zone_speed(zone);
        let envelope_step = zone.region.sample_rate as f32 / self.output_rate;
        let amp = velocity as f32 / 127.0;
        self.player = Some(SampleSource::Zone(ZonePlayer::new(
            *zone,
            self.output_rate,
            speed,
            envelope_step,
            amp,
        )));
    }

    /// Start a plain looped sample at `pitch`.
    pub fn play_sample(&mut self, sample: &Arc<MonoSample>, pitch: u8, velocity: u8) {
        self.begin_note();
        self.pitch = pitch;
        self.exclusive_class = 0;
        self.on = true;

        let speed = self.sample_speed(sample);
        let amp = velocity as f32 / 127.0;
        self.player = Some(SampleSource::Sample(MonoSamplePlayer::new(sample.clone(), speed, amp)));
    }

    /// Key released: the player moves to its release phase.
    pub fn stop_note(&mut self) {
        self.on = false;
        if let Some(player) = &mut self.player {
            player.note_off();
        }
    }

    /// Hard stop, smoothed by a crossfade to silence.
    pub fn brutal_stop(&mut self) {
        if self.player.is_none() {
            return;
        }
        self.start_xfade();
        self.on = false;
    }

    /// Pitch wheel offset in semitones; retunes the sounding player.
    pub fn set_pitch_wheel(&mut self, semitones: f32) {
        self.pitch_wheel = semitones;
        let speed = match &self.player {
            Some(SampleSource::Zone(player)) => self.zone_speed(player.zone()),
            Some(SampleSource::Sample(_)) | None => return,
        };
        if let Some(player) = &mut self.player {
            player.set_speed(speed);
        }
    }

    pub fn process(&mut self, pool: &[i16], out_l: &mut [f32], out_r: &mut [f32], volume: f32, pan: f32) {
        let remaining = XFADE_SIZE - self.xfade_pos.min(self.fade_in_pos);
        if remaining == 0 {
            if let Some(player) = &mut self.player {
                player.process(pool, out_l, out_r, volume, pan);
            }
            return;
        }

        let n = out_l.len().min(remaining);
        let mut fade_in = ([0.0f32; XFADE_SIZE], [0.0f32; XFADE_SIZE]);
        let mut fade_out = ([0.0f32; XFADE_SIZE], [0.0f32; XFADE_SIZE]);
        if let Some(player) = &mut self.player {
            player.process(pool, &mut fade_in.0[..n], &mut fade_in.1[..n], volume, pan);
        }
        if let Some(player) = &mut self.xfade_player {
            player.process(pool, &mut fade_out.0[..n], &mut fade_out.1[..n], volume, pan);
        }
        for i in 0..n {
            let out = 1.0 - self.xfade_pos as f32 / XFADE_SIZE as f32;
            let inc = self.fade_in_pos as f32 / XFADE_SIZE as f32;
            out_l[i] += out * fade_out.0[i] + inc * fade_in.0[i];
            out_r[i] += out * fade_out.1[i] + inc * fade_in.1[i];
            self.xfade_pos = (self.xfade_pos + 1).min(XFADE_SIZE);
            self.fade_in_pos = (self.fade_in_pos + 1).min(XFADE_SIZE);
        }
        if self.xfade_pos >= XFADE_SIZE {
            self.xfade_player = None;
        }

        if n < out_l.len() {
            if let Some(player) = &mut self.player {
                player.process(pool, &mut out_l[n..], &mut out_r[n..], volume, pan);
            }
        }
    }

    pub fn is_crossfading(&self) -> bool {
        self.xfade_pos.min(self.fade_in_pos) < XFADE_SIZE
    }

    pub fn is_sounding(&self) -> bool {
        if self.is_crossfading() {
            self.player.is_some() || self.xfade_player.is_some()
        } else {
            self.player.as_ref().is_some_and(SampleSource::is_sounding)
        }
    }

    /// Key held (note-on received and no note-off yet).
    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn exclusive_class(&self) -> u16 {
        self.exclusive_class
    }

    pub fn state(&self) -> VoiceState {
        if self.is_crossfading() && self.xfade_player.is_some() {
            VoiceState::CrossFading
        } else if !self.is_sounding() {
            VoiceState::Free
        } else if self.on {
            VoiceState::Active
        } else {
            VoiceState::Releasing
        }
    }

    fn start_xfade(&mut self) {
        self.xfade_player = self.player.take();
        self.xfade_pos = 0;
        self.fade_in_pos = 0;
    }

    /// A note landing on a fade to silence ramps in from zero while the old
    /// player keeps fading out.
    fn begin_note(&mut self) {
        if self.player.is_some() {
            self.start_xfade();
        } else if self.xfade_player.is_some() {
            self.fade_in_pos = 0;
        }
    }

    /// `f(note) / f(root) · sampleRate / outputRate`, with coarse tune, fine
    /// tune and the pitch wheel folded into `note`.
    fn zone_speed(&self, zone: &Generator) -> f32 {
        let pitch = (self.pitch as i32 + zone.coarse_tune).clamp(0, 127);
        let midi = pitch as f32 + self.pitch_wheel + zone.fine_tune as f32 * 0.01;
        let root = midi_to_freq(zone.effective_root_key() as f32);
        midi_to_freq(midi) / root * (zone.region.sample_rate as f32 / self.output_rate)
    }

    fn sample_speed(&self, sample: &MonoSample) -> f32 {
        let freq = midi_to_freq(self.pitch as f32 + self.pitch_wheel);
        freq / sample.source_freq() * (sample.sample_rate() / self.output_rate)
    }
}
