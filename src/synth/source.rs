//! Per-note sample players.
//!
//! A voice plays exactly one [`SampleSource`] at a time (two while
//! crossfading). Sources mix *into* the output buffers; they never clear them.

use std::f32::consts::TAU;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::envelope::VolumeEnvelope;
use super::filter::OnePoleLowpass;
use crate::soundfont::{Generator, LoopMode};

/// 16-bit SF2 PCM is scaled by this, not by `i16::MAX`.
const PCM_SCALE: f32 = 1.0 / 32_000.0;

/// Plays one SF2 generator zone from the bank's shared sample pool.
#[derive(Debug, Clone, Copy)]
pub struct ZonePlayer {
    zone: Generator,
    envelope: VolumeEnvelope,
    lowpass: Option<[OnePoleLowpass; 2]>,
    position: f64,
    speed: f32,
    envelope_step: f32,
    amp: f32,
    note_on: bool,
    playing: bool,
}

impl ZonePlayer {
    /// `speed` is the read-head increment per output frame; `envelope_step`
    /// is the sample-rate ratio the envelope clock advances by.
    pub fn new(zone: Generator, output_rate: f32, speed: f32, envelope_step: f32, amp: f32) -> Self {
        let lowpass = zone.lowpass_fc.map(|fc| {
            let lp = OnePoleLowpass::new(fc, output_rate);
            [lp, lp]
        });
        Self {
            zone,
            envelope: VolumeEnvelope::new(zone.envelope),
            lowpass,
            position: 0.0,
            speed,
            envelope_step,
            amp,
            note_on: true,
            playing: true,
        }
    }

    pub fn zone(&self) -> &Generator {
        &self.zone
    }

    pub fn envelope(&self) -> &VolumeEnvelope {
        &self.envelope
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn envelope_step(&self) -> f32 {
        self.envelope_step
    }

    fn process(&mut self, pool: &[i16], out_l: &mut [f32], out_r: &mut [f32], volume: f32, pan: f32) {
        if !self.playing {
            return;
        }

        let region = self.zone.region;
        let loops = match self.zone.loop_mode {
            LoopMode::NoLoop => false,
            LoopMode::LoopForever => true,
            LoopMode::LoopWhileOn => self.note_on,
        };
        let loop_start = region.loop_start.saturating_sub(region.start) as f64;
        let end = if loops {
            region.loop_end.saturating_sub(region.start)
        } else {
            region.end.saturating_sub(region.start)
        } as f64;
        let data = pool.get(region.start as usize..).unwrap_or(&[]);

        let gain_l = (1.0 - self.zone.pan) * (1.0 - pan) * volume * self.amp;
        let gain_r = self.zone.pan * pan * volume * self.amp;

        for (l, r) in out_l.iter_mut().zip(out_r.iter_mut()) {
            let Some(env) = self.envelope.level(self.note_on) else {
                self.playing = false;
                break;
            };

            let sample = data.get(self.position as usize).copied().unwrap_or(0) as f32 * PCM_SCALE;
            let mut left = sample * gain_l * env;
            let mut right = sample * gain_r * env;
            if let Some([lp_l, lp_r]) = &mut self.lowpass {
                left = lp_l.process(left);
                right = lp_r.process(right);
            }
            *l += left;
            *r += right;

            self.envelope.advance(self.envelope_step);
            self.position += self.speed as f64;

            if self.position >= end {
                if loops && end > loop_start {
                    while self.position >= end {
                        self.position -= end - loop_start;
                    }
                } else {
                    self.playing = false;
                    break;
                }
            }
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Pulse,
}

/// A looped mono waveform in `[-1, 1]`, for channels that play a plain
/// sample instead of a SoundFont patch.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoSample {
    data: Vec<f32>,
    sample_rate: f32,
    source_freq: f32,
}

impl MonoSample {
    pub fn new(data: Vec<f32>, sample_rate: f32, source_freq: f32) -> Self {
        Self {
            data,
            sample_rate,
            source_freq,
        }
    }

    /// One cycle of `waveform` over `frames` frames; its pitch is `sample_rate / frames`.
    pub fn single_cycle(waveform: Waveform, frames: usize, sample_rate: f32) -> Self {
        let frames = frames.max(1);
        let inv = 1.0 / frames as f32;
        let data = (0..frames)
            .map(|i| {
                let phase = i as f32 * inv;
                match waveform {
                    Waveform::Sine => (phase * TAU).sin(),
                    Waveform::Saw => -1.0 + 2.0 * phase,
                    Waveform::Pulse => {
                        if i < frames / 2 {
                            1.0
                        } else {
                            -1.0
                        }
                    }
                }
            })
            .collect();
        Self::new(data, sample_rate, sample_rate * inv)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Pitch of the stored waveform in Hz.
    pub fn source_freq(&self) -> f32 {
        self.source_freq
    }
}

/// Loops a [`MonoSample`] until note-off. No envelope.
#[derive(Debug, Clone)]
pub struct MonoSamplePlayer {
    sample: Arc<MonoSample>,
    position: f32,
    speed: f32,
    amp: f32,
    playing: bool,
}

impl MonoSamplePlayer {
    pub fn new(sample: Arc<MonoSample>, speed: f32, amp: f32) -> Self {
        let playing = !sample.is_empty();
        Self {
            sample,
            position: 0.0,
            speed,
            amp,
            playing,
        }
    }

    fn process(&mut self, out_l: &mut [f32], out_r: &mut [f32], volume: f32, pan: f32) {
        if !self.playing {
            return;
        }
        let data = self.sample.data();
        let size = data.len() as f32;
        let gain_l = self.amp * volume * (1.0 - pan);
        let gain_r = self.amp * volume * pan;

        for (l, r) in out_l.iter_mut().zip(out_r.iter_mut()) {
            let value = data.get(self.position as usize).copied().unwrap_or(0.0);
            *l += value * gain_l;
            *r += value * gain_r;

            self.position += self.speed;
            if self.position >= size {
                self.position %= size;
            }
        }
    }
}

/// What a voice is playing.
#[derive(Debug, Clone)]
pub enum SampleSource {
    Zone(ZonePlayer),
    Sample(MonoSamplePlayer),
}

impl SampleSource {
    pub fn process(&mut self, pool: &[i16], out_l: &mut [f32], out_r: &mut [f32], volume: f32, pan: f32) {
        match self {
            SampleSource::Zone(player) => player.process(pool, out_l, out_r, volume, pan),
            SampleSource::Sample(player) => player.process(out_l, out_r, volume, pan),
        }
    }

    pub fn note_off(&mut self) {
        match self {
            SampleSource::Zone(player) => player.note_on = false,
            SampleSource::Sample(player) => player.playing = false,
        }
    }

    pub fn is_sounding(&self) -> bool {
        match self {
            SampleSource::Zone(player) => player.playing,
            SampleSource::Sample(player) => player.playing,
        }
    }

    pub fn set_speed(&mut self, speed: f32) {
        match self {
            SampleSource::Zone(player) => player.speed = speed,
            SampleSource::Sample(player) => player.speed = speed,
        }
    }

    /// Exclusive class of the zone being played (0 for plain samples).
    pub fn exclusive_class(&self) -> u16 {
        match self {
            SampleSource::Zone(player) => player.zone.exclusive_class,
            SampleSource::Sample(_) => 0,
        }
    }
}
