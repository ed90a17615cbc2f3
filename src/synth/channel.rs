use std::sync::Arc;

use super::source::MonoSample;
use super::voice::Voice;
use crate::io::converter::pitch_wheel_to_semitones;
use crate::io::midi::{CC_ALL_SOUND_OFF, CC_BANK_SELECT};
use crate::soundfont::SoundFont;

pub const VOICES_PER_CHANNEL: usize = 16;

/// What note-ons on a channel play.
#[derive(Debug, Clone, Default)]
pub enum ChannelInstrument {
    /// No patch at the selected `(program, bank)`; note-ons are ignored.
    #[default]
    None,
    /// Index into the device's SoundFont patches.
    Patch(usize),
    Sample(Arc<MonoSample>),
}

/// One MIDI channel: program/bank selection and a fixed pool of voices.
#[derive(Debug, Clone)]
pub struct SynthChannel {
    voices: [Voice; VOICES_PER_CHANNEL],
    program: u8,
    bank: u16,
    instrument: ChannelInstrument,
    monophonic: bool,
}

impl SynthChannel {
    pub fn new(output_rate: f32) -> Self {
        Self {
            voices: std::array::from_fn(|_| Voice::new(output_rate)),
            program: 0,
            bank: 0,
            instrument: ChannelInstrument::None,
            monophonic: false,
        }
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    pub fn bank(&self) -> u16 {
        self.bank
    }

    pub fn instrument(&self) -> &ChannelInstrument {
        &self.instrument
    }

    /// Play `sample` instead of a SoundFont patch until the next program change.
    pub fn set_sample(&mut self, sample: Arc<MonoSample>) {
        self.instrument = ChannelInstrument::Sample(sample);
    }

    pub fn set_monophonic(&mut self, monophonic: bool) {
        self.monophonic = monophonic;
    }

    pub fn is_monophonic(&self) -> bool {
        self.monophonic
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn sounding_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_sounding()).count()
    }

    pub fn note_on(&mut self, font: Option<&SoundFont>, pitch: u8, velocity: u8) {
        if self.monophonic {
            self.all_sound_off();
        }

        match &self.instrument {
            ChannelInstrument::None => {}
            ChannelInstrument::Patch(index) => {
                // only the first matching zone sounds; overlapping zones are not layered
                let Some(zone) = font
                    .and_then(|f| f.patch(*index))
                    .and_then(|p| p.find_generator(pitch, velocity))
                else {
                    return;
                };
                let class = zone.exclusive_class;
                let voice = self.allocate(pitch, class);
                self.voices[voice].play_zone(zone, pitch, velocity);
            }
            ChannelInstrument::Sample(sample) => {
                let sample = sample.clone();
                let voice = self.allocate(pitch, 0);
                self.voices[voice].play_sample(&sample, pitch, velocity);
            }
        }
    }

    pub fn note_off(&mut self, pitch: u8) {
        for voice in &mut self.voices {
            if voice.is_on() && voice.pitch() == pitch {
                voice.stop_note();
            }
        }
    }

    pub fn program_change(&mut self, font: Option<&SoundFont>, program: u8) {
        self.program = program;
        self.instrument = font
            .and_then(|f| f.patch_index(program as u16, self.bank))
            .map_or(ChannelInstrument::None, ChannelInstrument::Patch);
    }

    pub fn control_change(&mut self, controller: u8, value: u8) {
        match controller {
            CC_BANK_SELECT => self.bank = value as u16,
            CC_ALL_SOUND_OFF => self.all_sound_off(),
            _ => {}
        }
    }

    /// Bank select taking a full bank number (drum kits live at 128, past the 7-bit range).
    pub fn select_bank(&mut self, bank: u16) {
        self.bank = bank;
    }

    pub fn pitch_wheel(&mut self, lsb: u8, msb: u8) {
        let semitones = pitch_wheel_to_semitones(lsb, msb);
        for voice in &mut self.voices {
            voice.set_pitch_wheel(semitones);
        }
    }

    pub fn all_sound_off(&mut self) {
        for voice in &mut self.voices {
            if voice.is_sounding() {
                voice.stop_note();
                voice.brutal_stop();
            }
        }
    }

    pub fn process(&mut self, pool: &[i16], out_l: &mut [f32], out_r: &mut [f32], volume: f32, pan: f32) {
        for voice in &mut self.voices {
            if voice.is_sounding() {
                voice.process(pool, out_l, out_r, volume, pan);
            }
        }
    }

    /// Pick the voice for a new note.
    ///
    /// Voices of the same exclusive class are cut first. Then a voice that
    /// last played this pitch is reused, else the first idle one, else
    /// voice 0 is stolen. Every cut goes through the voice crossfade.
    fn allocate(&mut self, pitch: u8, exclusive_class: u16) -> usize {
        if exclusive_class != 0 {
            for voice in &mut self.voices {
                if voice.exclusive_class() == exclusive_class {
                    voice.brutal_stop();
                }
            }
        }

        if let Some(index) = self.voices.iter().position(|v| v.pitch() == pitch) {
            self.voices[index].brutal_stop();
            return index;
        }

        if let Some(index) = self.voices.iter().position(|v| !v.is_sounding()) {
            return index;
        }

        self.voices[0].brutal_stop();
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::source::Waveform;

    fn sample_channel() -> SynthChannel {
        let mut channel = SynthChannel::new(44_100.0);
        channel.set_sample(Arc::new(MonoSample::single_cycle(Waveform::Sine, 100, 44_100.0)));
        channel
    }

    fn render(channel: &mut SynthChannel, frames: usize) {
        let (mut l, mut r) = (vec![0.0; frames], vec![0.0; frames]);
        channel.process(&[], &mut l, &mut r, 1.0, 0.5);
    }

    #[test]
    fn chords_use_separate_voices() {
        let mut channel = sample_channel();
        for pitch in [60, 64, 67] {
            channel.note_on(None, pitch, 100);
        }
        assert_eq!(channel.sounding_voices(), 3);
        channel.note_off(64);
        assert_eq!(channel.sounding_voices(), 2);
    }

    #[test]
    fn same_pitch_reuses_voice() {
        let mut channel = sample_channel();
        channel.note_on(None, 60, 100);
        render(&mut channel, 128);
        channel.note_on(None, 60, 100);
        render(&mut channel, 128);
        assert_eq!(channel.sounding_voices(), 1);
    }

    #[test]
    fn monophonic_cuts_previous_note() {
        let mut channel = sample_channel();
        channel.set_monophonic(true);
        channel.note_on(None, 40, 100);
        channel.note_on(None, 45, 100);
        render(&mut channel, 128);
        assert_eq!(channel.sounding_voices(), 1);
    }

    #[test]
    fn full_pool_steals_voice_zero() {
        let mut channel = sample_channel();
        for pitch in 0..VOICES_PER_CHANNEL as u8 {
            channel.note_on(None, 40 + pitch, 100);
        }
        render(&mut channel, 128);
        channel.note_on(None, 100, 100);
        render(&mut channel, 128);
        assert_eq!(channel.voices()[0].pitch(), 100);
        assert_eq!(channel.sounding_voices(), VOICES_PER_CHANNEL);
    }

    #[test]
    fn bank_select_and_all_sound_off() {
        let mut channel = sample_channel();
        channel.control_change(CC_BANK_SELECT, 5);
        assert_eq!(channel.bank(), 5);
        channel.note_on(None, 60, 100);
        channel.control_change(CC_ALL_SOUND_OFF, 0);
        render(&mut channel, 128);
        assert_eq!(channel.sounding_voices(), 0);
    }

    #[test]
    fn program_change_without_font_clears_instrument() {
        let mut channel = sample_channel();
        channel.program_change(None, 3);
        assert_eq!(channel.program(), 3);
        assert!(matches!(channel.instrument(), ChannelInstrument::None));
        channel.note_on(None, 60, 100);
        assert_eq!(channel.sounding_voices(), 0);
    }
}
