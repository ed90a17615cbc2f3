mod common;

use common::{test_bank, EXCLUSIVE_PROGRAM, SAMPLE_RATE, SILENT_SUSTAIN_PROGRAM, SINE_PROGRAM};
use scoreplay::soundfont::DRUM_BANK;
use scoreplay::synth::{MusicDevice, VoiceState, VOICES_PER_CHANNEL, XFADE_SIZE};
use uuid::Uuid;

fn device(program: u8, bank: u16) -> MusicDevice {
    let mut device = MusicDevice::new(Uuid::new_v4(), SAMPLE_RATE, Some(test_bank()), 64);
    device.set_program_of_all_channels(program, bank);
    device
}

fn render(device: &mut MusicDevice, frames: usize) -> Vec<f32> {
    let (mut l, mut r) = (vec![0.0; frames], vec![0.0; frames]);
    device.process(&mut l, &mut r);
    l
}

fn sounding(device: &MusicDevice, channel: usize) -> usize {
    device.channel(channel).map_or(0, |c| c.sounding_voices())
}

#[test]
fn exclusive_class_cuts_the_previous_note() {
    let mut device = device(EXCLUSIVE_PROGRAM, 0);
    device.send_midi(0x90, 60, 100);
    render(&mut device, 128);
    device.send_midi(0x90, 64, 100);
    assert_eq!(sounding(&device, 0), 2);

    render(&mut device, XFADE_SIZE);
    assert_eq!(sounding(&device, 0), 1);
    let states: Vec<VoiceState> = device
        .channel(0)
        .map(|c| c.voices().iter().map(|v| v.state()).collect())
        .unwrap_or_default();
    assert_eq!(states.iter().filter(|s| **s == VoiceState::Active).count(), 1);
}

#[test]
fn notes_without_class_overlap() {
    let mut device = device(SINE_PROGRAM, 0);
    device.send_midi(0x90, 60, 100);
    device.send_midi(0x90, 64, 100);
    render(&mut device, 4 * XFADE_SIZE);
    assert_eq!(sounding(&device, 0), 2);
}

#[test]
fn silent_sustain_ends_with_the_key_held() {
    let mut device = device(SILENT_SUSTAIN_PROGRAM, 0);
    device.send_midi(0x90, 60, 100);
    render(&mut device, 512);
    assert_eq!(sounding(&device, 0), 0);
    let tail = render(&mut device, 256);
    assert!(tail.iter().all(|s| *s == 0.0));
}

#[test]
fn release_tail_fades_to_silence() {
    let mut device = device(SINE_PROGRAM, 0);
    device.send_midi(0x90, 69, 127);
    render(&mut device, 256);
    device.send_midi(0x80, 69, 0);
    render(&mut device, 64);

    let state = device.channel(0).and_then(|c| c.voices().first()).map(|v| v.state());
    assert_eq!(state, Some(VoiceState::Releasing));

    // release of -6000 timecents is about 1400 frames
    render(&mut device, 4096);
    assert_eq!(sounding(&device, 0), 0);
}

#[test]
fn drum_kit_plays_on_the_percussion_channel() {
    let mut device = device(0, DRUM_BANK);
    device.send_midi(0x99, 36, 110);
    let out = render(&mut device, 256);
    assert_eq!(sounding(&device, 9), 1);
    assert!(out.iter().any(|s| s.abs() > 0.0));
}

#[test]
fn missing_program_stays_silent() {
    let mut device = device(99, 0);
    device.send_midi(0x90, 60, 100);
    let out = render(&mut device, 256);
    assert_eq!(sounding(&device, 0), 0);
    assert!(out.iter().all(|s| *s == 0.0));
}

#[test]
fn full_pool_steals_instead_of_growing() {
    let mut device = device(SINE_PROGRAM, 0);
    for pitch in 40..40 + VOICES_PER_CHANNEL as u8 + 4 {
        device.send_midi(0x90, pitch, 90);
    }
    render(&mut device, 2 * XFADE_SIZE);
    assert_eq!(sounding(&device, 0), VOICES_PER_CHANNEL);
}

#[test]
fn scheduled_events_wait_for_their_frame() {
    let mut device = device(SINE_PROGRAM, 0);
    assert!(device.schedule_midi(0x90, 60, 100, 300));
    let out = render(&mut device, 256);
    assert!(out.iter().all(|s| *s == 0.0));
    assert_eq!(sounding(&device, 0), 0);

    let out = render(&mut device, 256);
    assert!(out[..44].iter().all(|s| *s == 0.0));
    assert!(out[44..].iter().any(|s| s.abs() > 0.0));
}
