mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{build, quarters, run, song_with, EXCLUSIVE_PROGRAM};
use scoreplay::engine::PositionReport;
use scoreplay::sequencing::{TempoItem, TempoTimeline, Track, TrackKind};
use scoreplay::SequencerEngine;

/// Frames per tick at 120 bpm and 44.1 kHz.
const FRAMES_PER_TICK: f64 = 44_100.0 / 960.0;
/// Sounding length of a quarter note in ticks.
const QUARTER_SOUNDING: f64 = 475.0;

fn pending(engine: &SequencerEngine, track: usize, status: u8) -> Vec<(u32, u8)> {
    engine
        .rack()
        .device(track)
        .map(|device| {
            device
                .pending_events()
                .filter(|e| e.status == status)
                .map(|e| (e.offset, e.data1))
                .collect()
        })
        .unwrap_or_default()
}

fn assert_near(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

#[test]
fn first_note_starts_on_the_first_frame() {
    let song = song_with(1, 120, quarters(&[60]));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();

    let (mut l, mut r) = (vec![0.0; 64], vec![0.0; 64]);
    engine.process(&mut l, &mut r);

    assert!(pending(&engine, 0, 0x90).is_empty());
    let offs = pending(&engine, 0, 0x80);
    assert_eq!(offs.len(), 1);
    assert_eq!(offs[0].1, 60);
    // a quarter is half a second; the note sounds for 99% of it
    assert_near((offs[0].0 + 64) as f64, 22_050.0, 22_050.0 * 0.02);
    assert!(l.iter().any(|s| s.abs() > 0.0));
}

#[test]
fn second_beat_is_sample_accurate() {
    let song = song_with(1, 120, quarters(&[60, 64]));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();

    run(&mut engine, 43, 512);
    assert!(pending(&engine, 0, 0x80).iter().all(|(_, pitch)| *pitch != 64));

    run(&mut engine, 1, 512);
    let off = pending(&engine, 0, 0x80)
        .into_iter()
        .find(|(_, pitch)| *pitch == 64)
        .map(|(offset, _)| offset as f64 + 44.0 * 512.0);
    let expected = (480.0 + QUARTER_SOUNDING) * FRAMES_PER_TICK;
    assert_near(off.unwrap_or_default(), expected, 3.0);
}

#[test]
fn loop_wraps_to_loop_start() {
    let song = song_with(2, 120, quarters(&[60, 62, 64, 65]));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.set_loop_playback_enabled(true).unwrap();
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();

    // 90112 frames is 1961.6 ticks; the default loop is the first 1920
    run(&mut engine, 44, 2048);
    let tick = sequencer.tick_in_playlist();
    assert!((40..=42).contains(&tick), "tick {tick}");
    assert!(!sequencer.is_playback_finished());
    assert_eq!(sequencer.bar_index_currently_playing(), Some(0));
}

#[test]
fn playback_finishes_at_the_end_without_loop() {
    let song = song_with(1, 120, quarters(&[60]));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();

    run(&mut engine, 40, 2048);
    assert!(!sequencer.is_playback_finished());
    run(&mut engine, 4, 2048);
    assert!(sequencer.is_playback_finished());
    assert!(sequencer.is_running());
}

#[test]
fn preclick_holds_the_song_back() {
    let song = song_with(1, 120, quarters(&[60]));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.set_preclick_bar_count(1);
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();

    run(&mut engine, 43, 2048);
    assert_eq!(sequencer.tick_in_playlist(), 0);
    assert!(pending(&engine, 0, 0x80).is_empty());

    // the bar of clicks ends 88200 frames in; the song starts right there
    run(&mut engine, 1, 2048);
    let off = pending(&engine, 0, 0x80).first().map(|(offset, _)| *offset as f64 + 44.0 * 2048.0);
    let expected = 88_200.0 + QUARTER_SOUNDING * FRAMES_PER_TICK;
    assert_near(off.unwrap_or_default(), expected, 3.0);
    assert!(sequencer.tick_in_playlist() > 0);
}

#[test]
fn listeners_run_about_thirty_times_a_second() {
    let song = song_with(4, 120, quarters(&[60]));
    let (mut sequencer, mut engine) = build(&song);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    sequencer
        .add_listener(move |_: &PositionReport| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

    run(&mut engine, 20, 512);
    assert_eq!(calls.load(Ordering::Relaxed), 0);

    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();
    // one second of 512-frame blocks; a report every 1470 frames
    run(&mut engine, 86, 512);
    assert_eq!(calls.load(Ordering::Relaxed), 28);
}

#[test]
fn tempo_mark_takes_effect_in_its_bar() {
    let mut song = song_with(2, 120, quarters(&[60]));
    song.tempo = TempoTimeline::constant(120).insert(TempoItem::new(1, 0, 60));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();

    run(&mut engine, 40, 2048);
    assert_eq!(sequencer.current_bpm(), 120.0);
    run(&mut engine, 4, 2048);
    assert_eq!(sequencer.current_bpm(), 60.0);
    assert_eq!(sequencer.bar_index_currently_playing(), Some(1));
}

#[test]
fn jump_starts_from_the_target_tick() {
    let song = song_with(2, 120, quarters(&[60, 64, 67, 72]));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();
    run(&mut engine, 1, 64);

    sequencer.jump_to(1, 960).unwrap();
    run(&mut engine, 1, 64);
    let offs = pending(&engine, 0, 0x80);
    assert_eq!(offs.iter().map(|(_, pitch)| *pitch).collect::<Vec<_>>(), vec![67]);
    assert_eq!(sequencer.bar_index_currently_playing(), Some(1));
    assert_eq!(sequencer.tick_in_playlist(), 1920 + 961);
}

#[test]
fn stop_silences_every_device() {
    let song = song_with(1, 120, quarters(&[60]));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();
    run(&mut engine, 4, 256);
    let sounding = |engine: &SequencerEngine| {
        engine
            .rack()
            .device(0)
            .and_then(|d| d.channel(0))
            .map_or(0, |c| c.sounding_voices())
    };
    assert_eq!(sounding(&engine), 1);

    sequencer.stop_playback().unwrap();
    run(&mut engine, 1, 64);
    assert_eq!(sounding(&engine), 0);
    assert!(pending(&engine, 0, 0x80).is_empty());

    let tick = sequencer.tick_in_playlist();
    run(&mut engine, 10, 512);
    assert_eq!(sequencer.tick_in_playlist(), tick);
}

#[test]
fn solo_silences_the_other_tracks() {
    let mut song = song_with(1, 120, quarters(&[60]));
    song.tracks.push(Track::new("Bass", TrackKind::Standard).program(33));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.set_track_solo(1, true).unwrap();
    run(&mut engine, 1, 64);

    let volume = |track: usize| engine.rack().device(track).map(|d| d.volume());
    assert_eq!(volume(0), Some(0.0));
    assert_eq!(volume(1), Some(1.0));

    sequencer.set_track_solo(1, false).unwrap();
    sequencer.set_track_mute(1, true).unwrap();
    run(&mut engine, 1, 64);
    let volume = |track: usize| engine.rack().device(track).map(|d| d.volume());
    assert_eq!(volume(0), Some(1.0));
    assert_eq!(volume(1), Some(0.0));
}

#[test]
fn hot_program_change_survives_clip_program_changes() {
    let song = song_with(1, 120, quarters(&[60, 62]));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.set_track_midi_program(0, EXCLUSIVE_PROGRAM).unwrap();
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();
    run(&mut engine, 1, 64);

    let device = engine.rack().device(0).unwrap();
    assert_eq!(device.channel(0).map(|c| c.program()), Some(EXCLUSIVE_PROGRAM));
    assert_eq!(device.channel(7).map(|c| c.program()), Some(EXCLUSIVE_PROGRAM));
    assert_eq!(sequencer.track_mix(0).map(|m| m.program), Some(EXCLUSIVE_PROGRAM));
}

#[test]
fn capo_transposes_scheduled_notes() {
    let song = song_with(1, 120, quarters(&[60]));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.set_track_capo(0, -3).unwrap();
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();
    run(&mut engine, 1, 64);
    assert_eq!(pending(&engine, 0, 0x80).first().map(|(_, pitch)| *pitch), Some(57));
}

#[test]
fn half_rate_doubles_note_length() {
    let song = song_with(1, 120, quarters(&[60]));
    let (mut sequencer, mut engine) = build(&song);
    sequencer.set_playback_rate(0.5).unwrap();
    sequencer.jump_to(0, 0).unwrap();
    sequencer.start_playback().unwrap();
    run(&mut engine, 1, 64);
    let off = pending(&engine, 0, 0x80).first().map(|(offset, _)| *offset as f64 + 64.0);
    assert_near(off.unwrap_or_default(), 2.0 * QUARTER_SOUNDING * FRAMES_PER_TICK, 2.0);
}
