//! The control-thread half of the sequencer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use rtrb::{Consumer, Producer, RingBuffer};
use uuid::Uuid;

use super::command::{
    DeviceSetup, DeviceSlot, Installation, JumpTarget, Preclick, Retired, SequencerCommand, Snapshot, TrackMix,
    TrackPlan,
};
use super::metronome::metronome_device;
use super::position::{PlaybackListener, PlaybackPosition};
use super::rack::MusicRack;
use super::transport::{SequencerEngine, Transport};
use crate::config::MetronomeSettings;
use crate::context::EngineContext;
use crate::error::EngineError;
use crate::sequencing::{MidiClip, Playlist, PlaylistBar, Song, Track};
use crate::soundfont::DRUM_BANK;
use crate::synth::MusicDevice;
use crate::PPQ;

/// Drives playback of a [`Song`] on a [`SequencerEngine`].
///
/// Every setter sends a command to the audio thread and fails only when the
/// command queue is full. Track indices past the last track are ignored.
pub struct Sequencer {
    context: EngineContext,
    snapshot: Arc<Snapshot>,
    mixes: Vec<TrackMix>,
    device_ids: Vec<Uuid>,
    commands: Producer<SequencerCommand>,
    retired: Consumer<Retired>,
    position: Arc<PlaybackPosition>,
    rendering: Arc<AtomicBool>,

    running: bool,
    playback_rate: f64,
    loop_enabled: bool,
    loop_start: Option<(usize, u32)>,
    loop_end: Option<(usize, u32)>,
    preclick_bar_count: u32,
    metronome: MetronomeSettings,
    master_gain: f32,
}

impl Sequencer {
    /// Create the control half and its audio-thread counterpart for `song`.
    pub fn build(song: &Song, context: EngineContext) -> (Self, SequencerEngine) {
        let config = &context.config;
        let (commands, command_rx) = RingBuffer::new(config.command_capacity);
        let (retired_tx, retired) = RingBuffer::new(config.command_capacity * 4);

        let snapshot = Arc::new(build_snapshot(song));
        let mixes: Vec<TrackMix> = song.tracks.iter().map(track_mix).collect();
        let devices: Vec<MusicDevice> = song
            .tracks
            .iter()
            .map(|track| new_device(&context, track.id, device_setup(track)))
            .collect();
        let device_ids = song.tracks.iter().map(|t| t.id).collect();

        let bpm = song.tempo.bpm_at(0, 0, config.default_bpm);
        let position = Arc::new(PlaybackPosition::new(bpm));
        let rendering = Arc::new(AtomicBool::new(true));

        let mut rack = MusicRack::new(metronome_device(&context), rendering.clone());
        rack.swap_devices(devices);
        rack.set_master_gain(config.master_gain);
        let transport = Transport::new(config, snapshot.clone(), mixes.clone(), position.clone(), bpm);

        debug!(
            "sequencer built: {} tracks, {} playlist bars, {} ticks",
            song.tracks.len(),
            snapshot.playlist.len(),
            snapshot.playlist.duration_ticks()
        );

        let sequencer = Self {
            snapshot,
            mixes,
            device_ids,
            commands,
            retired,
            position,
            rendering,
            running: false,
            playback_rate: 1.0,
            loop_enabled: false,
            loop_start: None,
            loop_end: None,
            preclick_bar_count: config.preclick_bar_count,
            metronome: config.metronome,
            master_gain: config.master_gain,
            context,
        };
        let engine = SequencerEngine::new(rack, transport, command_rx, retired_tx);
        (sequencer, engine)
    }

    /// Recompute everything derived from `song` and hand it to the audio
    /// thread. Tracks keep their device as long as their id is unchanged.
    pub fn rebuild(&mut self, song: &Song) -> Result<(), EngineError> {
        self.collect_garbage();

        let snapshot = Arc::new(build_snapshot(song));
        let mixes: Vec<TrackMix> = song.tracks.iter().map(track_mix).collect();
        let mut reused = 0;
        let slots: Vec<DeviceSlot> = song
            .tracks
            .iter()
            .map(|track| {
                let setup = device_setup(track);
                if self.device_ids.contains(&track.id) {
                    reused += 1;
                    DeviceSlot::Keep { id: track.id, setup }
                } else {
                    DeviceSlot::New(new_device(&self.context, track.id, setup))
                }
            })
            .collect();

        let installation = Installation {
            snapshot: snapshot.clone(),
            mixes: mixes.clone(),
            devices: Vec::with_capacity(slots.len()),
            slots,
        };
        self.send(SequencerCommand::Install(Box::new(installation)))?;

        debug!(
            "sequencer rebuilt: {} tracks ({} devices reused), {} playlist bars",
            song.tracks.len(),
            reused,
            snapshot.playlist.len()
        );
        self.device_ids = song.tracks.iter().map(|t| t.id).collect();
        self.snapshot = snapshot;
        self.mixes = mixes;
        self.send_loop_range()
    }

    fn send(&mut self, command: SequencerCommand) -> Result<(), EngineError> {
        let name = command.name();
        self.commands.push(command).map_err(|_| EngineError::QueueFull(name))
    }

    /// Drop everything the audio thread handed back. Returns how many values
    /// were collected.
    pub fn collect_garbage(&mut self) -> usize {
        let mut count = 0;
        while self.retired.pop().is_ok() {
            count += 1;
        }
        count
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn playlist(&self) -> &Playlist {
        &self.snapshot.playlist
    }

    // Transport

    pub fn start_playback(&mut self) -> Result<(), EngineError> {
        self.send(SequencerCommand::Start)?;
        self.running = true;
        Ok(())
    }

    pub fn stop_playback(&mut self) -> Result<(), EngineError> {
        self.send(SequencerCommand::Stop)?;
        self.running = false;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Continue from `tick_in_bar` of the first performance of song bar
    /// `bar`, after the pre-count if one is set. Unknown bars are ignored.
    pub fn jump_to(&mut self, bar: usize, tick_in_bar: u32) -> Result<(), EngineError> {
        let Some(target) = self.jump_target(bar, tick_in_bar) else {
            return Ok(());
        };
        self.send(SequencerCommand::JumpTo(target))
    }

    fn jump_target(&self, bar: usize, tick_in_bar: u32) -> Option<JumpTarget> {
        let snapshot = &self.snapshot;
        let playlist_index = snapshot.playlist.first_index_of_bar(bar)?;
        let playlist_bar = snapshot.playlist.get(playlist_index)?;
        let tick_in_bar = tick_in_bar.min(playlist_bar.duration.max(0) as u32);
        let preclick = (self.preclick_bar_count > 0).then(|| Preclick {
            bars: self.preclick_bar_count,
            time_signature: snapshot.time_signature(bar),
        });
        Some(JumpTarget {
            playlist_index,
            bar_index: bar,
            tick_in_bar,
            tick_in_playlist: (playlist_bar.tick + tick_in_bar as i64) as f64,
            bpm: snapshot.tempo.bpm_at(bar, tick_in_bar, self.context.config.default_bpm),
            preclick,
        })
    }

    /// Scale the tempo; 0.5 plays at half speed.
    pub fn set_playback_rate(&mut self, rate: f64) -> Result<(), EngineError> {
        let rate = rate.max(f64::EPSILON);
        self.send(SequencerCommand::SetPlaybackRate(rate))?;
        self.playback_rate = rate;
        Ok(())
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Stop or resume the rack without touching the transport.
    pub fn set_rendering_enabled(&self, enabled: bool) {
        self.rendering.store(enabled, Ordering::Release);
    }

    // Loop

    pub fn set_loop_playback_enabled(&mut self, enabled: bool) -> Result<(), EngineError> {
        self.send(SequencerCommand::SetLoopEnabled(enabled))?;
        self.loop_enabled = enabled;
        Ok(())
    }

    pub fn is_loop_playback_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn set_loop_start_indicator(&mut self, bar: usize, tick_in_bar: u32) -> Result<(), EngineError> {
        self.loop_start = Some((bar, tick_in_bar));
        self.send_loop_range()
    }

    pub fn set_loop_end_indicator(&mut self, bar: usize, tick_in_bar: u32) -> Result<(), EngineError> {
        self.loop_end = Some((bar, tick_in_bar));
        self.send_loop_range()
    }

    pub fn loop_start_indicator(&self) -> Option<(usize, u32)> {
        self.loop_start
    }

    pub fn loop_end_indicator(&self) -> Option<(usize, u32)> {
        self.loop_end
    }

    /// Loop window in playlist ticks. Unset indicators, or ones on bars
    /// missing from the playlist, fall back to the first four quarters.
    pub fn loop_range_ticks(&self) -> (f64, f64) {
        let tick_of = |indicator: Option<(usize, u32)>| {
            let (bar, tick_in_bar) = indicator?;
            let playlist_bar = self.snapshot.playlist.first_occurrence_of_bar(bar)?;
            Some((playlist_bar.tick + tick_in_bar as i64) as f64)
        };
        let start = tick_of(self.loop_start).unwrap_or(0.0);
        let end = tick_of(self.loop_end).unwrap_or(start + 4.0 * PPQ as f64);
        (start, end)
    }

    fn send_loop_range(&mut self) -> Result<(), EngineError> {
        if self.loop_start.is_none() && self.loop_end.is_none() {
            return Ok(());
        }
        let (start, end) = self.loop_range_ticks();
        self.send(SequencerCommand::SetLoopRange { start, end })
    }

    pub fn set_preclick_bar_count(&mut self, bars: u32) {
        self.preclick_bar_count = bars;
    }

    pub fn preclick_bar_count(&self) -> u32 {
        self.preclick_bar_count
    }

    // Mix

    pub fn set_track_volume(&mut self, track: usize, volume: f32) -> Result<(), EngineError> {
        let Some(mix) = self.mixes.get_mut(track) else {
            return Ok(());
        };
        mix.volume = volume;
        self.send(SequencerCommand::SetTrackVolume { track, volume })
    }

    pub fn set_track_pan(&mut self, track: usize, pan: f32) -> Result<(), EngineError> {
        let Some(mix) = self.mixes.get_mut(track) else {
            return Ok(());
        };
        mix.pan = pan;
        self.send(SequencerCommand::SetTrackPan { track, pan })
    }

    pub fn set_track_solo(&mut self, track: usize, solo: bool) -> Result<(), EngineError> {
        let Some(mix) = self.mixes.get_mut(track) else {
            return Ok(());
        };
        mix.solo = solo;
        self.send(SequencerCommand::SetTrackSolo { track, solo })
    }

    pub fn set_track_mute(&mut self, track: usize, mute: bool) -> Result<(), EngineError> {
        let Some(mix) = self.mixes.get_mut(track) else {
            return Ok(());
        };
        mix.mute = mute;
        self.send(SequencerCommand::SetTrackMute { track, mute })
    }

    /// Transpose the track's notes by `capo` semitones from the next note on.
    pub fn set_track_capo(&mut self, track: usize, capo: i8) -> Result<(), EngineError> {
        let Some(mix) = self.mixes.get_mut(track) else {
            return Ok(());
        };
        mix.capo = capo;
        self.send(SequencerCommand::SetTrackCapo { track, capo })
    }

    /// Switch the track's instrument while playing.
    pub fn set_track_midi_program(&mut self, track: usize, program: u8) -> Result<(), EngineError> {
        let Some(mix) = self.mixes.get_mut(track) else {
            return Ok(());
        };
        mix.program = program;
        self.send(SequencerCommand::SetTrackProgram { track, program })
    }

    pub fn track_mix(&self, track: usize) -> Option<&TrackMix> {
        self.mixes.get(track)
    }

    /// Play a live message on the track's device at the start of the next block.
    pub fn send_midi(&mut self, track: usize, status: u8, data1: u8, data2: u8) -> Result<(), EngineError> {
        if track >= self.mixes.len() {
            return Ok(());
        }
        self.send(SequencerCommand::SendMidi {
            track,
            status,
            data1,
            data2,
        })
    }

    pub fn set_metronome(&mut self, settings: MetronomeSettings) -> Result<(), EngineError> {
        self.send(SequencerCommand::SetMetronome(settings))?;
        self.metronome = settings;
        Ok(())
    }

    pub fn metronome(&self) -> &MetronomeSettings {
        &self.metronome
    }

    pub fn set_master_gain(&mut self, gain: f32) -> Result<(), EngineError> {
        self.send(SequencerCommand::SetMasterGain(gain))?;
        self.master_gain = gain;
        Ok(())
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Register a callback run on the audio thread while playing.
    pub fn add_listener(&mut self, listener: impl PlaybackListener + 'static) -> Result<(), EngineError> {
        self.send(SequencerCommand::AddListener(Box::new(listener)))
    }

    // Position

    pub fn bar_index_currently_playing(&self) -> Option<usize> {
        self.position.load().bar_index
    }

    /// Song bar performed after the current one, following the playlist.
    pub fn next_bar_index_to_play(&self) -> Option<usize> {
        let index = self.position.load().playlist_index.map_or(0, |i| i + 1);
        self.snapshot.playlist.get(index).map(|b| b.bar_index)
    }

    pub fn tick_in_bar_playing(&self) -> u64 {
        self.position.load().tick_in_bar
    }

    pub fn tick_in_playlist(&self) -> u64 {
        self.position.load().tick_in_playlist
    }

    pub fn current_bpm(&self) -> f64 {
        self.position.load().bpm
    }

    /// True once the position passed the end of the playlist. Never true
    /// while looping.
    pub fn is_playback_finished(&self) -> bool {
        !self.loop_enabled && self.tick_in_playlist() as i64 >= self.playlist_duration_ticks()
    }

    pub fn playlist_duration_ticks(&self) -> i64 {
        self.snapshot.playlist.duration_ticks()
    }

    pub fn first_occurrence_of_bar(&self, bar: usize) -> Option<PlaylistBar> {
        self.snapshot.playlist.first_occurrence_of_bar(bar).copied()
    }

    pub fn device_id_for_track(&self, track: usize) -> Option<Uuid> {
        self.device_ids.get(track).copied()
    }
}

fn build_snapshot(song: &Song) -> Snapshot {
    let mut playlist = Playlist::from_song(song);
    let tracks: Vec<TrackPlan> = song
        .tracks
        .iter()
        .map(|track| TrackPlan {
            device_id: track.id,
            name: track.name.clone(),
            kind: track.kind,
            clips: (0..song.bars.len()).map(|bar| MidiClip::for_bar(track, bar)).collect(),
        })
        .collect();

    for (index, bar) in song.bars.iter().enumerate() {
        let bar_ticks = bar.duration_ticks() as i32;
        let (before, after) = tracks
            .iter()
            .filter_map(|t| t.clip(index))
            .fold((0, 0), |(before, after), clip| {
                (before.max(clip.ticks_before()), after.max(clip.ticks_after(bar_ticks)))
            });
        if before > 0 || after > 0 {
            playlist.extend_bar(index, before as i64, after as i64);
        }
    }

    Snapshot {
        playlist,
        tempo: song.tempo.clone(),
        time_signatures: song.bars.iter().map(|b| b.time_signature).collect(),
        tracks,
    }
}

fn bank_of(track: &Track) -> u16 {
    if track.is_drums() {
        DRUM_BANK
    } else {
        0
    }
}

fn track_mix(track: &Track) -> TrackMix {
    TrackMix {
        volume: track.volume,
        pan: track.pan,
        solo: track.solo,
        mute: track.mute,
        capo: track.capo,
        program: track.midi_program,
        bank: bank_of(track),
        clip_program: track.midi_program,
        program_change_pending: false,
    }
}

fn device_setup(track: &Track) -> DeviceSetup {
    DeviceSetup {
        program: if track.is_drums() { 0 } else { track.midi_program },
        bank: bank_of(track),
        monophonic: track.is_tablature(),
    }
}

fn new_device(context: &EngineContext, id: Uuid, setup: DeviceSetup) -> MusicDevice {
    let config = &context.config;
    let mut device = MusicDevice::new(
        id,
        config.sample_rate,
        context.soundfont.clone(),
        config.device_event_capacity,
    );
    device.set_program_of_all_channels(setup.program, setup.bank);
    device.set_monophonic(setup.monophonic);
    device
}
