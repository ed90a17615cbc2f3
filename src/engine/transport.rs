//! The audio-thread half of the sequencer.
//!
//! [`SequencerEngine::process`] drains pending commands, then renders the
//! rack with a [`Transport`] as its hooks: before the devices render, the
//! transport converts the block length into a tick window and schedules every
//! clip event, metronome click and tempo change that falls inside it.

use std::sync::Arc;

use rtrb::{Consumer, Producer};

use super::clock::Clock;
use super::command::{DeviceSlot, Installation, Preclick, Retired, SequencerCommand, Snapshot, TrackMix};
use super::metronome::schedule_clicks;
use super::position::{PlaybackListener, PlaybackPosition, PositionReport};
use super::rack::{MusicRack, RenderHooks};
use crate::config::{EngineConfig, MetronomeSettings};
use crate::io::midi::{CC_ALL_SOUND_OFF, CONTROL_CHANGE, DRUM_CHANNEL, NOTE_OFF, NOTE_ON, PROGRAM_CHANGE};
use crate::sequencing::{Intersection, MidiClip};
use crate::synth::MusicDevice;
use crate::PPQ;

/// Where the last rendered window ended, in bar terms.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    playlist_index: Option<usize>,
    bar_index: Option<usize>,
    tick_in_bar: f64,
}

/// Playback state owned by the audio thread.
pub struct Transport {
    sample_rate: f64,
    snapshot: Arc<Snapshot>,
    mixes: Vec<TrackMix>,
    any_solo: bool,
    position: Arc<PlaybackPosition>,
    listeners: Vec<Box<dyn PlaybackListener>>,
    frames_per_report: u64,
    frames_since_report: u64,

    running: bool,
    bpm: f64,
    new_bpm: f64,
    playback_rate: f64,
    playback_tick: f64,
    cursor: Cursor,

    loop_enabled: bool,
    loop_start: f64,
    loop_end: f64,

    preclick: Option<Preclick>,
    preclick_tick: f64,
    metronome: MetronomeSettings,
}

impl Transport {
    pub(crate) fn new(
        config: &EngineConfig,
        snapshot: Arc<Snapshot>,
        mixes: Vec<TrackMix>,
        position: Arc<PlaybackPosition>,
        bpm: f64,
    ) -> Self {
        Self {
            sample_rate: config.sample_rate as f64,
            snapshot,
            mixes,
            any_solo: false,
            position,
            listeners: Vec::with_capacity(config.max_listeners),
            frames_per_report: config.frames_per_listener_update().max(1),
            frames_since_report: 0,
            running: false,
            bpm,
            new_bpm: bpm,
            playback_rate: 1.0,
            playback_tick: 0.0,
            cursor: Cursor::default(),
            loop_enabled: false,
            loop_start: 0.0,
            loop_end: 4.0 * PPQ as f64,
            preclick: None,
            preclick_tick: 0.0,
            metronome: config.metronome,
        }
    }

    fn clock(&self) -> Clock {
        Clock::new(self.sample_rate, self.bpm, self.playback_rate)
    }

    fn report(&self) -> PositionReport {
        PositionReport {
            playlist_index: self.cursor.playlist_index,
            bar_index: self.cursor.bar_index,
            tick_in_bar: self.cursor.tick_in_bar.max(0.0) as u64,
            tick_in_playlist: self.playback_tick.max(0.0) as u64,
            bpm: self.bpm,
        }
    }

    fn publish(&mut self, frames: usize) {
        let report = self.report();
        self.position.store(&report);
        if !self.running {
            return;
        }
        self.frames_since_report += frames as u64;
        if self.frames_since_report >= self.frames_per_report {
            self.frames_since_report = 0;
            for listener in &mut self.listeners {
                listener.on_position(&report);
            }
        }
    }

    fn preclick_pending(&self) -> bool {
        self.preclick.is_some()
    }

    /// Click the armed pre-count for up to `ticks`; returns the ticks consumed.
    fn render_preclick(&mut self, metronome: &mut MusicDevice, clock: &Clock, ticks: f64) -> f64 {
        let Some(preclick) = self.preclick else {
            return 0.0;
        };
        let bar = preclick.bar_ticks();
        let start = self.preclick_tick;
        let end = (start + ticks).min(preclick.duration_ticks());

        let mut segment = start;
        while segment < end && bar > 0.0 {
            let bar_number = (segment / bar).floor();
            let bar_start = bar_number * bar;
            let segment_end = end.min(bar_start + bar);
            if segment_end <= segment {
                break;
            }
            schedule_clicks(
                metronome,
                &self.metronome,
                clock,
                preclick.time_signature,
                segment - bar_start,
                segment_end - bar_start,
                clock.delay(segment - start),
            );
            segment = segment_end;
        }

        if end >= preclick.duration_ticks() {
            self.preclick = None;
            self.preclick_tick = 0.0;
        } else {
            self.preclick_tick = end;
        }
        end - start
    }

    /// Schedule everything in the tick window `[t0, t1)`, `base_delay` frames
    /// into the block.
    fn render_tick_range(
        &mut self,
        devices: &mut [MusicDevice],
        metronome: &mut MusicDevice,
        clock: &Clock,
        t0: f64,
        t1: f64,
        base_delay: u32,
    ) {
        let Transport {
            snapshot,
            mixes,
            cursor,
            new_bpm,
            metronome: settings,
            ..
        } = self;

        for (index, bar) in snapshot.playlist.bars().iter().enumerate() {
            let Some(intersection) = bar.intersects(t0, t1) else {
                continue;
            };
            let bar_tick = bar.tick as f64;

            for ((track, mix), device) in snapshot.tracks.iter().zip(mixes.iter()).zip(devices.iter_mut()) {
                if let Some(clip) = track.clip(bar.bar_index) {
                    schedule_clip(device, clip, mix, clock, bar_tick, t0, t1, base_delay);
                }
            }

            if intersection != Intersection::Normal {
                continue;
            }
            cursor.playlist_index = Some(index);
            cursor.bar_index = Some(bar.bar_index);
            cursor.tick_in_bar = (t1 - bar_tick).clamp(0.0, bar.duration as f64);

            if settings.enabled {
                let time_signature = snapshot.time_signature(bar.bar_index);
                schedule_clicks(metronome, settings, clock, time_signature, t0 - bar_tick, t1 - bar_tick, base_delay);
            }
            if let Some(item) = snapshot.tempo.item_at(bar.bar_index, cursor.tick_in_bar as u32) {
                *new_bpm = item.bpm();
            }
        }
    }
}

impl RenderHooks for Transport {
    fn will_render_rack(&mut self, devices: &mut [MusicDevice], metronome: &mut MusicDevice, frames: usize) {
        self.any_solo = self.mixes.iter().any(|m| m.solo);
        if !self.running {
            self.publish(frames);
            return;
        }

        let clock = self.clock();
        self.new_bpm = self.bpm;

        let mut ticks = clock.ticks_from_samples(frames as f64);
        let preclick_ticks = self.render_preclick(metronome, &clock, ticks);
        let sample_delay = clock.delay(preclick_ticks);
        ticks -= preclick_ticks;

        let t0 = self.playback_tick;
        let mut t1 = t0 + ticks;
        if ticks > 0.0 {
            let (start, end) = (self.loop_start, self.loop_end);
            if self.loop_enabled && start < end && t0 <= end && end <= t1 {
                self.render_tick_range(devices, metronome, &clock, t0, end, sample_delay);
                t1 = start + (t1 - end);
                let wrap_delay = sample_delay + clock.delay(end - t0);
                self.render_tick_range(devices, metronome, &clock, start, t1, wrap_delay);
            } else {
                self.render_tick_range(devices, metronome, &clock, t0, t1, sample_delay);
            }
        }

        self.bpm = self.new_bpm;
        self.playback_tick = t1;
        self.publish(frames);
    }

    fn will_render_device(&mut self, index: usize, device: &mut MusicDevice) {
        let Some(mix) = self.mixes.get_mut(index) else {
            return;
        };
        device.set_volume(mix.effective_volume(self.any_solo));
        device.set_pan(mix.pan);
        if mix.program_change_pending {
            mix.program_change_pending = false;
            device.set_program_of_all_channels(mix.program, mix.bank);
        }
    }
}

/// Queue the events and notes of `clip` whose start falls in `[t0, t1)`.
///
/// `bar_tick` is the playlist tick of the clip's bar. Note-offs are queued
/// together with their note-on, however far ahead they lie.
#[allow(clippy::too_many_arguments)]
fn schedule_clip(
    device: &mut MusicDevice,
    clip: &MidiClip,
    mix: &TrackMix,
    clock: &Clock,
    bar_tick: f64,
    t0: f64,
    t1: f64,
    base_delay: u32,
) {
    let delay_of = |tick: i32| {
        let t = bar_tick + tick as f64;
        (t0 <= t && t < t1).then(|| base_delay + clock.delay(t - t0))
    };

    for event in &clip.events {
        let Some(delay) = delay_of(event.tick) else {
            continue;
        };
        let data1 = if event.status >> 4 == PROGRAM_CHANGE {
            mix.map_program(event.data1)
        } else {
            event.data1
        };
        device.schedule_midi(event.status, data1, event.data2, delay);
    }

    for note in &clip.notes {
        let Some(delay) = delay_of(note.tick) else {
            continue;
        };
        let channel = note.channel & 0x0F;
        let pitch = if channel == DRUM_CHANNEL {
            note.pitch
        } else {
            (note.pitch as i16 + mix.capo as i16).clamp(0, 127) as u8
        };
        let off = base_delay + clock.delay(bar_tick + note.end_tick() as f64 - t0);

        device.schedule_midi((NOTE_ON << 4) | channel, pitch, note.velocity, delay);
        if note.use_sound_off {
            device.schedule_midi((CONTROL_CHANGE << 4) | channel, CC_ALL_SOUND_OFF, 0, off);
        } else {
            device.schedule_midi((NOTE_OFF << 4) | channel, pitch, 0, off);
        }
    }
}

/// The sequencer's pull interface for the audio callback.
pub struct SequencerEngine {
    rack: MusicRack,
    transport: Transport,
    commands: Consumer<SequencerCommand>,
    retired: Producer<Retired>,
}

impl SequencerEngine {
    pub(crate) fn new(
        rack: MusicRack,
        transport: Transport,
        commands: Consumer<SequencerCommand>,
        retired: Producer<Retired>,
    ) -> Self {
        Self {
            rack,
            transport,
            commands,
            retired,
        }
    }

    pub fn rack(&self) -> &MusicRack {
        &self.rack
    }

    /// Overwrite `out_l`/`out_r` with the next block of the performance.
    pub fn process(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        while let Ok(command) = self.commands.pop() {
            self.handle(command);
        }

        let settings = self.transport.metronome;
        let clicking = settings.enabled
            || self.transport.preclick_pending()
            || self.rack.metronome().pending_events().next().is_some();
        self.rack.set_metronome(clicking, settings.gain);

        self.rack.render(out_l, out_r, &mut self.transport);
    }

    fn handle(&mut self, command: SequencerCommand) {
        let transport = &mut self.transport;
        match command {
            SequencerCommand::Install(installation) => self.install(installation),
            SequencerCommand::Start => {
                transport.running = true;
                transport.position.set_running(true);
            }
            SequencerCommand::Stop => {
                transport.running = false;
                transport.preclick = None;
                transport.position.set_running(false);
                self.silence();
            }
            SequencerCommand::JumpTo(target) => {
                transport.playback_tick = target.tick_in_playlist;
                transport.cursor = Cursor {
                    playlist_index: Some(target.playlist_index),
                    bar_index: Some(target.bar_index),
                    tick_in_bar: target.tick_in_bar as f64,
                };
                transport.bpm = target.bpm;
                transport.preclick = target.preclick.filter(|p| p.bars > 0);
                transport.preclick_tick = 0.0;
                let report = transport.report();
                transport.position.store(&report);
                self.silence();
            }
            SequencerCommand::SetPlaybackRate(rate) => transport.playback_rate = rate,
            SequencerCommand::SetLoopEnabled(enabled) => transport.loop_enabled = enabled,
            SequencerCommand::SetLoopRange { start, end } => {
                transport.loop_start = start;
                transport.loop_end = end;
            }
            SequencerCommand::SetTrackVolume { track, volume } => {
                if let Some(mix) = transport.mixes.get_mut(track) {
                    mix.volume = volume;
                }
            }
            SequencerCommand::SetTrackPan { track, pan } => {
                if let Some(mix) = transport.mixes.get_mut(track) {
                    mix.pan = pan;
                }
            }
            SequencerCommand::SetTrackSolo { track, solo } => {
                if let Some(mix) = transport.mixes.get_mut(track) {
                    mix.solo = solo;
                }
            }
            SequencerCommand::SetTrackMute { track, mute } => {
                if let Some(mix) = transport.mixes.get_mut(track) {
                    mix.mute = mute;
                }
            }
            SequencerCommand::SetTrackCapo { track, capo } => {
                if let Some(mix) = transport.mixes.get_mut(track) {
                    mix.capo = capo;
                }
            }
            SequencerCommand::SetTrackProgram { track, program } => {
                if let Some(mix) = transport.mixes.get_mut(track) {
                    mix.program = program;
                    mix.program_change_pending = true;
                }
            }
            SequencerCommand::SendMidi {
                track,
                status,
                data1,
                data2,
            } => {
                if let Some(device) = self.rack.device_mut(track) {
                    device.schedule_midi(status, data1, data2, 0);
                }
            }
            SequencerCommand::SetMetronome(settings) => transport.metronome = settings,
            SequencerCommand::SetMasterGain(gain) => self.rack.set_master_gain(gain),
            SequencerCommand::AddListener(listener) => {
                if transport.listeners.len() < transport.listeners.capacity() {
                    transport.listeners.push(listener);
                } else {
                    self.retire(Retired::Listener(listener));
                }
            }
        }
    }

    /// Swap in a rebuilt song. The installation box travels back holding
    /// everything it replaced.
    fn install(&mut self, mut installation: Box<Installation>) {
        let mut devices = std::mem::take(&mut installation.devices);
        for slot in installation.slots.drain(..) {
            match slot {
                DeviceSlot::New(device) => devices.push(device),
                DeviceSlot::Keep { id, setup } => {
                    // every kept id was installed by an earlier command
                    let Some(mut device) = self.rack.take_device(id) else {
                        continue;
                    };
                    device.set_program_of_all_channels(setup.program, setup.bank);
                    device.set_monophonic(setup.monophonic);
                    devices.push(device);
                }
            }
        }
        installation.devices = self.rack.swap_devices(devices);
        std::mem::swap(&mut self.transport.snapshot, &mut installation.snapshot);
        std::mem::swap(&mut self.transport.mixes, &mut installation.mixes);
        self.retire(Retired::Installation(installation));
    }

    fn silence(&mut self) {
        for index in 0..self.rack.devices().len() {
            if let Some(device) = self.rack.device_mut(index) {
                device.clear_pending_events();
                device.all_sound_off();
            }
        }
        let metronome = self.rack.metronome_mut();
        metronome.clear_pending_events();
        metronome.all_sound_off();
    }

    fn retire(&mut self, value: Retired) {
        // a full queue drops the value here instead
        let _ = self.retired.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::{ClipEvent, MidiNoteEvent};
    use uuid::Uuid;

    fn mix() -> TrackMix {
        TrackMix {
            volume: 1.0,
            pan: 0.5,
            solo: false,
            mute: false,
            capo: 0,
            program: 25,
            bank: 0,
            clip_program: 25,
            program_change_pending: false,
        }
    }

    fn clip() -> MidiClip {
        MidiClip {
            events: vec![ClipEvent {
                tick: 0,
                status: 0xC0,
                data1: 25,
                data2: 0,
            }],
            notes: vec![MidiNoteEvent {
                tick: 480,
                duration: 480,
                channel: 0,
                pitch: 60,
                velocity: 100,
                use_sound_off: false,
            }],
            min_tick: 0,
            max_tick: 960,
        }
    }

    fn device() -> MusicDevice {
        MusicDevice::new(Uuid::new_v4(), 48_000.0, None, 64)
    }

    fn clock() -> Clock {
        Clock::new(48_000.0, 120.0, 1.0)
    }

    fn events(device: &MusicDevice) -> Vec<(u32, u8, u8)> {
        device.pending_events().map(|e| (e.offset, e.status, e.data1)).collect()
    }

    #[test]
    fn clip_events_are_offset_from_window_start() {
        let mut device = device();
        schedule_clip(&mut device, &clip(), &mix(), &clock(), 1920.0, 2000.0, 2500.0, 100);
        // note on at playlist tick 2400: 400 ticks into the window
        assert_eq!(events(&device), vec![(20_100, 0x90, 60), (44_100, 0x80, 60)]);
    }

    #[test]
    fn window_end_is_exclusive() {
        let mut device = device();
        schedule_clip(&mut device, &clip(), &mix(), &clock(), 0.0, 0.0, 480.0, 0);
        assert_eq!(events(&device), vec![(0, 0xC0, 25)]);
    }

    #[test]
    fn capo_transposes_and_program_follows_track() {
        let mut device = device();
        let mix = TrackMix {
            capo: 2,
            program: 30,
            ..mix()
        };
        schedule_clip(&mut device, &clip(), &mix, &clock(), 0.0, 0.0, 960.0, 0);
        assert_eq!(
            events(&device),
            vec![(0, 0xC0, 30), (24_000, 0x90, 62), (48_000, 0x80, 62)]
        );
    }

    #[test]
    fn sound_off_notes_end_with_cc120() {
        let mut device = device();
        let mut clip = clip();
        clip.notes[0].channel = 3;
        clip.notes[0].use_sound_off = true;
        schedule_clip(&mut device, &clip, &mix(), &clock(), 0.0, 480.0, 481.0, 0);
        assert_eq!(events(&device), vec![(0, 0x93, 60), (24_000, 0xB3, CC_ALL_SOUND_OFF)]);
    }
}
