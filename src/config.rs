#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Click volumes for the metronome device.
///
/// A subdivision whose volume is below [`MetronomeSettings::VOLUME_EPSILON`]
/// is not clicked at all.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetronomeSettings {
    pub enabled: bool,
    pub gain: f32,
    pub bar_click_volume: f32,
    pub quarter_click_volume: f32,
    pub eighth_click_volume: f32,
    pub triplet_click_volume: f32,
    pub sixteenth_click_volume: f32,
}

impl MetronomeSettings {
    pub const VOLUME_EPSILON: f32 = 0.01;

    /// Returns `(subdivisions per quarter, volume)` for every audible subdivision.
    pub fn subdivisions(&self) -> [(f64, f32); 4] {
        [
            (1.0, self.quarter_click_volume),
            (2.0, self.eighth_click_volume),
            (3.0, self.triplet_click_volume),
            (4.0, self.sixteenth_click_volume),
        ]
    }
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            gain: 1.0,
            bar_click_volume: 1.0,
            quarter_click_volume: 1.0,
            eighth_click_volume: 0.0,
            triplet_click_volume: 0.0,
            sixteenth_click_volume: 0.0,
        }
    }
}

/// Engine-wide settings shared by the rack, devices and sequencer.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f32,
    /// Capacity of the control → audio command queue.
    pub command_capacity: usize,
    /// Pending MIDI events a device can hold before dropping new ones.
    pub device_event_capacity: usize,
    /// Tempo used when the song has no tempo marker at its first beat.
    pub default_bpm: f64,
    /// Bars of metronome pre-count armed by every jump.
    pub preclick_bar_count: u32,
    /// How often position listeners are called, in Hz.
    pub listener_rate_hz: f32,
    /// Listener slots reserved up front on the audio side.
    pub max_listeners: usize,
    pub master_gain: f32,
    pub metronome: MetronomeSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            command_capacity: 256,
            device_event_capacity: 4096,
            default_bpm: 90.0,
            preclick_bar_count: 0,
            listener_rate_hz: 30.0,
            max_listeners: 8,
            master_gain: 1.0,
            metronome: MetronomeSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Frames between two listener notifications.
    pub fn frames_per_listener_update(&self) -> u64 {
        (self.sample_rate / self.listener_rate_hz.max(1.0)) as u64
    }
}
