use uuid::Uuid;

use super::clock::Clock;
use crate::config::MetronomeSettings;
use crate::sequencing::TimeSignature;
use crate::soundfont::DRUM_BANK;
use crate::synth::MusicDevice;
use crate::PPQ;

pub const BAR_CLICK_KEY: u8 = 56;
pub const SUBDIVISION_CLICK_KEY: u8 = 33;
/// Clicks are sent on MIDI channel 10 (index 10), every channel of the
/// metronome device plays the drum kit.
pub const CLICK_CHANNEL: u8 = 10;
/// Click length in quarter notes.
pub const CLICK_LENGTH: f64 = 0.2;

const MAX_CLICKS_PER_WINDOW: usize = 64;

/// A device with every channel on the GM drum kit.
pub fn metronome_device(context: &crate::EngineContext) -> MusicDevice {
    let config = &context.config;
    let mut device = MusicDevice::new(
        Uuid::new_v4(),
        config.sample_rate,
        context.soundfont.clone(),
        config.device_event_capacity,
    );
    device.set_program_of_all_channels(0, DRUM_BANK);
    device
}

/// Frame delays already clicked in one window.
struct Delays {
    seen: [u32; MAX_CLICKS_PER_WINDOW],
    len: usize,
}

impl Delays {
    fn new() -> Self {
        Self {
            seen: [0; MAX_CLICKS_PER_WINDOW],
            len: 0,
        }
    }

    /// Record `delay`; false if it was already there or there is no room.
    fn insert(&mut self, delay: u32) -> bool {
        if self.seen[..self.len].contains(&delay) || self.len == MAX_CLICKS_PER_WINDOW {
            return false;
        }
        self.seen[self.len] = delay;
        self.len += 1;
        true
    }
}

/// Schedule the clicks of one bar falling in `[t0, t1)`.
///
/// `t0`/`t1` are ticks relative to the bar start; `base_delay` is the frame
/// offset of `t0` in the current block.
pub fn schedule_clicks(
    device: &mut MusicDevice,
    settings: &MetronomeSettings,
    clock: &Clock,
    time_signature: TimeSignature,
    t0: f64,
    t1: f64,
    base_delay: u32,
) {
    let bar_ticks = time_signature.bar_ticks(PPQ) as f64;
    let (lo, hi) = (t0.max(0.0), t1.min(bar_ticks));
    if lo >= hi {
        return;
    }

    let mut delays = Delays::new();
    let length = clock.delay(CLICK_LENGTH * PPQ as f64);
    let mut click = |device: &mut MusicDevice, key: u8, volume: f32, tick: f64| {
        let delay = base_delay + clock.delay(tick - t0);
        if !delays.insert(delay) {
            return;
        }
        let velocity = (volume.clamp(0.0, 1.0) * 127.0) as u8;
        device.schedule_midi(0x90 | CLICK_CHANNEL, key, velocity, delay);
        device.schedule_midi(0x80 | CLICK_CHANNEL, key, 0, delay + length);
    };

    if settings.bar_click_volume > MetronomeSettings::VOLUME_EPSILON && lo == 0.0 {
        click(device, BAR_CLICK_KEY, settings.bar_click_volume, 0.0);
    }

    for (per_quarter, volume) in settings.subdivisions() {
        if volume <= MetronomeSettings::VOLUME_EPSILON {
            continue;
        }
        let step = PPQ as f64 / per_quarter;
        let mut k = (lo / step).ceil();
        while k * step < hi {
            click(device, SUBDIVISION_CLICK_KEY, volume, k * step);
            k += 1.0;
        }
    }
}
