use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::synth::MusicDevice;
use crate::MAX_BLOCK_SIZE;

/// Callbacks run by [`MusicRack::render`] on the audio thread.
pub trait RenderHooks {
    /// Before any device renders a block of `frames`.
    fn will_render_rack(&mut self, _devices: &mut [MusicDevice], _metronome: &mut MusicDevice, _frames: usize) {}

    /// Before the device at `index` renders.
    fn will_render_device(&mut self, _index: usize, _device: &mut MusicDevice) {}
}

impl RenderHooks for () {}

/// The set of devices mixed to the output, plus the metronome.
#[derive(Debug)]
pub struct MusicRack {
    devices: Vec<MusicDevice>,
    metronome: MusicDevice,
    rendering: Arc<AtomicBool>,
    master_gain: f32,
    metronome_enabled: bool,
    metronome_gain: f32,
    work_l: Vec<f32>,
    work_r: Vec<f32>,
}

impl MusicRack {
    pub fn new(metronome: MusicDevice, rendering: Arc<AtomicBool>) -> Self {
        Self {
            devices: Vec::new(),
            metronome,
            rendering,
            master_gain: 1.0,
            metronome_enabled: false,
            metronome_gain: 1.0,
            work_l: vec![0.0; MAX_BLOCK_SIZE],
            work_r: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn devices(&self) -> &[MusicDevice] {
        &self.devices
    }

    pub fn device(&self, index: usize) -> Option<&MusicDevice> {
        self.devices.get(index)
    }

    pub fn device_mut(&mut self, index: usize) -> Option<&mut MusicDevice> {
        self.devices.get_mut(index)
    }

    pub fn index_of_device(&self, id: Uuid) -> Option<usize> {
        self.devices.iter().position(|d| d.id() == id)
    }

    pub fn metronome(&self) -> &MusicDevice {
        &self.metronome
    }

    pub fn metronome_mut(&mut self) -> &mut MusicDevice {
        &mut self.metronome
    }

    /// Take the device with `id` out of the rack.
    pub fn take_device(&mut self, id: Uuid) -> Option<MusicDevice> {
        let index = self.index_of_device(id)?;
        Some(self.devices.swap_remove(index))
    }

    /// Replace the device list, returning the previous one.
    pub fn swap_devices(&mut self, devices: Vec<MusicDevice>) -> Vec<MusicDevice> {
        std::mem::replace(&mut self.devices, devices)
    }

    pub fn is_rendering_enabled(&self) -> bool {
        self.rendering.load(Ordering::Acquire)
    }

    pub fn set_rendering_enabled(&self, enabled: bool) {
        self.rendering.store(enabled, Ordering::Release);
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain;
    }

    pub fn set_metronome(&mut self, enabled: bool, gain: f32) {
        self.metronome_enabled = enabled;
        self.metronome_gain = gain;
    }

    /// Overwrite `out_l`/`out_r` with one block of the mix.
    pub fn render<H: RenderHooks + ?Sized>(&mut self, out_l: &mut [f32], out_r: &mut [f32], hooks: &mut H) {
        out_l.fill(0.0);
        out_r.fill(0.0);
        if !self.is_rendering_enabled() {
            return;
        }
        let frames = out_l.len().min(out_r.len());
        let (out_l, out_r) = (&mut out_l[..frames], &mut out_r[..frames]);

        hooks.will_render_rack(&mut self.devices, &mut self.metronome, frames);

        for (index, device) in self.devices.iter_mut().enumerate() {
            hooks.will_render_device(index, device);
            device.process(out_l, out_r);
        }

        if self.metronome_enabled {
            let mut done = 0;
            while done < frames {
                let n = (frames - done).min(MAX_BLOCK_SIZE);
                let (work_l, work_r) = (&mut self.work_l[..n], &mut self.work_r[..n]);
                work_l.fill(0.0);
                work_r.fill(0.0);
                self.metronome.process(work_l, work_r);
                for i in 0..n {
                    out_l[done + i] += work_l[i] * self.metronome_gain;
                    out_r[done + i] += work_r[i] * self.metronome_gain;
                }
                done += n;
            }
        } else {
            // clicks scheduled while muted are discarded
            self.metronome.clear_pending_events();
        }

        if self.master_gain != 1.0 {
            for sample in out_l.iter_mut().chain(out_r.iter_mut()) {
                *sample *= self.master_gain;
            }
        }
    }
}
