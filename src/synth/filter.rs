use std::f32::consts::TAU;

/// One-pole lowpass: `y[n] = (1 - x)·s[n] + x·y[n-1]` with `x = e^(-2π·fc/sr)`.
///
/// Cheap enough to run per voice and per side; it only rounds off the top of
/// the spectrum, which is all SF2 zones ask of `initialFilterFc` here.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePoleLowpass {
    a0: f32,
    b1: f32,
    mem: f32,
}

impl OnePoleLowpass {
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let x = (-TAU * cutoff_hz / sample_rate).exp().clamp(0.0, 1.0);
        Self {
            a0: 1.0 - x,
            b1: x,
            mem: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = self.a0 * input + self.b1 * self.mem;
        self.mem = out;
        out
    }

    pub fn reset(&mut self) {
        self.mem = 0.0;
    }
}
