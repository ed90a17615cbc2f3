use crate::PPQ;

/// Conversion between sample frames and ticks at a given tempo.
///
/// `playback_rate` scales the tempo: at 0.5 a quarter note takes twice as
/// many frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    pub sample_rate: f64,
    pub bpm: f64,
    pub playback_rate: f64,
}

impl Clock {
    pub fn new(sample_rate: f64, bpm: f64, playback_rate: f64) -> Self {
        Self {
            sample_rate,
            bpm,
            playback_rate,
        }
    }

    fn ticks_per_second(&self) -> f64 {
        self.bpm * self.playback_rate * PPQ as f64 / 60.0
    }

    pub fn ticks_from_samples(&self, samples: f64) -> f64 {
        samples * self.ticks_per_second() / self.sample_rate
    }

    pub fn samples_from_ticks(&self, ticks: f64) -> f64 {
        let per_second = self.ticks_per_second();
        if per_second <= 0.0 {
            return 0.0;
        }
        ticks * self.sample_rate / per_second
    }

    /// Frame delay of a point `ticks` into the window, truncated.
    pub fn delay(&self, ticks: f64) -> u32 {
        self.samples_from_ticks(ticks.max(0.0)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_at_120_is_half_a_second() {
        let clock = Clock::new(44_100.0, 120.0, 1.0);
        assert_eq!(clock.samples_from_ticks(480.0), 22_050.0);
        assert_eq!(clock.delay(480.0), 22_050);
    }

    #[test]
    fn conversion_round_trips() {
        let clock = Clock::new(48_000.0, 93.0, 0.75);
        for frames in [1.0, 64.0, 511.0, 44_100.0, 1_000_000.0] {
            let back = clock.samples_from_ticks(clock.ticks_from_samples(frames));
            assert!((back - frames).abs() < 1e-6 * frames.max(1.0));
        }
    }

    #[test]
    fn half_rate_doubles_length() {
        let full = Clock::new(44_100.0, 120.0, 1.0);
        let half = Clock::new(44_100.0, 120.0, 0.5);
        assert_eq!(half.samples_from_ticks(480.0), 2.0 * full.samples_from_ticks(480.0));
    }
}
