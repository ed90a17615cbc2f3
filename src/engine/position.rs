use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Where playback is, as seen by listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionReport {
    pub playlist_index: Option<usize>,
    /// Song bar being played.
    pub bar_index: Option<usize>,
    pub tick_in_bar: u64,
    pub tick_in_playlist: u64,
    pub bpm: f64,
}

/// Called from the audio thread about 30 times per second while playing.
///
/// Implementations must not block or allocate.
pub trait PlaybackListener: Send {
    fn on_position(&mut self, report: &PositionReport);
}

impl<F> PlaybackListener for F
where
    F: FnMut(&PositionReport) + Send,
{
    fn on_position(&mut self, report: &PositionReport) {
        self(report)
    }
}

/// Position written by the audio thread, read by anyone.
#[derive(Debug)]
pub struct PlaybackPosition {
    playlist_index: AtomicI64,
    bar_index: AtomicI64,
    tick_in_bar: AtomicU64,
    tick_in_playlist: AtomicU64,
    bpm_bits: AtomicU64,
    running: AtomicBool,
}

fn to_index(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

fn from_index(value: Option<usize>) -> i64 {
    value.map_or(-1, |v| v as i64)
}

impl PlaybackPosition {
    pub fn new(bpm: f64) -> Self {
        Self {
            playlist_index: AtomicI64::new(-1),
            bar_index: AtomicI64::new(-1),
            tick_in_bar: AtomicU64::new(0),
            tick_in_playlist: AtomicU64::new(0),
            bpm_bits: AtomicU64::new(bpm.to_bits()),
            running: AtomicBool::new(false),
        }
    }

    pub fn store(&self, report: &PositionReport) {
        self.playlist_index
            .store(from_index(report.playlist_index), Ordering::Relaxed);
        self.bar_index.store(from_index(report.bar_index), Ordering::Relaxed);
        self.tick_in_bar.store(report.tick_in_bar, Ordering::Relaxed);
        self.tick_in_playlist
            .store(report.tick_in_playlist, Ordering::Relaxed);
        self.bpm_bits.store(report.bpm.to_bits(), Ordering::Release);
    }

    pub fn load(&self) -> PositionReport {
        let bpm = f64::from_bits(self.bpm_bits.load(Ordering::Acquire));
        PositionReport {
            playlist_index: to_index(self.playlist_index.load(Ordering::Relaxed)),
            bar_index: to_index(self.bar_index.load(Ordering::Relaxed)),
            tick_in_bar: self.tick_in_bar.load(Ordering::Relaxed),
            tick_in_playlist: self.tick_in_playlist.load(Ordering::Relaxed),
            bpm,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }
}
