//! What the UI shows, refreshed from the sequencer and the position listener

use scoreplay::engine::PositionReport;
use scoreplay::sequencing::Song;
use scoreplay::Sequencer;

/// One performed bar on the timeline.
#[derive(Clone, Copy, Debug)]
pub struct BarCell {
    /// Song bar index
    pub bar_index: usize,
    pub tick: i64,
    pub duration: i64,
}

/// A track row: its name and which song bars hold notes.
#[derive(Clone, Debug)]
pub struct TrackRow {
    pub name: String,
    pub bars_with_notes: Vec<bool>,
}

#[derive(Clone, Debug)]
pub struct UiState {
    pub sample_rate: f32,
    pub bar_count: usize,
    pub playlist: Vec<BarCell>,
    pub tracks: Vec<TrackRow>,
    pub total_ticks: i64,
    /// Latest report from the audio thread
    pub position: PositionReport,
    pub is_playing: bool,
    pub loop_enabled: bool,
    pub metronome_enabled: bool,
    pub playback_rate: f64,
}

impl UiState {
    pub fn new(song: &Song, sequencer: &Sequencer, sample_rate: f32) -> Self {
        let snapshot = sequencer.snapshot();
        let playlist = snapshot
            .playlist
            .bars()
            .iter()
            .map(|bar| BarCell {
                bar_index: bar.bar_index,
                tick: bar.tick,
                duration: bar.duration,
            })
            .collect();
        let tracks = snapshot
            .tracks
            .iter()
            .map(|track| TrackRow {
                name: track.name.clone(),
                bars_with_notes: track.clips.iter().map(|clip| !clip.notes.is_empty()).collect(),
            })
            .collect();

        let mut state = Self {
            sample_rate,
            bar_count: song.bars.len(),
            playlist,
            tracks,
            total_ticks: sequencer.playlist_duration_ticks(),
            position: PositionReport {
                playlist_index: None,
                bar_index: None,
                tick_in_bar: 0,
                tick_in_playlist: 0,
                bpm: sequencer.current_bpm(),
            },
            is_playing: false,
            loop_enabled: false,
            metronome_enabled: false,
            playback_rate: 1.0,
        };
        state.sync(sequencer);
        state
    }

    /// Copy the control-side flags.
    pub fn sync(&mut self, sequencer: &Sequencer) {
        self.is_playing = sequencer.is_running();
        self.loop_enabled = sequencer.is_loop_playback_enabled();
        self.metronome_enabled = sequencer.metronome().enabled;
        self.playback_rate = sequencer.playback_rate();
    }

    /// Song bar under the playhead.
    pub fn current_bar(&self) -> Option<usize> {
        self.position.bar_index
    }
}
