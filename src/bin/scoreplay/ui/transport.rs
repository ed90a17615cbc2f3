//! Transport bar widget - shows tempo, play state, position, and audio stats

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use scoreplay::PPQ;

use super::UiState;

/// Audio statistics for display
pub struct AudioStats {
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    /// Compute audio stats from a buffer
    pub fn from_buffer(buffer: &[f32]) -> Self {
        if buffer.is_empty() {
            return Self { peak: 0.0, rms: 0.0 };
        }
        let peak = buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
        Self { peak, rms }
    }
}

fn flag(label: &str, on: bool) -> Span<'static> {
    Span::styled(
        format!("{}  ", label),
        Style::default().fg(if on { Color::Green } else { Color::DarkGray }),
    )
}

/// Render the transport bar
pub fn render_transport(frame: &mut Frame, area: Rect, state: &UiState, audio_stats: &AudioStats) {
    let block = Block::default().title(" scoreplay ").borders(Borders::ALL);
    let position = &state.position;

    let play_symbol = if state.is_playing { "▶" } else { "⏸" };
    let play_state_str = if state.is_playing { "Playing" } else { "Stopped" };

    let bar = match (position.bar_index, position.playlist_index) {
        (Some(bar), Some(index)) => format!("Bar {} ({}/{})  ", bar + 1, index + 1, state.playlist.len()),
        _ => "Count-in  ".to_string(),
    };
    let beat = position.tick_in_bar / PPQ as u64 + 1;

    let line = Line::from(vec![
        Span::styled(
            format!(" BPM: {:.0} x{:.2}  ", position.bpm, state.playback_rate),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("{} {}  ", play_symbol, play_state_str),
            Style::default().fg(if state.is_playing { Color::Green } else { Color::Yellow }),
        ),
        Span::styled(format!("{}Beat {}  ", bar, beat), Style::default().fg(Color::White)),
        Span::styled(
            format!("{}/{}  ", position.tick_in_playlist, state.total_ticks),
            Style::default().fg(Color::DarkGray),
        ),
        flag("Loop", state.loop_enabled),
        flag("Click", state.metronome_enabled),
        Span::styled(
            format!("{:.1}kHz  ", state.sample_rate / 1000.0),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("Peak: {:.2}  RMS: {:.2}", audio_stats.peak, audio_stats.rms),
            Style::default().fg(if audio_stats.peak > 1.0 { Color::Red } else { Color::Magenta }),
        ),
    ]);

    let paragraph = Paragraph::new(line).block(block);
    frame.render_widget(paragraph, area);
}
