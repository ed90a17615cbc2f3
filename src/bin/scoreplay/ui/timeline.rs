//! Timeline widget - the playlist in performance order with the playhead

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::UiState;

const TRACK_LABEL_WIDTH: u16 = 8;

/// Render one column per playlist bar and one row per track
pub fn render_timeline(frame: &mut Frame, area: Rect, state: &UiState) {
    if area.height < 2 || area.width < 20 || state.playlist.is_empty() {
        return;
    }

    let timeline_width = area.width.saturating_sub(TRACK_LABEL_WIDTH + 2) as i64;
    let total_ticks = state.total_ticks.max(1);
    let column_of = |tick: i64| (tick * timeline_width / total_ticks) as usize;
    let current = state.position.playlist_index;

    let mut lines = Vec::new();

    // Song bar numbers in performance order
    let mut header = " ".repeat(TRACK_LABEL_WIDTH as usize);
    for cell in &state.playlist {
        let width = column_of(cell.tick + cell.duration).saturating_sub(column_of(cell.tick));
        let label = format!("|{}", cell.bar_index + 1);
        header.push_str(&format!("{:<width$.width$}", label, width = width));
    }
    lines.push(Line::from(Span::styled(header, Style::default().fg(Color::DarkGray))));

    for track in &state.tracks {
        let mut spans = vec![Span::styled(
            format!("{:<6.6}  ", track.name),
            Style::default().fg(Color::White),
        )];

        for (index, cell) in state.playlist.iter().enumerate() {
            let width = column_of(cell.tick + cell.duration).saturating_sub(column_of(cell.tick));
            let has_notes = track.bars_with_notes.get(cell.bar_index).copied().unwrap_or(false);
            let symbol = if has_notes { "▓" } else { "░" };
            let mut style = Style::default().fg(if has_notes { Color::Cyan } else { Color::DarkGray });
            if current == Some(index) {
                style = style.add_modifier(Modifier::BOLD).fg(Color::Yellow);
            }
            spans.push(Span::styled(symbol.repeat(width), style));
        }

        lines.push(Line::from(spans));
    }

    // Playhead row
    let playhead = column_of(state.position.tick_in_playlist as i64);
    let mut playhead_str = " ".repeat(TRACK_LABEL_WIDTH as usize);
    for column in 0..timeline_width as usize {
        playhead_str.push(if column == playhead { '▲' } else { ' ' });
    }
    lines.push(Line::from(Span::styled(playhead_str, Style::default().fg(Color::Yellow))));

    frame.render_widget(Paragraph::new(lines), area);
}
