//! Waveform oscilloscope widget

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

/// Render the output mix, red once it clips
pub fn render_waveform(frame: &mut Frame, area: Rect, audio_buffer: &[f32], clipping: bool) {
    let block = Block::default().title(" Output ").borders(Borders::ALL);

    let len = audio_buffer.len().max(1) as f64;
    let data: Vec<(f64, f64)> = audio_buffer
        .iter()
        .enumerate()
        .map(|(i, &sample)| (i as f64 / len, sample.clamp(-1.0, 1.0) as f64))
        .collect();

    let color = if clipping { Color::Red } else { Color::Cyan };
    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(color))
        .data(&data);

    let axis = |bounds: [f64; 2]| Axis::default().bounds(bounds).style(Style::default().fg(Color::DarkGray));
    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(axis([0.0, 1.0]))
        .y_axis(axis([-1.0, 1.0]));

    frame.render_widget(chart, area);
}
