//! Terminal UI for scoreplay
//!
//! Shows the transport, the playlist timeline and the output waveform, and
//! drives the sequencer from the keyboard.

pub mod state;
mod timeline;
mod transport;
mod waveform;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    DefaultTerminal, Frame,
};
use rtrb::Consumer;
use std::time::Duration;

use scoreplay::engine::PositionReport;
use scoreplay::Sequencer;

pub use state::UiState;

use timeline::render_timeline;
use transport::{render_transport, AudioStats};
use waveform::render_waveform;

/// Audio visualization buffer size
const VIS_BUFFER_SIZE: usize = 1024;

const MIN_RATE: f64 = 0.25;
const MAX_RATE: f64 = 2.0;

pub struct UiApp {
    sequencer: Sequencer,
    /// Mono output samples from the audio callback
    audio_rx: Consumer<f32>,
    /// Reports from the position listener
    position_rx: Consumer<PositionReport>,
    state: UiState,
    audio_buffer: Vec<f32>,
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        sequencer: Sequencer,
        audio_rx: Consumer<f32>,
        position_rx: Consumer<PositionReport>,
        state: UiState,
    ) -> Self {
        Self {
            sequencer,
            audio_rx,
            position_rx,
            state,
            audio_buffer: vec![0.0; VIS_BUFFER_SIZE],
            should_quit: false,
        }
    }

    /// Run the UI event loop
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_audio();
            self.poll_position();
            self.sequencer.collect_garbage();

            terminal.draw(|frame| self.render(frame))?;

            // ~60fps
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code)?;
                    }
                }
            }
        }

        self.sequencer.stop_playback()?;
        Ok(())
    }

    fn poll_audio(&mut self) {
        while let Ok(sample) = self.audio_rx.pop() {
            self.audio_buffer.push(sample);
        }
        if self.audio_buffer.len() > VIS_BUFFER_SIZE {
            let excess = self.audio_buffer.len() - VIS_BUFFER_SIZE;
            self.audio_buffer.drain(0..excess);
        }
    }

    /// Keep only the latest report
    fn poll_position(&mut self) {
        while let Ok(report) = self.position_rx.pop() {
            self.state.position = report;
        }
    }

    fn handle_key(&mut self, key: KeyCode) -> EyreResult<()> {
        let sequencer = &mut self.sequencer;
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char(' ') => {
                if sequencer.is_running() {
                    sequencer.stop_playback()?;
                } else {
                    sequencer.start_playback()?;
                }
            }
            KeyCode::Char('r') | KeyCode::Char('R') => sequencer.jump_to(0, 0)?,
            KeyCode::Left | KeyCode::Right => {
                let bar = self.state.current_bar().unwrap_or(0);
                let target = if key == KeyCode::Left {
                    bar.saturating_sub(1)
                } else {
                    (bar + 1).min(self.state.bar_count.saturating_sub(1))
                };
                sequencer.jump_to(target, 0)?;
            }
            KeyCode::Char('l') | KeyCode::Char('L') => {
                // loop the bar under the playhead
                let bar = self.state.current_bar().unwrap_or(0);
                if let Some(playlist_bar) = sequencer.first_occurrence_of_bar(bar) {
                    sequencer.set_loop_start_indicator(bar, 0)?;
                    sequencer.set_loop_end_indicator(bar, playlist_bar.duration as u32)?;
                }
                let enabled = !sequencer.is_loop_playback_enabled();
                sequencer.set_loop_playback_enabled(enabled)?;
            }
            KeyCode::Char('m') | KeyCode::Char('M') => {
                let mut settings = *sequencer.metronome();
                settings.enabled = !settings.enabled;
                sequencer.set_metronome(settings)?;
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let rate = (sequencer.playback_rate() + 0.1).min(MAX_RATE);
                sequencer.set_playback_rate(rate)?;
            }
            KeyCode::Char('-') => {
                let rate = (sequencer.playback_rate() - 0.1).max(MIN_RATE);
                sequencer.set_playback_rate(rate)?;
            }
            _ => {}
        }
        self.state.sync(&self.sequencer);
        Ok(())
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        // Main layout: transport, timeline, waveform, help
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Transport bar
                Constraint::Min(6),    // Timeline
                Constraint::Length(8), // Waveform
                Constraint::Length(1), // Help bar
            ])
            .split(area);

        let stats = AudioStats::from_buffer(&self.audio_buffer);
        render_transport(frame, chunks[0], &self.state, &stats);

        let timeline_block = Block::default().title(" Playlist ").borders(Borders::ALL);
        let timeline_inner = timeline_block.inner(chunks[1]);
        frame.render_widget(timeline_block, chunks[1]);
        render_timeline(frame, timeline_inner, &self.state);

        render_waveform(frame, chunks[2], &self.audio_buffer, stats.peak > 1.0);

        let help = Paragraph::new(" [Q] Quit  [Space] Play/Stop  [R] Restart  [←/→] Bar  [L] Loop bar  [M] Click  [+/-] Rate")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[3]);
    }
}
