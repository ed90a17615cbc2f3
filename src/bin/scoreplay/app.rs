//! Audio output and the wiring between engine, listener and UI

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::info;
use rtrb::RingBuffer;

use scoreplay::engine::PositionReport;
use scoreplay::sequencing::Song;
use scoreplay::soundfont::SoundFont;
use scoreplay::{EngineConfig, EngineContext, MetronomeSettings, Sequencer, MAX_BLOCK_SIZE};

use super::demo;
use super::ui::{UiApp, UiState};

/// Mono samples buffered for the oscilloscope
const VIS_QUEUE_SIZE: usize = 8192;
const POSITION_QUEUE_SIZE: usize = 64;

pub struct App {
    song: Song,
    soundfont: Option<PathBuf>,
}

impl App {
    pub fn new(song: Song, soundfont: Option<PathBuf>) -> Self {
        Self { song, soundfont }
    }

    fn load_soundfont(&self) -> EyreResult<SoundFont> {
        match &self.soundfont {
            Some(path) => SoundFont::load(path).wrap_err_with(|| format!("failed to load {}", path.display())),
            None => demo::fallback_soundfont().wrap_err("failed to build the fallback bank"),
        }
    }

    /// Play the song until the user quits.
    pub fn run(self) -> EyreResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let config = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;

        let soundfont = self.load_soundfont()?;
        info!("soundfont `{}`, {} presets", soundfont.name(), soundfont.patches().len());

        let engine_config = EngineConfig {
            preclick_bar_count: 1,
            metronome: MetronomeSettings {
                enabled: true,
                gain: 0.4,
                ..MetronomeSettings::default()
            },
            ..EngineConfig::default().with_sample_rate(sample_rate)
        };
        let context = EngineContext::new(engine_config).with_soundfont(Arc::new(soundfont));
        let (mut sequencer, mut engine) = Sequencer::build(&self.song, context);

        let (mut position_tx, position_rx) = RingBuffer::<PositionReport>::new(POSITION_QUEUE_SIZE);
        sequencer.add_listener(move |report: &PositionReport| {
            let _ = position_tx.push(*report);
        })?;

        let (mut audio_tx, audio_rx) = RingBuffer::<f32>::new(VIS_QUEUE_SIZE);
        let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
        let mut right = vec![0.0f32; MAX_BLOCK_SIZE];

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| {
                let total_frames = data.len() / channels;
                let mut frames_written = 0;

                while frames_written < total_frames {
                    let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                    let (l, r) = (&mut left[..frames], &mut right[..frames]);
                    engine.process(l, r);

                    let out = &mut data[frames_written * channels..(frames_written + frames) * channels];
                    for (i, frame) in out.chunks_mut(channels).enumerate() {
                        let mono = 0.5 * (l[i] + r[i]);
                        for (ch, sample) in frame.iter_mut().enumerate() {
                            *sample = match (channels, ch % 2) {
                                (1, _) => mono,
                                (_, 0) => l[i],
                                _ => r[i],
                            };
                        }
                        let _ = audio_tx.push(mono);
                    }

                    frames_written += frames;
                }
            },
            |err| eprintln!("Audio error: {}", err),
            None,
        )?;
        stream.play()?;

        // jumping arms the one-bar count-in
        sequencer.jump_to(0, 0)?;
        sequencer.start_playback()?;

        let state = UiState::new(&self.song, &sequencer, sample_rate);
        let mut terminal = ratatui::init();
        let result = UiApp::new(sequencer, audio_rx, position_rx, state).run(&mut terminal);
        ratatui::restore();

        drop(stream);
        result
    }
}
