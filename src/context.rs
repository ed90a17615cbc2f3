use std::path::Path;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::SoundFontError;
use crate::soundfont::SoundFont;

/// Settings and shared resources handed to every playback component.
#[derive(Debug, Clone, Default)]
pub struct EngineContext {
    pub config: EngineConfig,
    /// Bank shared by every device; devices without one render silence.
    pub soundfont: Option<Arc<SoundFont>>,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            soundfont: None,
        }
    }

    pub fn with_soundfont(mut self, soundfont: Arc<SoundFont>) -> Self {
        self.soundfont = Some(soundfont);
        self
    }

    /// Load the SF2 file at `path` as the shared bank.
    pub fn load_soundfont(self, path: impl AsRef<Path>) -> Result<Self, SoundFontError> {
        let soundfont = SoundFont::load(path)?;
        Ok(self.with_soundfont(Arc::new(soundfont)))
    }
}
