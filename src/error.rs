use thiserror::Error;

/// Failures while reading an SF2 bank.
#[derive(Debug, Error)]
pub enum SoundFontError {
    #[error("failed to read soundfont: {0}")]
    Io(#[from] std::io::Error),

    #[error("soundfont is corrupted: expected {expected:?} but found {found:?}")]
    BadMagic { expected: &'static str, found: String },

    #[error("chunk `{chunk}` is truncated ({len} bytes, record size {record_size})")]
    Truncated {
        chunk: &'static str,
        len: usize,
        record_size: usize,
    },

    #[error("required chunk `{0}` is missing")]
    MissingChunk(&'static str),
}

/// Failures surfaced by the playback engine on the control thread.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    SoundFont(#[from] SoundFontError),

    #[error("command queue is full, dropped `{0}`")]
    QueueFull(&'static str),
}
