use thiserror::Error;

/// All errors produced by adquiet-core.
///
/// None of these reach the caller of an analysis pass: the session logs them
/// and degrades to "not an advertisement".
#[derive(Debug, Error)]
pub enum AdQuietError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no audio input device found")]
    NoInputDevice,

    #[error("invalid block size: {0} (must be > 0)")]
    InvalidBlockSize(usize),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("volume control error: {0}")]
    Volume(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AdQuietError>;
