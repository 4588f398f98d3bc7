//! Error types for PetalMix

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PetalMixError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio loading error: {0}")]
    AudioLoading(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Buffer {0} is still referenced by a source")]
    BufferInUse(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Command queue is full ({0} pending commands)")]
    CommandQueueFull(usize),

    #[error("Engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, PetalMixError>;
