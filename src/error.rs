//! Error types shared by the audio pipeline and the session supervisor.
//!
//! Normal stream termination is not represented here: a closed pipe shows up
//! as [`crate::pipeline::FrameOutcome::EndOfStream`].

use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn one PCM frame into an encoded frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    #[error("expected {expected} samples per channel, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    #[error("codec error: {0}")]
    Codec(String),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("pipe {0} does not exist")]
    PipeUnavailable(PathBuf),

    #[error("pipe I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("voice connection error: {0}")]
    Connection(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("blocking worker failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for BridgeError {
    fn from(e: tokio::task::JoinError) -> Self {
        BridgeError::Worker(e.to_string())
    }
}
