use std::time::Duration;

use thiserror::Error;
use veiltrust::{PatternKind, VeilTrustError};

/// All errors produced by the VeilStream session layer.
#[derive(Debug, Error)]
pub enum VeilStreamError {
    /// The Noise engine rejected a message or a local step failed.
    #[error("{pattern} handshake failed at stage {stage}: {source}")]
    Handshake {
        pattern: PatternKind,
        stage: usize,
        #[source]
        source: VeilTrustError,
    },

    #[error("connection closed during {pattern} handshake at stage {stage}")]
    UnexpectedEof { pattern: PatternKind, stage: usize },

    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VeilStreamError {
    /// The handshake variant the error belongs to, when known.
    pub fn pattern(&self) -> Option<PatternKind> {
        match self {
            VeilStreamError::Handshake { pattern, .. }
            | VeilStreamError::UnexpectedEof { pattern, .. } => Some(*pattern),
            VeilStreamError::HandshakeTimeout(_) | VeilStreamError::Io(_) => None,
        }
    }

    /// The engine error underneath, if any.
    pub fn noise_error(&self) -> Option<&VeilTrustError> {
        match self {
            VeilStreamError::Handshake { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VeilStreamError>;
