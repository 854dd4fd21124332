use thiserror::Error;

use crate::session::state::{Command, RecordingState};

/// Failures acquiring or holding the microphone stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// Microphone access was refused.
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// The device could not be opened or the stream dropped mid-recording.
    #[error("capture device error: {0}")]
    Device(String),
}

/// Failures of a single preview run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreviewError {
    /// A segment's binary data could not be decoded.
    #[error("failed to decode segment {index}: {reason}")]
    Decode { index: usize, reason: String },

    /// The merged buffer could not be serialized.
    #[error("failed to encode preview: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Preview(#[from] PreviewError),

    #[error("cannot {command:?} while {state:?}")]
    InvalidTransition {
        state: RecordingState,
        command: Command,
    },
}
