use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification shared by every error type in the workspace.
///
/// Each crate-level error exposes a `kind()` so that the authentication loop
/// and the CLI can decide how to react without matching on concrete variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Serial transport open/handshake/I/O failure. The session cannot continue.
    Transport,
    /// The sensor answered with a non-Ok status for a single call.
    SensorProtocol,
    /// A bounded wait expired.
    Timeout,
    /// No template matched the presented finger.
    NoMatch,
    /// The embedding model found no face in the captured image.
    NoFaceDetected,
    /// The embedding model returned a vector of the wrong length.
    InvalidEmbedding,
    /// Two vectors of different lengths were compared.
    ShapeMismatch,
    /// The backend holds no reference embedding for the matched slot.
    MissingReference,
    /// The backend could not be reached or answered with an error.
    BackendUnavailable,
    /// Local journal failure.
    Storage,
    /// Invalid or missing configuration.
    Configuration,
}

impl ErrorKind {
    /// How the caller must react to an error of this kind.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::Transport | ErrorKind::Configuration => Severity::SessionFatal,
            ErrorKind::InvalidEmbedding | ErrorKind::ShapeMismatch | ErrorKind::MissingReference => {
                Severity::AttemptFatal
            }
            ErrorKind::SensorProtocol | ErrorKind::BackendUnavailable | ErrorKind::Storage => {
                Severity::Retryable
            }
            ErrorKind::Timeout | ErrorKind::NoMatch | ErrorKind::NoFaceDetected => {
                Severity::Negative
            }
        }
    }

    /// Stable snake_case name used in status lines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::SensorProtocol => "sensor_protocol",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NoMatch => "no_match",
            ErrorKind::NoFaceDetected => "no_face_detected",
            ErrorKind::InvalidEmbedding => "invalid_embedding",
            ErrorKind::ShapeMismatch => "shape_mismatch",
            ErrorKind::MissingReference => "missing_reference",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::Storage => "storage",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reaction required by an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Abort the session/process.
    SessionFatal,
    /// Abandon the current attempt; do not retry it.
    AttemptFatal,
    /// Transient; re-running the enclosing step may succeed.
    Retryable,
    /// A normal negative outcome, not a failure.
    Negative,
}

impl Severity {
    /// Returns `true` for transient conditions.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Severity::Retryable)
    }

    /// Returns `true` if the session cannot continue.
    #[must_use]
    pub fn is_session_fatal(self) -> bool {
        matches!(self, Severity::SessionFatal)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Domain validation errors
    #[error("Slot {slot} is outside sensor capacity {capacity}")]
    InvalidSlot { slot: u16, capacity: u16 },

    #[error("Invalid template buffer: {0}")]
    InvalidBuffer(u8),

    #[error("Invalid embedding length: expected {expected}, got {actual}")]
    InvalidEmbedding { expected: usize, actual: usize },

    #[error("Embedding contains non-finite values")]
    NonFiniteEmbedding,

    #[error("Shape mismatch: {left} vs {right} elements")]
    ShapeMismatch { left: usize, right: usize },

    #[error("Invalid match threshold: {0}")]
    InvalidThreshold(f64),

    #[error("Invalid embedding encoding: {0}")]
    InvalidEncoding(String),

    // Wire protocol errors
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Packet addressed to {actual:#010x}, expected {expected:#010x}")]
    AddressMismatch { expected: u32, actual: u32 },

    #[error("Frame too large: {size} bytes (max {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },

    #[error("Unexpected packet kind: expected {expected}, got {actual}")]
    UnexpectedPacket { expected: String, actual: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Taxonomy entry for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidEmbedding { .. } | Error::NonFiniteEmbedding => ErrorKind::InvalidEmbedding,
            Error::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Error::InvalidEncoding(_) => ErrorKind::InvalidEmbedding,
            Error::InvalidSlot { .. }
            | Error::InvalidBuffer(_)
            | Error::InvalidStateTransition { .. } => ErrorKind::SensorProtocol,
            Error::InvalidPacket(_)
            | Error::ChecksumMismatch { .. }
            | Error::AddressMismatch { .. }
            | Error::FrameTooLarge { .. }
            | Error::UnexpectedPacket { .. } => ErrorKind::SensorProtocol,
            Error::Io(_) => ErrorKind::Transport,
            Error::InvalidThreshold(_) | Error::Config(_) => ErrorKind::Configuration,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
