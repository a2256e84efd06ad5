use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use biogate_auth::AuthError;
use biogate_core::{EnrollmentOutcome, ErrorKind, FingerprintStatus};
use biogate_hardware::HardwareError;
use biogate_network::GatewayError;
use thiserror::Error;

/// Process exit statuses. Each failure class has its own code so that
/// supervisors can react without parsing output.
pub mod exit_code {
    pub const OK: u8 = 0;
    pub const GENERIC: u8 = 1;
    pub const USAGE: u8 = 10;
    pub const INVALID_SLOT: u8 = 11;
    pub const CONFIG: u8 = 12;
    pub const TRANSPORT_OPEN: u8 = 20;
    pub const HANDSHAKE: u8 = 21;
    pub const SESSION_BUSY: u8 = 22;
    pub const TRANSPORT_LOST: u8 = 23;
    /// Enrollment stages `capture1..store` map to 30..=35.
    pub const ENROLL_CAPTURE1: u8 = 30;
    pub const ENROLL_CONVERT1: u8 = 31;
    pub const ENROLL_CAPTURE2: u8 = 32;
    pub const ENROLL_CONVERT2: u8 = 33;
    pub const ENROLL_MODEL: u8 = 34;
    pub const ENROLL_STORE: u8 = 35;
    pub const ENROLL_TIMEOUT: u8 = 36;
    pub const IMAGE_MISSING: u8 = 40;
    pub const NO_FACE: u8 = 41;
    pub const INVALID_EMBEDDING: u8 = 42;
    pub const EMBEDDER_UNAVAILABLE: u8 = 43;
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("slot {slot} is outside sensor capacity {capacity}")]
    InvalidSlot { slot: u16, capacity: u16 },

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(
        "enrollment of slot {} failed at {}",
        .outcome.slot_id,
        .outcome.failure_stage.map_or("unknown stage", |s| s.as_str())
    )]
    Enrollment { outcome: EnrollmentOutcome },

    #[error("image not found or unreadable: {path}")]
    ImageMissing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no face found in the image")]
    NoFace,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Numeric exit status, see [`exit_code`].
    #[must_use]
    pub fn code(&self) -> u8 {
        use exit_code::*;
        match self {
            CliError::InvalidSlot { .. } => INVALID_SLOT,
            CliError::ConfigRead { .. }
            | CliError::ConfigParse { .. }
            | CliError::InvalidConfig(_) => CONFIG,
            CliError::Hardware(e) => hardware_code(e),
            CliError::Auth(e) => auth_code(e),
            CliError::Gateway(e) => gateway_code(e),
            CliError::Enrollment { outcome } => enrollment_code(outcome),
            CliError::ImageMissing { .. } => IMAGE_MISSING,
            CliError::NoFace => NO_FACE,
            CliError::Io(_) | CliError::Serialization(_) => GENERIC,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Taxonomy entry, when the failure came from the pipeline.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CliError::ConfigRead { .. }
            | CliError::ConfigParse { .. }
            | CliError::InvalidConfig(_) => Some(ErrorKind::Configuration),
            CliError::Hardware(e) => Some(e.kind()),
            CliError::Auth(e) => Some(e.kind()),
            CliError::Gateway(e) => Some(e.kind()),
            CliError::Enrollment { outcome } => Some(match outcome.status {
                Some(FingerprintStatus::Timeout) => ErrorKind::Timeout,
                _ => ErrorKind::SensorProtocol,
            }),
            CliError::NoFace => Some(ErrorKind::NoFaceDetected),
            CliError::InvalidSlot { .. }
            | CliError::ImageMissing { .. }
            | CliError::Io(_)
            | CliError::Serialization(_) => None,
        }
    }
}

fn hardware_code(e: &HardwareError) -> u8 {
    use exit_code::*;
    match e {
        HardwareError::AuthenticationFailed { .. } => HANDSHAKE,
        HardwareError::SessionBusy { .. } => SESSION_BUSY,
        HardwareError::InitializationFailed { .. } | HardwareError::Serial(_) => TRANSPORT_OPEN,
        HardwareError::EmbedderUnavailable { .. } => EMBEDDER_UNAVAILABLE,
        other => match other.kind() {
            ErrorKind::Transport => TRANSPORT_LOST,
            ErrorKind::Configuration => CONFIG,
            ErrorKind::InvalidEmbedding | ErrorKind::ShapeMismatch => INVALID_EMBEDDING,
            _ => GENERIC,
        },
    }
}

fn gateway_code(e: &GatewayError) -> u8 {
    use exit_code::*;
    match e.kind() {
        ErrorKind::InvalidEmbedding | ErrorKind::ShapeMismatch => INVALID_EMBEDDING,
        ErrorKind::Configuration => CONFIG,
        _ => EMBEDDER_UNAVAILABLE,
    }
}

fn auth_code(e: &AuthError) -> u8 {
    use exit_code::*;
    match e {
        AuthError::Hardware(e) => hardware_code(e),
        AuthError::Gateway(e) => gateway_code(e),
        AuthError::NoFaceDetected => NO_FACE,
        other => match other.kind() {
            ErrorKind::Transport => TRANSPORT_LOST,
            ErrorKind::Configuration => CONFIG,
            ErrorKind::InvalidEmbedding | ErrorKind::ShapeMismatch => INVALID_EMBEDDING,
            _ => GENERIC,
        },
    }
}

fn enrollment_code(outcome: &EnrollmentOutcome) -> u8 {
    use biogate_core::FailureStage;
    use exit_code::*;
    if outcome.status == Some(FingerprintStatus::Timeout) {
        return ENROLL_TIMEOUT;
    }
    match outcome.failure_stage {
        Some(FailureStage::Capture1) => ENROLL_CAPTURE1,
        Some(FailureStage::Convert1) => ENROLL_CONVERT1,
        Some(FailureStage::Capture2) => ENROLL_CAPTURE2,
        Some(FailureStage::Convert2) => ENROLL_CONVERT2,
        Some(FailureStage::Model) => ENROLL_MODEL,
        Some(FailureStage::Store) => ENROLL_STORE,
        None => GENERIC,
    }
}

pub type CliResult<T> = Result<T, CliError>;
