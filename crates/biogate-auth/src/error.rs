use biogate_core::{ErrorKind, Severity, SlotId};
use biogate_hardware::HardwareError;
use biogate_network::GatewayError;
use biogate_storage::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Failures of an enrollment or authentication step.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] biogate_core::Error),

    #[error("No face detected in the captured image")]
    NoFaceDetected,

    #[error("No reference embedding enrolled for slot {slot}")]
    MissingReference { slot: SlotId },

    #[error("Attempt exceeded its {duration_ms} ms deadline")]
    DeadlineExceeded { duration_ms: u64 },
}

impl AuthError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Hardware(e) => e.kind(),
            Self::Gateway(e) => e.kind(),
            Self::Storage(e) => e.kind(),
            Self::Core(e) => e.kind(),
            Self::NoFaceDetected => ErrorKind::NoFaceDetected,
            Self::MissingReference { .. } => ErrorKind::MissingReference,
            Self::DeadlineExceeded { .. } => ErrorKind::Timeout,
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    /// Returns `true` if the sensor session cannot continue.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        self.severity().is_session_fatal()
    }
}
