//! Error types for hardware operations.
//!
//! Transport failures (open, handshake, lost link) are fatal to the sensor
//! session. Everything else is scoped to the call that produced it.

use biogate_core::{ErrorKind, FingerprintStatus};

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Link-level failure talking to the device.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Malformed answer from the device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Device could not be opened or configured.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// The sensor rejected the handshake password.
    #[error("Handshake rejected by {device}")]
    AuthenticationFailed { device: String },

    /// The sensor answered with a status the operation cannot accept.
    #[error("Sensor rejected {operation}: {status}")]
    SensorProtocol {
        operation: String,
        status: FingerprintStatus,
    },

    /// Another session already owns the transport.
    #[error("Sensor session already active on {transport}")]
    SessionBusy { transport: String },

    /// Image capture failed.
    #[error("Capture failed: {message}")]
    CaptureFailed { message: String },

    /// The face embedding service could not be used.
    #[error("Embedder unavailable: {message}")]
    EmbedderUnavailable { message: String },

    /// Device configuration error.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Packet-level error from the wire codec.
    #[error(transparent)]
    Protocol(#[from] biogate_core::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    pub fn authentication_failed(device: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            device: device.into(),
        }
    }

    pub fn sensor_protocol(operation: impl Into<String>, status: FingerprintStatus) -> Self {
        Self::SensorProtocol {
            operation: operation.into(),
            status,
        }
    }

    pub fn session_busy(transport: impl Into<String>) -> Self {
        Self::SessionBusy {
            transport: transport.into(),
        }
    }

    pub fn capture_failed(message: impl Into<String>) -> Self {
        Self::CaptureFailed {
            message: message.into(),
        }
    }

    pub fn embedder_unavailable(message: impl Into<String>) -> Self {
        Self::EmbedderUnavailable {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Taxonomy entry for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Disconnected { .. }
            | Self::CommunicationError { .. }
            | Self::InitializationFailed { .. }
            | Self::AuthenticationFailed { .. }
            | Self::SessionBusy { .. }
            | Self::Serial(_)
            | Self::Io(_) => ErrorKind::Transport,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidData { .. } | Self::SensorProtocol { .. } | Self::CaptureFailed { .. } => {
                ErrorKind::SensorProtocol
            }
            Self::EmbedderUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::ConfigurationError { .. } => ErrorKind::Configuration,
            Self::Protocol(e) => e.kind(),
        }
    }

    /// Returns `true` if the sensor session cannot continue.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("/dev/serial0");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Device disconnected: /dev/serial0");
    }

    #[test]
    fn test_sensor_protocol_error() {
        let error = HardwareError::sensor_protocol("search", FingerprintStatus::CommError);
        assert_eq!(error.to_string(), "Sensor rejected search: comm_error");
        assert_eq!(error.kind(), ErrorKind::SensorProtocol);
        assert!(!error.is_transport());
    }

    #[test]
    fn test_handshake_error() {
        let error = HardwareError::authentication_failed("/dev/ttyUSB0");
        assert_eq!(error.to_string(), "Handshake rejected by /dev/ttyUSB0");
        assert!(error.is_transport());
    }

    #[rstest]
    #[case(HardwareError::disconnected("x"), ErrorKind::Transport)]
    #[case(HardwareError::communication("x"), ErrorKind::Transport)]
    #[case(HardwareError::session_busy("x"), ErrorKind::Transport)]
    #[case(HardwareError::timeout(100), ErrorKind::Timeout)]
    #[case(HardwareError::capture_failed("x"), ErrorKind::SensorProtocol)]
    #[case(HardwareError::embedder_unavailable("x"), ErrorKind::BackendUnavailable)]
    #[case(HardwareError::configuration("x"), ErrorKind::Configuration)]
    fn test_error_kind(#[case] error: HardwareError, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_protocol_error_keeps_kind() {
        let error = HardwareError::from(biogate_core::Error::ChecksumMismatch {
            expected: 1,
            actual: 2,
        });
        assert_eq!(error.kind(), ErrorKind::SensorProtocol);
    }
}
