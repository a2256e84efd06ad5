use biogate_core::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors raised while talking to the backend or the embedding service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure (connect, timeout, reset).
    #[error("Backend unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Backend answered {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be interpreted.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    /// A stored embedding could not be decoded.
    #[error("Invalid stored embedding: {0}")]
    Encoding(#[from] biogate_core::Error),

    /// The service understood the request and refused it.
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Invalid backend URL: {0}")]
    Url(String),
}

impl GatewayError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Returns `true` if retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) | Self::Encoding(_) | Self::Rejected(_) | Self::Url(_) => {
                false
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encoding(e) => e.kind(),
            Self::Url(_) => ErrorKind::Configuration,
            Self::Http(_) | Self::Status { .. } | Self::InvalidResponse(_) | Self::Rejected(_) => {
                ErrorKind::BackendUnavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(500, true)]
    #[case(503, true)]
    #[case(429, true)]
    #[case(400, false)]
    #[case(404, false)]
    fn test_status_transience(#[case] status: u16, #[case] transient: bool) {
        assert_eq!(GatewayError::status(status, "").is_transient(), transient);
    }

    #[test]
    fn test_encoding_error_kind() {
        let error = GatewayError::from(biogate_core::Error::ShapeMismatch {
            left: 512,
            right: 128,
        });
        assert_eq!(error.kind(), ErrorKind::ShapeMismatch);
        assert!(!error.is_transient());
        assert_eq!(
            GatewayError::status(502, "bad gateway").kind(),
            ErrorKind::BackendUnavailable
        );
    }
}
