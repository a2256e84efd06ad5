//! Backend and model-service clients.
//!
//! - [`BackendGateway`]: reference embeddings in, authentication outcomes out.
//!   [`HttpBackend`] is the HTTP implementation.
//! - [`ServiceEmbedder`]: the face embedding service, exposed to the core as a
//!   [`biogate_hardware::FaceEmbedder`].
//! - [`encoding`]: base64 wire format of embedding vectors.
//!
//! # Architecture
//!
//! ```text
//! AuthOrchestrator
//!     ├─> BackendGateway ──(HTTP)──> GET  /api/user-encoding/{slot}
//!     │                              POST /api/log-auth
//!     └─> FaceEmbedder ──(HTTP)──> POST {embedder_url} (multipart)
//! ```
//!
//! [`mock::MockGateway`] serves references from memory for tests.
//!
//! Calls are retried with exponential backoff on transient failures only
//! (connection errors, timeouts, 429 and 5xx answers).

pub mod embedder;
pub mod encoding;
pub mod error;
pub mod gateway;
pub mod http;
pub mod mock;
pub mod retry;

pub use embedder::{DEFAULT_EMBEDDER_URL, FaceEncoding, ServiceEmbedder, ServiceEmbedderConfig};
pub use error::{GatewayError, Result};
pub use gateway::BackendGateway;
pub use http::{HttpBackend, HttpBackendConfig, LogAuthRequest};
pub use retry::RetryPolicy;
