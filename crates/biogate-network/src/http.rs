//! HTTP implementation of [`BackendGateway`].

use crate::encoding::decode_embedding;
use crate::error::{GatewayError, Result};
use crate::gateway::BackendGateway;
use crate::retry::RetryPolicy;
use biogate_core::constants::{DEFAULT_BACKEND_TIMEOUT_MS, DEFAULT_BACKEND_URL};
use biogate_core::{AuthOutcome, FaceEmbedding, SlotId};
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Configuration for the HTTP backend client.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL, e.g. `http://localhost:3000`.
    pub base_url: String,

    /// Per-request timeout (default: 3000 ms)
    pub timeout: Duration,

    pub retry: RetryPolicy,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_BACKEND_TIMEOUT_MS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Body of `POST /api/log-auth`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogAuthRequest {
    pub fingerprint_id: u16,
    pub result: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub distance: f64,
    pub attempt_id: Uuid,
}

impl From<&AuthOutcome> for LogAuthRequest {
    fn from(outcome: &AuthOutcome) -> Self {
        Self {
            fingerprint_id: outcome.slot_id.as_u16(),
            result: outcome.result_str().to_string(),
            timestamp: outcome
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            distance: outcome.distance,
            attempt_id: outcome.attempt_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EncodingResponse {
    #[serde(default)]
    encoding: Option<String>,
}

/// Backend client over `reqwest`.
///
/// # Examples
///
/// ```no_run
/// use biogate_core::SlotId;
/// use biogate_network::{BackendGateway, HttpBackend, HttpBackendConfig};
///
/// # async fn example() -> biogate_network::Result<()> {
/// let backend = HttpBackend::new(HttpBackendConfig::default())?;
/// if let Some(reference) = backend.fetch_embedding(SlotId::from_raw(7)).await? {
///     println!("reference has {} values", reference.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpBackend {
    /// # Errors
    /// Returns `Url` for an unparsable base URL, or `Http` if the client
    /// cannot be built.
    pub fn new(config: HttpBackendConfig) -> Result<Self> {
        // A trailing slash makes `join` append instead of replacing the last segment.
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base).map_err(|e| GatewayError::Url(format!("{base}: {e}")))?;

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url,
            retry: config.retry,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Url(format!("{path}: {e}")))
    }
}

impl BackendGateway for HttpBackend {
    async fn fetch_embedding(&self, slot: SlotId) -> Result<Option<FaceEmbedding>> {
        let url = self.endpoint(&format!("api/user-encoding/{slot}"))?;
        debug!(slot_id = %slot, %url, "Fetching reference embedding");

        let response = self
            .retry
            .run("fetch_embedding", async || {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GatewayError::status(status.as_u16(), body));
                }
                let body: EncodingResponse = response
                    .json()
                    .await
                    .map_err(|e| GatewayError::invalid_response(e.to_string()))?;
                Ok(Some(body))
            })
            .await?;

        let Some(encoding) = response
            .and_then(|body| body.encoding)
            .filter(|encoding| !encoding.trim().is_empty())
        else {
            info!(slot_id = %slot, "No reference embedding enrolled");
            return Ok(None);
        };

        let embedding = decode_embedding(&encoding)?;
        debug!(slot_id = %slot, "Reference embedding fetched");
        Ok(Some(embedding))
    }

    async fn submit_outcome(&self, outcome: &AuthOutcome) -> Result<()> {
        let url = self.endpoint("api/log-auth")?;
        let body = LogAuthRequest::from(outcome);

        self.retry
            .run("submit_outcome", async || {
                let response = self.client.post(url.clone()).json(&body).send().await?;
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(GatewayError::status(status.as_u16(), text));
                }
                Ok(())
            })
            .await?;

        info!(
            attempt_id = %outcome.attempt_id,
            slot_id = %outcome.slot_id,
            result = outcome.result_str(),
            "Authentication outcome logged"
        );
        Ok(())
    }
}
