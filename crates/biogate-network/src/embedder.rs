//! Client for the face embedding service.
//!
//! The service takes a multipart form (`name`, `image`) and answers
//!
//! ```json
//! {"success": true, "message": "...", "data": {"encoding": "<base64>", "embedding_length": 512}}
//! ```
//!
//! A refusal whose message mentions "no face" means the image holds no face.

use crate::encoding::decode_vector;
use crate::error::{GatewayError, Result};
use crate::retry::RetryPolicy;
use biogate_core::Error;
use biogate_hardware::{FaceEmbedder, HardwareError, ImageFrame};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default URL of the embedding service.
pub const DEFAULT_EMBEDDER_URL: &str = "http://localhost:5001/register-face";

#[derive(Debug, Clone)]
pub struct ServiceEmbedderConfig {
    pub url: String,
    pub timeout: Duration,
    /// Value of the `name` form field for authentication captures.
    pub capture_name: String,
    pub retry: RetryPolicy,
}

impl Default for ServiceEmbedderConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_EMBEDDER_URL.to_string(),
            timeout: Duration::from_secs(30),
            capture_name: "capture".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Encoded embedding as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceEncoding {
    pub encoding: String,
    pub embedding_length: usize,
}

#[derive(Debug, Deserialize)]
struct EncodeResponse {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<FaceEncoding>,
}

#[derive(Debug, Clone)]
pub struct ServiceEmbedder {
    client: Client,
    config: ServiceEmbedderConfig,
}

impl ServiceEmbedder {
    /// # Errors
    /// Returns `Http` if the client cannot be built.
    pub fn new(config: ServiceEmbedderConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Run the model on one image.
    ///
    /// Returns `None` when no face was detected.
    ///
    /// # Errors
    /// `Encoding` when the service reports an invalid embedding, `Rejected`
    /// for any other refusal, transport and status errors otherwise.
    pub async fn encode(&self, name: &str, image: &[u8]) -> Result<Option<FaceEncoding>> {
        debug!(name, len = image.len(), url = %self.config.url, "Requesting face encoding");

        let response = self
            .config
            .retry
            .run("encode_face", async || {
                let part = Part::bytes(image.to_vec())
                    .file_name("capture.jpg")
                    .mime_str("image/jpeg")?;
                let form = Form::new().text("name", name.to_string()).part("image", part);

                let response = self.client.post(&self.config.url).multipart(form).send().await?;
                let status = response.status();
                let text = response.text().await?;
                match serde_json::from_str::<EncodeResponse>(&text) {
                    Ok(body) => Ok(body),
                    Err(_) if !status.is_success() => {
                        Err(GatewayError::status(status.as_u16(), text))
                    }
                    Err(e) => Err(GatewayError::invalid_response(e.to_string())),
                }
            })
            .await?;

        if response.success {
            return response
                .data
                .map(Some)
                .ok_or_else(|| GatewayError::invalid_response("success without data"));
        }

        let message = response.message.to_lowercase();
        if message.contains("no face") {
            debug!(name, "No face detected");
            Ok(None)
        } else if message.contains("invalid embedding") {
            Err(Error::InvalidEncoding(response.message).into())
        } else {
            warn!(name, message = %response.message, "Embedding service refused the image");
            Err(GatewayError::Rejected(response.message))
        }
    }
}

impl FaceEmbedder for ServiceEmbedder {
    async fn embeddings(&mut self, frame: &ImageFrame) -> biogate_hardware::Result<Vec<Vec<f32>>> {
        let encoded = self
            .encode(&self.config.capture_name, &frame.bytes)
            .await
            .map_err(|e| match e {
                GatewayError::Encoding(e) => HardwareError::from(e),
                other => HardwareError::embedder_unavailable(other.to_string()),
            })?;

        match encoded {
            Some(face) => {
                let values = decode_vector(&face.encoding)?;
                if values.len() != face.embedding_length {
                    warn!(
                        announced = face.embedding_length,
                        actual = values.len(),
                        "Embedding length disagrees with its announcement"
                    );
                }
                Ok(vec![values])
            }
            None => Ok(Vec::new()),
        }
    }
}
