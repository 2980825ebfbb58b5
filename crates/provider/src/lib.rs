//! External image-generation provider client.
//!
//! The core treats the provider as a blocking RPC: one image and a prompt
//! in, one enhanced image or an error out, synchronously. No callback
//! machinery here, unlike `crates/runpod`'s async postback model (that
//! backend is genuinely async; this one isn't) — the worker calls
//! [`ImageProvider::enhance`] and awaits the result directly, wrapping the
//! call in its own `tokio::time::timeout` for the provider deadline.

pub mod mock;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider configuration error: {0}")]
    Configuration(String),

    /// Eligible for retry within the worker's internal backoff budget
    /// (network errors, 5xx, rate limiting).
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Not worth retrying (4xx other than rate limiting, malformed
    /// response, content rejected).
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

/// Tier-derived quality parameters. `free`/`premium` map to distinct
/// provider-side quality settings; kept as an open JSON bag the same way
/// the teacher's `RenderRequest::options` is, since the provider's actual
/// parameter set is an external collaborator's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceRequest {
    pub job_id: uuid::Uuid,
    pub tier: String,
    pub prompt: String,
    pub quality_params: serde_json::Value,
    #[serde(skip)]
    pub input: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct EnhanceResult {
    pub output: Bytes,
    pub content_type: String,
}

/// Client for a single blocking enhance call.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn enhance(&self, request: EnhanceRequest) -> Result<EnhanceResult, ProviderError>;
}

/// Quality parameters per tier, matching `credits_per_tier`'s keys.
pub fn quality_params_for_tier(tier: &str) -> serde_json::Value {
    match tier {
        "premium" => serde_json::json!({ "quality": "high", "upscale": true }),
        _ => serde_json::json!({ "quality": "standard", "upscale": false }),
    }
}

#[derive(Clone)]
pub struct ProviderConfig {
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ProviderError> {
        let provider = std::env::var("IMAGE_PROVIDER").unwrap_or_else(|_| "mock".to_string());
        let base_url = std::env::var("PROVIDER_BASE_URL")
            .unwrap_or_else(|_| "https://api.provider.invalid".to_string());
        let api_key = std::env::var("PROVIDER_API_KEY").unwrap_or_default();
        Ok(Self { provider, base_url, api_key })
    }
}

/// HTTP client implementation, used for any real provider reachable over a
/// simple "POST image + prompt, get image back" contract.
pub struct HttpImageProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpImageProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self { client: reqwest::Client::new(), base_url, api_key }
    }
}

#[async_trait]
impl ImageProvider for HttpImageProvider {
    async fn enhance(&self, request: EnhanceRequest) -> Result<EnhanceResult, ProviderError> {
        let form = reqwest::multipart::Form::new()
            .text("prompt", request.prompt.clone())
            .text("tier", request.tier.clone())
            .text("quality_params", request.quality_params.to_string())
            .part(
                "image",
                reqwest::multipart::Part::bytes(request.input.to_vec())
                    .file_name("input")
                    .mime_str(&request.content_type)
                    .map_err(|e| ProviderError::Configuration(e.to_string()))?,
            );

        let response = self
            .client
            .post(format!("{}/v1/enhance", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ProviderError::Transient(e.to_string())
                } else {
                    ProviderError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(ProviderError::Transient(format!(
                "provider returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::Permanent(format!(
                "provider returned {status}"
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        let output = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        Ok(EnhanceResult { output, content_type })
    }
}

pub struct ImageProviderFactory;

impl ImageProviderFactory {
    pub fn create(config: ProviderConfig) -> Result<Box<dyn ImageProvider>, ProviderError> {
        match config.provider.as_str() {
            "http" => {
                tracing::info!(base_url = %config.base_url, "creating HTTP image provider");
                Ok(Box::new(HttpImageProvider::new(config.base_url, config.api_key)))
            }
            "mock" => {
                tracing::info!("creating mock image provider");
                Ok(Box::new(mock::MockImageProvider::new()))
            }
            other => Err(ProviderError::Configuration(format!(
                "unknown image provider: {other}. Supported providers: http, mock"
            ))),
        }
    }
}
