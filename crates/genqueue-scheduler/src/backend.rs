//! Remote generation capability.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use genqueue_core::config::GenerationConfig;
use genqueue_core::error::{AppError, ErrorKind};
use genqueue_core::result::AppResult;
use genqueue_entity::job::GenerationParams;

/// Failure of a single generation attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    /// The call did not finish within the configured timeout.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// A failure that may succeed on another attempt.
    #[error("transient generation failure: {0}")]
    Transient(String),

    /// A failure that will not succeed on retry.
    #[error("permanent generation failure: {0}")]
    Permanent(String),
}

impl GenerationError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Produces generation results for a model.
#[async_trait]
pub trait GenerationBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Run one generation request.
    async fn generate(&self, model_id: &str, params: &GenerationParams)
    -> Result<Value, GenerationError>;
}

/// Generation backend reached over HTTP.
///
/// Sends `POST {base_url}/v1/models/{model_id}/generate` with the
/// parameters as the JSON body and expects a JSON result.
#[derive(Debug, Clone)]
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGenerationBackend {
    /// Build a backend from configuration.
    pub fn new(config: &GenerationConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "Failed to build generation HTTP client",
                    e,
                )
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!("{}/v1/models/{model_id}/generate", self.base_url)
    }

    fn classify(err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Transient(format!("request timed out: {err}"))
        } else if err.is_builder() {
            GenerationError::Permanent(format!("invalid request: {err}"))
        } else {
            GenerationError::Transient(format!("request failed: {err}"))
        }
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(
        &self,
        model_id: &str,
        params: &GenerationParams,
    ) -> Result<Value, GenerationError> {
        let mut request = self.client.post(self.endpoint(model_id)).json(params);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(Self::classify)?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let message = format!("backend returned {status}: {body}");
            return Err(status_error(status.as_u16(), message));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GenerationError::Transient(format!("malformed backend response: {e}")))
    }
}

/// Server errors, throttling and request timeouts are worth retrying;
/// any other client error is not.
fn status_error(status: u16, message: String) -> GenerationError {
    match status {
        408 | 429 | 500..=599 => GenerationError::Transient(message),
        _ => GenerationError::Permanent(message),
    }
}
