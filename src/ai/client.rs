//! HTTP client for the LLM completion endpoint.
//!
//! One call to [`CompletionProvider::complete`] sends exactly one request.
//! Nothing is retried here; callers look at [`AiError::is_retryable`] and
//! decide for themselves.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};

use super::types::{
    ChatMessage, CompletionOptions, CompletionRequest, CompletionResponse, FINAL_STATUS,
};
use super::AiError;
use crate::config::AiConfig;

/// Header carrying the tenant (folder) id.
const CATALOG_HEADER: &str = "x-folder-id";

/// Longest slice of an error body that ends up in logs and messages.
const ERROR_BODY_SNIPPET_CHARS: usize = 300;

/// Anything that can turn a prompt into raw completion text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, AiError>;
}

/// Completion client for a YandexGPT-style `foundationModels/v1/completion` API.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    endpoint: String,
    authorization: String,
    catalog_id: String,
    model_uri: String,
    timeout: Duration,
    http: Client,
}

impl CompletionClient {
    /// Build a client from validated configuration.
    ///
    /// Fails with [`AiError::Configuration`] when endpoint, credential or
    /// catalog id is missing. No request is made.
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        config.validate()?;

        let missing = |what: &str| AiError::Configuration(format!("missing {}", what));
        let endpoint = config.endpoint.clone().ok_or_else(|| missing("endpoint"))?;
        let credential = config.credential.as_ref().ok_or_else(|| missing("credential"))?;
        let catalog_id = config.catalog_id.clone().ok_or_else(|| missing("catalog id"))?;
        let model_uri = config
            .resolved_model_uri()
            .ok_or_else(|| missing("model URI"))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            authorization: credential.authorization_header(),
            catalog_id,
            model_uri,
            timeout: config.timeout,
            http,
        })
    }

    pub fn model_uri(&self) -> &str {
        &self.model_uri
    }

    fn classify_send_error(&self, err: reqwest::Error) -> AiError {
        if err.is_builder() {
            tracing::error!("Invalid completion request: {}", err);
            AiError::Configuration(format!("invalid completion request: {}", err))
        } else if err.is_timeout() {
            tracing::error!("Completion request timed out after {:?}", self.timeout);
            AiError::Unavailable(format!("request timed out after {:?}", self.timeout))
        } else {
            tracing::error!("No response from completion service: {}", err);
            AiError::Unavailable(format!("no response received: {}", err))
        }
    }
}

#[async_trait]
impl CompletionProvider for CompletionClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, AiError> {
        let body = CompletionRequest {
            model_uri: &self.model_uri,
            completion_options: CompletionOptions {
                stream: false,
                ..options
            },
            messages,
        };

        tracing::debug!(
            model = %self.model_uri,
            messages = messages.len(),
            temperature = options.temperature,
            max_tokens = options.max_tokens,
            "Sending completion request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, &self.authorization)
            .header(CATALOG_HEADER, &self.catalog_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::error!("Failed to read completion response body: {}", e);
            AiError::Unavailable(format!("failed to read response body: {}", e))
        })?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::error!(
                "Completion service rejected credentials: {} {}",
                status,
                snippet(&text)
            );
            return Err(AiError::Auth {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            tracing::error!("Completion service error: {} {}", status, snippet(&text));
            return Err(AiError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                snippet(&text)
            )));
        }

        let parsed: CompletionResponse = serde_json::from_str(&text).map_err(|e| {
            tracing::warn!("Unexpected completion response format: {}", e);
            AiError::MalformedResponse(e.to_string())
        })?;

        if let Some(usage) = &parsed.result.usage {
            tracing::debug!(
                input_tokens = usage.input_text_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                model_version = parsed.result.model_version.as_deref().unwrap_or("unknown"),
                "Completion usage"
            );
        }

        match parsed.first_status() {
            Some(FINAL_STATUS) | None => {}
            Some(status) => tracing::debug!(status, "Completion alternative is not final"),
        }

        match parsed.first_text() {
            Some(text) => Ok(text.to_string()),
            None => {
                tracing::warn!("Completion response has no text");
                Err(AiError::MalformedResponse(
                    "response has no completion text".to_string(),
                ))
            }
        }
    }
}

/// Stand-in used when the completion endpoint is not configured.
///
/// Every call fails fast with [`AiError::Configuration`].
#[derive(Debug, Clone)]
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CompletionProvider for UnconfiguredProvider {
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _options: CompletionOptions,
    ) -> Result<String, AiError> {
        tracing::error!("Breakdown requested but completion service is not configured");
        Err(AiError::Configuration(self.reason.clone()))
    }
}

/// Build the provider for `config`, falling back to [`UnconfiguredProvider`]
/// so the rest of the API keeps working without LLM credentials.
pub fn create_provider(config: &AiConfig) -> Arc<dyn CompletionProvider> {
    match CompletionClient::from_config(config) {
        Ok(client) => {
            tracing::info!("Completion client ready (model {})", client.model_uri());
            Arc::new(client)
        }
        Err(e) => {
            tracing::error!("Task breakdown disabled: {}", e);
            Arc::new(UnconfiguredProvider::new(e.to_string()))
        }
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(ERROR_BODY_SNIPPET_CHARS).collect()
}
