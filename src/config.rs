//! Runtime configuration loaded from environment variables.
//!
//! Everything is read once at startup. The completion endpoint settings are
//! validated there too, so a misconfigured deployment is reported in the log
//! as soon as the server starts instead of on the first breakdown request.

use std::path::PathBuf;
use std::time::Duration;

use crate::ai::{AiError, CompletionOptions};

/// Default YandexGPT-compatible completion endpoint.
pub const DEFAULT_COMPLETION_URL: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

/// Model used when only a catalog id is configured.
pub const DEFAULT_MODEL_NAME: &str = "yandexgpt";

pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 120;

/// Credential sent to the completion endpoint.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Short-lived IAM token, sent as `Authorization: Bearer <token>`.
    IamToken(String),
    /// Service account API key, sent as `Authorization: Api-Key <key>`.
    ApiKey(String),
}

impl Credential {
    pub fn authorization_header(&self) -> String {
        match self {
            Self::IamToken(token) => format!("Bearer {}", token),
            Self::ApiKey(key) => format!("Api-Key {}", key),
        }
    }
}

// Never print secrets, not even at debug level.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IamToken(_) => f.write_str("IamToken(***)"),
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
        }
    }
}

/// Settings for the LLM completion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub endpoint: Option<String>,
    pub credential: Option<Credential>,
    /// Tenant (folder) id, sent as `x-folder-id` and used to build the model URI.
    pub catalog_id: Option<String>,
    /// Explicit model URI, e.g. `gpt://<catalog>/yandexgpt-lite`.
    pub model_uri: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: Some(DEFAULT_COMPLETION_URL.to_string()),
            credential: None,
            catalog_id: None,
            model_uri: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl AiConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup. Blank values count as unset.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let endpoint = match lookup("TASKBREAK_LLM_URL") {
            Some(url) => Some(url.trim().to_string()).filter(|u| !u.is_empty()),
            None => Some(DEFAULT_COMPLETION_URL.to_string()),
        };

        let credential = get("TASKBREAK_LLM_IAM_TOKEN")
            .map(Credential::IamToken)
            .or_else(|| get("TASKBREAK_LLM_API_KEY").map(Credential::ApiKey));

        let temperature = get("TASKBREAK_LLM_TEMPERATURE")
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|t| (0.0..=1.0).contains(t))
            .unwrap_or(DEFAULT_TEMPERATURE);

        let max_tokens = get("TASKBREAK_LLM_MAX_TOKENS")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout = get("TASKBREAK_LLM_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)))
            .unwrap_or(DEFAULT_TIMEOUT);

        Self {
            endpoint,
            credential,
            catalog_id: get("TASKBREAK_LLM_CATALOG_ID"),
            model_uri: get("TASKBREAK_LLM_MODEL_URI"),
            temperature,
            max_tokens,
            timeout,
        }
    }

    /// Check that every value needed to call the endpoint is present.
    ///
    /// The error lists all missing values at once.
    pub fn validate(&self) -> Result<(), AiError> {
        let mut missing = Vec::new();
        if self.endpoint.is_none() {
            missing.push("endpoint (TASKBREAK_LLM_URL)");
        }
        if self.credential.is_none() {
            missing.push("credential (TASKBREAK_LLM_IAM_TOKEN or TASKBREAK_LLM_API_KEY)");
        }
        if self.catalog_id.is_none() {
            missing.push("catalog id (TASKBREAK_LLM_CATALOG_ID)");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AiError::Configuration(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }

    /// Generation options for breakdown requests.
    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            stream: false,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Model URI sent in the request body.
    pub fn resolved_model_uri(&self) -> Option<String> {
        self.model_uri.clone().or_else(|| {
            self.catalog_id
                .as_ref()
                .map(|catalog| format!("gpt://{}/{}", catalog, DEFAULT_MODEL_NAME))
        })
    }
}

/// Server-level settings.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Overrides the platform default database location.
    pub db_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("TASKBREAK_DB_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}
