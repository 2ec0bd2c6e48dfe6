//! Wire types for the completion endpoint.

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

// ============================================================
// Request Types
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// Generation options. Streaming stays off: the parser needs the full text.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    pub stream: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            stream: false,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest<'a> {
    pub model_uri: &'a str,
    pub completion_options: CompletionOptions,
    pub messages: &'a [ChatMessage],
}

// ============================================================
// Response Types
// ============================================================

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub result: CompletionResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub message: Option<AlternativeMessage>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlternativeMessage {
    #[serde(default)]
    pub text: Option<String>,
}

/// Status the endpoint reports for a complete, untruncated alternative.
pub const FINAL_STATUS: &str = "ALTERNATIVE_STATUS_FINAL";

/// Token accounting. The endpoint encodes counts as strings, older
/// deployments as numbers; both are accepted. Counts that cannot be read
/// become 0 so that bad accounting never hides the completion text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(default, deserialize_with = "count")]
    pub input_text_tokens: u64,
    #[serde(default, deserialize_with = "count")]
    pub completion_tokens: u64,
    #[serde(default, deserialize_with = "count")]
    pub total_tokens: u64,
}

fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Float(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    let count = match Count::deserialize(deserializer)? {
        Count::Number(n) => Some(n),
        Count::Float(f) => whole(f),
        Count::Text(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole))
        }
        Count::Other(_) => None,
    };

    Ok(count.unwrap_or_else(|| {
        tracing::debug!("Ignoring unreadable token count");
        0
    }))
}

fn whole(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0).then(|| f.round() as u64)
}

impl CompletionResponse {
    /// Text of the first alternative, if it has any non-blank text.
    pub fn first_text(&self) -> Option<&str> {
        self.result
            .alternatives
            .first()
            .and_then(|alt| alt.message.as_ref())
            .and_then(|msg| msg.text.as_deref())
            .filter(|text| !text.trim().is_empty())
    }

    /// Status of the first alternative, e.g. `ALTERNATIVE_STATUS_TRUNCATED_FINAL`.
    pub fn first_status(&self) -> Option<&str> {
        self.result
            .alternatives
            .first()
            .and_then(|alt| alt.status.as_deref())
    }
}
