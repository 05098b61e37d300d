pub mod providers;
pub mod sse;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A normalized chat request. Message order is sent to the provider as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Builds usage counters; a missing total is derived from the parts.
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: Option<u64>) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: total_tokens
                .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
}

impl FinishReason {
    /// Maps a provider's finish/stop reason tag. Unknown or absent tags are `Stop`.
    pub fn from_provider(tag: Option<&str>) -> Self {
        match tag.map(str::trim).unwrap_or_default() {
            "length" | "max_tokens" => FinishReason::Length,
            "content_filter" | "refusal" => FinishReason::ContentFilter,
            "tool_calls" | "tool_use" | "function_call" => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::ToolCalls => "tool_calls",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Text(String),
    Done,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("no API key configured for provider '{provider}'")]
    MissingCredential { provider: String },

    #[error("{provider} API error ({status}): {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} request failed: {message}")]
    Network {
        provider: String,
        message: String,
        timeout: bool,
    },

    #[error("{provider} returned a malformed response: {message}")]
    MalformedResponse { provider: String, message: String },

    /// An error reported inside an otherwise successful response.
    #[error("{provider} error: {message}")]
    Provider {
        provider: String,
        message: String,
        retryable: bool,
    },
}

impl AdapterError {
    pub fn missing_credential(provider: &str) -> Self {
        AdapterError::MissingCredential {
            provider: provider.to_string(),
        }
    }

    pub fn malformed(provider: &str, message: impl Into<String>) -> Self {
        AdapterError::MalformedResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn network(provider: &str, error: reqwest::Error) -> Self {
        AdapterError::Network {
            provider: provider.to_string(),
            timeout: error.is_timeout(),
            message: error.to_string(),
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            AdapterError::MissingCredential { provider }
            | AdapterError::Http { provider, .. }
            | AdapterError::Network { provider, .. }
            | AdapterError::MalformedResponse { provider, .. }
            | AdapterError::Provider { provider, .. } => provider,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Http { status, .. } => is_retryable_status(*status),
            AdapterError::Network { .. } => true,
            AdapterError::Provider { retryable, .. } => *retryable,
            AdapterError::MissingCredential { .. } | AdapterError::MalformedResponse { .. } => {
                false
            }
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 429) || (500..600).contains(&status)
}

/// Turns a non-2xx reply into `AdapterError::Http`, passing successes through.
pub(crate) async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::Http {
        provider: provider.to_string(),
        status: status.as_u16(),
        message: provider_error_message(&body, status.canonical_reason()),
    })
}

/// Prefers the provider's `error.message`, then the raw body, then the status reason.
pub(crate) fn provider_error_message(body: &str, reason: Option<&str>) -> String {
    let reported = serde_json::from_str::<Value>(body).ok().and_then(|parsed| {
        let error = parsed.get("error")?;
        error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map(ToOwned::to_owned)
    });

    if let Some(message) = reported.filter(|m| !m.trim().is_empty()) {
        return message;
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return truncate_chars(trimmed, MAX_ERROR_BODY_CHARS);
    }

    reason.unwrap_or("request failed").to_string()
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let head: String = input.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{head}...")
}
