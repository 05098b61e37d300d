use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::adapters::llm::sse::{self, Frame};
use crate::adapters::llm::{
    ensure_success, AdapterError, ChatMessage, ChatRequest, ChatResponse, FinishReason, Role,
    StreamEvent, TokenUsage,
};
use crate::core::ports::credentials::{Credential, CredentialStore};
use crate::core::ports::llm::ProviderAdapter;

pub const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1000;
/// The Messages API accepts temperatures in `0.0..=1.0`.
const MAX_TEMPERATURE: f32 = 1.0;
/// In-stream error types that go away on their own.
const TRANSIENT_ERROR_TYPES: [&str; 3] = ["overloaded_error", "api_error", "rate_limit_error"];

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

pub struct AnthropicAdapter {
    endpoint: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
}

impl AnthropicAdapter {
    pub const ID: &'static str = "anthropic";

    pub fn new(
        endpoint: impl Into<String>,
        client: reqwest::Client,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            credentials,
        }
    }

    async fn send(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, AdapterError> {
        let credential = self
            .credentials
            .get(Self::ID)
            .ok_or_else(|| AdapterError::missing_credential(Self::ID))?;

        log::debug!(
            "anthropic request: model={}, messages={}, stream={}",
            request.model,
            request.messages.len(),
            stream
        );

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&build_body(request, stream));
        if let Credential::ApiKey(key) = &credential {
            builder = builder.header("x-api-key", key.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AdapterError::network(Self::ID, e))?;
        ensure_success(Self::ID, response).await
    }
}

/// System messages move to the top-level `system` field (joined in order);
/// the remaining turns keep their relative order.
fn build_body(request: &ChatRequest, stream: bool) -> MessagesRequest<'_> {
    let system = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.trim())
        .filter(|content| !content.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    MessagesRequest {
        model: &request.model,
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: (!system.is_empty()).then_some(system),
        messages: request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(anthropic_message)
            .collect(),
        temperature: request
            .temperature
            .unwrap_or(DEFAULT_TEMPERATURE)
            .min(MAX_TEMPERATURE),
        stream,
    }
}

fn anthropic_message(message: &ChatMessage) -> AnthropicMessage<'_> {
    AnthropicMessage {
        role: message.role.as_str(),
        content: &message.content,
    }
}

pub(crate) fn parse_message(model: &str, body: &str) -> Result<ChatResponse, AdapterError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| AdapterError::malformed(AnthropicAdapter::ID, e.to_string()))?;

    let content = parsed
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<String>();
    let usage = parsed.usage.unwrap_or_default();

    Ok(ChatResponse {
        content,
        model: model.to_string(),
        usage: TokenUsage::new(
            usage.input_tokens.unwrap_or(0),
            usage.output_tokens.unwrap_or(0),
            None,
        ),
        finish_reason: FinishReason::from_provider(parsed.stop_reason.as_deref()),
    })
}

pub(crate) fn decode_event(payload: &Value) -> Result<Frame, AdapterError> {
    let event_type = payload.get("type").and_then(Value::as_str).unwrap_or("");

    match event_type {
        "content_block_delta" => {
            let Some(delta) = payload.get("delta") else {
                return Ok(Frame::Skip);
            };
            if delta.get("type").and_then(Value::as_str) != Some("text_delta") {
                return Ok(Frame::Skip);
            }
            Ok(delta
                .get("text")
                .and_then(Value::as_str)
                .map(|text| Frame::Text(text.to_string()))
                .unwrap_or(Frame::Skip))
        }
        "message_stop" => Ok(Frame::Stop),
        "error" => {
            let error = payload.get("error");
            let message = error
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            let error_type = error
                .and_then(|e| e.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("");
            Err(AdapterError::Provider {
                provider: AnthropicAdapter::ID.to_string(),
                message: message.to_string(),
                retryable: TRANSIENT_ERROR_TYPES.contains(&error_type),
            })
        }
        _ => Ok(Frame::Skip),
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> &str {
        Self::ID
    }

    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> BoxFuture<'a, Result<ChatResponse, AdapterError>> {
        Box::pin(async move {
            let response = self.send(request, false).await?;
            let body = response
                .text()
                .await
                .map_err(|e| AdapterError::network(Self::ID, e))?;
            parse_message(&request.model, &body)
        })
    }

    fn complete_stream<'a>(
        &'a self,
        request: &'a ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> BoxFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let response = self.send(request, true).await?;
            sse::forward_events(response.bytes_stream(), decode_event, &tx, |e| {
                AdapterError::network(Self::ID, e)
            })
            .await
        })
    }
}
