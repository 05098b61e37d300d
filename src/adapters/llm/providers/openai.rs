use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::adapters::llm::sse::{self, Frame};
use crate::adapters::llm::{
    ensure_success, AdapterError, ChatMessage, ChatRequest, ChatResponse, FinishReason,
    StreamEvent, TokenUsage,
};
use crate::core::ports::credentials::{Credential, CredentialStore};
use crate::core::ports::llm::ProviderAdapter;

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const PERPLEXITY_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
}

/// Adapter for providers speaking the OpenAI Chat Completions format.
pub struct OpenAiCompatibleAdapter {
    id: String,
    endpoint: String,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
}

impl OpenAiCompatibleAdapter {
    pub fn new(
        id: impl Into<String>,
        endpoint: impl Into<String>,
        client: reqwest::Client,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            id: id.into(),
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
            .get(&self.id)
            .ok_or_else(|| AdapterError::missing_credential(&self.id))?;

        log::debug!(
            "{} request: model={}, messages={}, stream={}",
            self.id,
            request.model,
            request.messages.len(),
            stream
        );

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&build_body(request, stream));
        if let Credential::ApiKey(key) = &credential {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AdapterError::network(&self.id, e))?;
        ensure_success(&self.id, response).await
    }
}

fn build_body(request: &ChatRequest, stream: bool) -> ChatCompletionsRequest<'_> {
    ChatCompletionsRequest {
        model: &request.model,
        messages: request.messages.iter().map(wire_message).collect(),
        temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        stream,
    }
}

fn wire_message(message: &ChatMessage) -> WireMessage<'_> {
    WireMessage {
        role: message.role.as_str(),
        content: &message.content,
    }
}

pub(crate) fn parse_completion(
    provider: &str,
    model: &str,
    body: &str,
) -> Result<ChatResponse, AdapterError> {
    let parsed: ChatCompletionsResponse =
        serde_json::from_str(body).map_err(|e| AdapterError::malformed(provider, e.to_string()))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::malformed(provider, "response contained no choices"))?;
    let usage = parsed.usage.unwrap_or_default();

    Ok(ChatResponse {
        content: choice
            .message
            .and_then(|message| message.content)
            .unwrap_or_default(),
        model: model.to_string(),
        usage: TokenUsage::new(
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens,
        ),
        finish_reason: FinishReason::from_provider(choice.finish_reason.as_deref()),
    })
}

pub(crate) fn decode_delta(provider: &str, payload: &Value) -> Result<Frame, AdapterError> {
    if let Some(error) = payload.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return Err(AdapterError::Provider {
            provider: provider.to_string(),
            message: message.to_string(),
            retryable: false,
        });
    }

    let text = payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str);

    Ok(match text {
        Some(text) => Frame::Text(text.to_string()),
        None => Frame::Skip,
    })
}

impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn id(&self) -> &str {
        &self.id
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
                .map_err(|e| AdapterError::network(&self.id, e))?;
            parse_completion(&self.id, &request.model, &body)
        })
    }

    fn complete_stream<'a>(
        &'a self,
        request: &'a ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> BoxFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let response = self.send(request, true).await?;
            let provider = self.id.as_str();
            sse::forward_events(
                response.bytes_stream(),
                |payload| decode_delta(provider, payload),
                &tx,
                |e| AdapterError::network(provider, e),
            )
            .await
        })
    }
}
