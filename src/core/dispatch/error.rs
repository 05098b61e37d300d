use serde::Serialize;
use thiserror::Error;

use crate::adapters::llm::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MissingModel,
    MissingMessages,
    InvalidTemperature,
    RateLimitExceeded,
    ModelNotFound,
    ProviderNotSupported,
    StreamingNotSupported,
    MissingCredential,
    HttpError,
    MalformedResponse,
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingModel => "MISSING_MODEL",
            ErrorKind::MissingMessages => "MISSING_MESSAGES",
            ErrorKind::InvalidTemperature => "INVALID_TEMPERATURE",
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorKind::ProviderNotSupported => "PROVIDER_NOT_SUPPORTED",
            ErrorKind::StreamingNotSupported => "STREAMING_NOT_SUPPORTED",
            ErrorKind::MissingCredential => "MISSING_CREDENTIAL",
            ErrorKind::HttpError => "HTTP_ERROR",
            ErrorKind::MalformedResponse => "MALFORMED_RESPONSE",
            ErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

/// A failed dispatch, classified for the caller.
///
/// `provider` is empty until the model has been resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct DispatchError {
    pub kind: ErrorKind,
    pub message: String,
    pub provider: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl DispatchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            message: if message.trim().is_empty() {
                kind.as_str().to_string()
            } else {
                message
            },
            provider: String::new(),
            retryable: kind == ErrorKind::RateLimitExceeded,
            status: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn from_adapter(error: AdapterError) -> Self {
        let retryable = error.is_retryable();
        let provider = error.provider().to_string();
        let message = error.to_string();

        let (kind, status) = match &error {
            AdapterError::MissingCredential { .. } => (ErrorKind::MissingCredential, None),
            AdapterError::Http { status, .. } => (ErrorKind::HttpError, Some(*status)),
            AdapterError::Network { .. } => (ErrorKind::HttpError, None),
            AdapterError::MalformedResponse { .. } => (ErrorKind::MalformedResponse, None),
            AdapterError::Provider { .. } => (ErrorKind::UnknownError, None),
        };

        Self {
            kind,
            message,
            provider,
            retryable,
            status,
        }
    }

    /// True when the fix is on the user's side: a missing or rejected key.
    pub fn needs_configuration(&self) -> bool {
        match self.kind {
            ErrorKind::MissingCredential => true,
            ErrorKind::HttpError => matches!(self.status, Some(401 | 403)),
            _ => false,
        }
    }
}

impl From<AdapterError> for DispatchError {
    fn from(error: AdapterError) -> Self {
        Self::from_adapter(error)
    }
}
