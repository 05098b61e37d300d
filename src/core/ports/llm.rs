use futures::future::BoxFuture;
use tokio::sync::mpsc;

pub use crate::adapters::llm::{
    AdapterError, ChatMessage, ChatRequest, ChatResponse, FinishReason, Role, StreamEvent,
    TokenUsage,
};

/// One provider's wire format behind a uniform request/response shape.
///
/// `complete_stream` pushes `StreamEvent::Text` in decode order and ends a
/// clean stream with `StreamEvent::Done`. Failures are reported through the
/// returned `Result`, never in-band. When the receiving half is dropped the
/// adapter stops reading and returns `Ok(())`.
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> &str;

    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> BoxFuture<'a, Result<ChatResponse, AdapterError>>;

    fn complete_stream<'a>(
        &'a self,
        request: &'a ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> BoxFuture<'a, Result<(), AdapterError>>;
}
