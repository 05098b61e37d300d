mod error;
mod rate_limit;
mod state;

pub use error::{DispatchError, ErrorKind};
pub use rate_limit::{Clock, RateLimitConfig, RateLimiter, SystemClock};
pub use state::DispatchState;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::adapters::providers::{AdapterRegistry, ProviderRegistry};
use crate::core::ports::llm::{ChatRequest, ChatResponse, ProviderAdapter, StreamEvent};

const MIN_TEMPERATURE: f32 = 0.0;
const MAX_TEMPERATURE: f32 = 2.0;

/// Validates, rate-limits and routes chat requests to provider adapters.
///
/// One instance owns its rate-limit log; share it behind an `Arc` to have
/// concurrent callers count against the same window. No retries happen here.
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    adapters: Arc<AdapterRegistry>,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProviderRegistry>, adapters: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            adapters,
            limiter: RateLimiter::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.limiter = RateLimiter::new(config);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn dispatch(&self, request: &ChatRequest) -> Result<ChatResponse, DispatchError> {
        let adapter = self.prepare(request, false)?;
        let result = adapter
            .complete(request)
            .await
            .map_err(DispatchError::from_adapter);
        self.finish(request, result)
    }

    /// Streams the reply into `tx`. Text arrives in order and a clean end is
    /// marked with `StreamEvent::Done`; failures come back from this call.
    pub async fn dispatch_stream(
        &self,
        request: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), DispatchError> {
        let adapter = self.prepare(request, true)?;
        let result = adapter
            .complete_stream(request, tx)
            .await
            .map_err(DispatchError::from_adapter);
        self.finish(request, result)
    }

    fn prepare(
        &self,
        request: &ChatRequest,
        streaming: bool,
    ) -> Result<Arc<dyn ProviderAdapter>, DispatchError> {
        self.enter(request, DispatchState::Validating);
        validate(request).map_err(|e| self.reject(request, e))?;

        self.enter(request, DispatchState::RateChecking);
        if !self.limiter.try_acquire(&request.model, self.clock.now()) {
            return Err(self.reject(
                request,
                DispatchError::new(
                    ErrorKind::RateLimitExceeded,
                    format!(
                        "Rate limit exceeded for model {}. Try again later.",
                        request.model
                    ),
                ),
            ));
        }

        self.enter(request, DispatchState::ResolvingModel);
        let model = self.registry.find_model(&request.model).ok_or_else(|| {
            self.reject(
                request,
                DispatchError::new(
                    ErrorKind::ModelNotFound,
                    format!("Model {} not found", request.model),
                ),
            )
        })?;

        if streaming && !model.supports_streaming {
            return Err(self.reject(
                request,
                DispatchError::new(
                    ErrorKind::StreamingNotSupported,
                    format!("Model {} does not support streaming", model.id),
                )
                .with_provider(&model.provider),
            ));
        }

        let adapter = self.adapters.get(&model.provider).ok_or_else(|| {
            self.reject(
                request,
                DispatchError::new(
                    ErrorKind::ProviderNotSupported,
                    format!("Provider {} not supported", model.provider),
                )
                .with_provider(&model.provider),
            )
        })?;

        self.enter(request, DispatchState::Delegating);
        Ok(adapter)
    }

    fn finish<T>(
        &self,
        request: &ChatRequest,
        result: Result<T, DispatchError>,
    ) -> Result<T, DispatchError> {
        match result {
            Ok(value) => {
                self.enter(request, DispatchState::Succeeded);
                Ok(value)
            }
            Err(e) => Err(self.reject(request, e)),
        }
    }

    fn enter(&self, request: &ChatRequest, state: DispatchState) {
        log::debug!("dispatch model={} state={state}", request.model);
    }

    fn reject(&self, request: &ChatRequest, error: DispatchError) -> DispatchError {
        self.enter(request, DispatchState::Failed);
        log::warn!(
            "dispatch failed: model={} kind={} provider={} retryable={}: {}",
            request.model,
            error.kind.as_str(),
            error.provider,
            error.retryable,
            error.message
        );
        error
    }
}

fn validate(request: &ChatRequest) -> Result<(), DispatchError> {
    if request.model.trim().is_empty() {
        return Err(DispatchError::new(
            ErrorKind::MissingModel,
            "Model is required",
        ));
    }
    if request.messages.is_empty() {
        return Err(DispatchError::new(
            ErrorKind::MissingMessages,
            "Messages are required",
        ));
    }
    if let Some(temperature) = request.temperature {
        // NaN fails the range check.
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(DispatchError::new(
                ErrorKind::InvalidTemperature,
                format!("Temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::rate_limit::testing::ManualClock;
    use super::{Dispatcher, ErrorKind, RateLimitConfig};
    use crate::adapters::llm::{AdapterError, TokenUsage};
    use crate::adapters::providers::{AdapterRegistry, ModelSpec, ProviderRegistry, ProviderSpec};
    use crate::core::ports::llm::{
        ChatMessage, ChatRequest, ChatResponse, FinishReason, ProviderAdapter, StreamEvent,
    };
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct StubAdapter {
        calls: AtomicUsize,
        fail_with_status: Option<u16>,
    }

    impl StubAdapter {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ProviderAdapter for StubAdapter {
        fn id(&self) -> &str {
            "stub"
        }

        fn complete<'a>(
            &'a self,
            request: &'a ChatRequest,
        ) -> BoxFuture<'a, Result<ChatResponse, AdapterError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if let Some(status) = self.fail_with_status {
                    return Err(AdapterError::Http {
                        provider: "stub".to_string(),
                        status,
                        message: "upstream unavailable".to_string(),
                    });
                }
                Ok(ChatResponse {
                    content: "Hello, world".to_string(),
                    model: request.model.clone(),
                    usage: TokenUsage::new(5, 2, None),
                    finish_reason: FinishReason::Stop,
                })
            })
        }

        fn complete_stream<'a>(
            &'a self,
            _request: &'a ChatRequest,
            tx: mpsc::Sender<StreamEvent>,
        ) -> BoxFuture<'a, Result<(), AdapterError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                for piece in ["Hello, ", "world"] {
                    if tx.send(StreamEvent::Text(piece.to_string())).await.is_err() {
                        return Ok(());
                    }
                }
                let _ = tx.send(StreamEvent::Done).await;
                Ok(())
            })
        }
    }

    fn registry() -> Arc<ProviderRegistry> {
        let registry = ProviderRegistry::new(vec![
            ProviderSpec {
                id: "stub".to_string(),
                display_name: "Stub".to_string(),
                models: vec![
                    ModelSpec::new("stub-model", "Stub Model", "stub", 1024, 0.0),
                    ModelSpec::new("stub-batch", "Stub Batch", "stub", 1024, 0.0)
                        .without_streaming(),
                ],
                api_key_required: false,
            },
            ProviderSpec {
                id: "orphan".to_string(),
                display_name: "Orphan".to_string(),
                models: vec![ModelSpec::new("orphan-model", "Orphan", "orphan", 1024, 0.0)],
                api_key_required: true,
            },
        ])
        .expect("valid registry");
        Arc::new(registry)
    }

    fn dispatcher_with(stub: Arc<StubAdapter>) -> Dispatcher {
        let mut adapters = AdapterRegistry::default();
        adapters.register(stub);
        Dispatcher::new(registry(), Arc::new(adapters))
    }

    fn hello(model: &str) -> ChatRequest {
        ChatRequest::new(model, vec![ChatMessage::user("Hello")])
    }

    #[tokio::test]
    async fn empty_messages_are_rejected_before_the_adapter() {
        let stub = Arc::new(StubAdapter::default());
        let dispatcher = dispatcher_with(stub.clone());

        let error = dispatcher
            .dispatch(&ChatRequest::new("stub-model", vec![]))
            .await
            .expect_err("rejected");
        assert_eq!(error.kind, ErrorKind::MissingMessages);
        assert_eq!(error.provider, "");
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn blank_model_is_rejected() {
        let stub = Arc::new(StubAdapter::default());
        let dispatcher = dispatcher_with(stub.clone());

        let error = dispatcher.dispatch(&hello("  ")).await.expect_err("rejected");
        assert_eq!(error.kind, ErrorKind::MissingModel);
        assert!(!error.message.is_empty());
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn temperature_bounds_are_inclusive() {
        let stub = Arc::new(StubAdapter::default());
        let dispatcher = dispatcher_with(stub.clone());

        for bad in [-0.1, 2.1, f32::NAN] {
            let error = dispatcher
                .dispatch(&hello("stub-model").with_temperature(bad))
                .await
                .expect_err("rejected");
            assert_eq!(error.kind, ErrorKind::InvalidTemperature);
        }
        assert_eq!(stub.calls(), 0);

        for ok in [0.0, 2.0] {
            dispatcher
                .dispatch(&hello("stub-model").with_temperature(ok))
                .await
                .expect("accepted");
        }
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn rate_limit_rejects_the_sixty_first_call_until_the_window_slides() {
        let stub = Arc::new(StubAdapter::default());
        let clock = Arc::new(ManualClock::new());
        let dispatcher = dispatcher_with(stub.clone())
            .with_rate_limit(RateLimitConfig::default())
            .with_clock(clock.clone());

        dispatcher.dispatch(&hello("stub-model")).await.expect("first");
        clock.advance(Duration::from_secs(1));
        for _ in 0..59 {
            dispatcher.dispatch(&hello("stub-model")).await.expect("within limit");
        }

        let error = dispatcher
            .dispatch(&hello("stub-model"))
            .await
            .expect_err("limited");
        assert_eq!(error.kind, ErrorKind::RateLimitExceeded);
        assert!(error.retryable);
        assert_eq!(stub.calls(), 60);

        // other models are counted separately
        dispatcher.dispatch(&hello("stub-batch")).await.expect("other model");

        clock.advance(Duration::from_secs(59));
        dispatcher
            .dispatch(&hello("stub-model"))
            .await
            .expect("oldest attempt aged out");
        let error = dispatcher
            .dispatch(&hello("stub-model"))
            .await
            .expect_err("window full again");
        assert_eq!(error.kind, ErrorKind::RateLimitExceeded);
    }

    #[tokio::test]
    async fn streaming_calls_count_once_against_the_rate_limit() {
        let stub = Arc::new(StubAdapter::default());
        let clock = Arc::new(ManualClock::new());
        let dispatcher = dispatcher_with(stub.clone())
            .with_rate_limit(RateLimitConfig::default())
            .with_clock(clock.clone());
        let request = hello("stub-model").streaming();

        for _ in 0..60 {
            let (tx, mut rx) = mpsc::channel(4);
            dispatcher
                .dispatch_stream(&request, tx)
                .await
                .expect("within limit");
            // two text chunks then done, one slot
            let mut chunks = 0;
            while let Some(event) = rx.recv().await {
                if matches!(event, StreamEvent::Text(_)) {
                    chunks += 1;
                }
            }
            assert_eq!(chunks, 2);
        }
        assert_eq!(stub.calls(), 60);

        let (tx, _rx) = mpsc::channel(4);
        let error = dispatcher
            .dispatch_stream(&request, tx)
            .await
            .expect_err("limited");
        assert_eq!(error.kind, ErrorKind::RateLimitExceeded);
        assert!(error.retryable);
        assert_eq!(stub.calls(), 60);

        // batch and streaming calls share the same window
        let error = dispatcher
            .dispatch(&hello("stub-model"))
            .await
            .expect_err("limited");
        assert_eq!(error.kind, ErrorKind::RateLimitExceeded);

        clock.advance(Duration::from_secs(60));
        let (tx, _rx) = mpsc::channel(4);
        dispatcher
            .dispatch_stream(&request, tx)
            .await
            .expect("window slid");
        assert_eq!(stub.calls(), 61);
    }

    #[tokio::test]
    async fn unknown_model_is_not_delegated() {
        let stub = Arc::new(StubAdapter::default());
        let dispatcher = dispatcher_with(stub.clone());

        let error = dispatcher
            .dispatch(&hello("gpt-9"))
            .await
            .expect_err("unknown");
        assert_eq!(error.kind, ErrorKind::ModelNotFound);
        assert!(!error.retryable);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn model_without_adapter_is_provider_not_supported() {
        let dispatcher = dispatcher_with(Arc::new(StubAdapter::default()));

        let error = dispatcher
            .dispatch(&hello("orphan-model"))
            .await
            .expect_err("no adapter");
        assert_eq!(error.kind, ErrorKind::ProviderNotSupported);
        assert_eq!(error.provider, "orphan");
    }

    #[tokio::test]
    async fn response_is_returned_unchanged() {
        let dispatcher = dispatcher_with(Arc::new(StubAdapter::default()));

        let response = dispatcher
            .dispatch(&hello("stub-model"))
            .await
            .expect("dispatched");
        assert_eq!(response.content, "Hello, world");
        assert_eq!(response.model, "stub-model");
        assert_eq!(response.usage.total_tokens, 7);
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn adapter_failures_are_classified() {
        let stub = Arc::new(StubAdapter {
            fail_with_status: Some(503),
            ..StubAdapter::default()
        });
        let dispatcher = dispatcher_with(stub);

        let error = dispatcher
            .dispatch(&hello("stub-model"))
            .await
            .expect_err("upstream failure");
        assert_eq!(error.kind, ErrorKind::HttpError);
        assert_eq!(error.provider, "stub");
        assert_eq!(error.status, Some(503));
        assert!(error.retryable);
    }

    #[tokio::test]
    async fn streaming_delivers_text_then_done() {
        let dispatcher = dispatcher_with(Arc::new(StubAdapter::default()));
        let (tx, mut rx) = mpsc::channel(4);

        let request = hello("stub-model").streaming();
        let (result, events) = tokio::join!(dispatcher.dispatch_stream(&request, tx), async {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        });

        result.expect("streamed");
        let text = events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Text(text) => Some(text.as_str()),
                StreamEvent::Done => None,
            })
            .collect::<String>();
        assert_eq!(text, "Hello, world");
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[tokio::test]
    async fn streaming_is_refused_for_batch_only_models() {
        let stub = Arc::new(StubAdapter::default());
        let dispatcher = dispatcher_with(stub.clone());
        let (tx, _rx) = mpsc::channel(4);

        let error = dispatcher
            .dispatch_stream(&hello("stub-batch").streaming(), tx)
            .await
            .expect_err("not streamable");
        assert_eq!(error.kind, ErrorKind::StreamingNotSupported);
        assert_eq!(error.provider, "stub");
        assert_eq!(stub.calls(), 0);
    }
}
