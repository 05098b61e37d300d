use crate::adapters::config::Settings;
use crate::adapters::llm::providers::anthropic::{AnthropicAdapter, ANTHROPIC_ENDPOINT};
use crate::adapters::llm::providers::openai::{
    OpenAiCompatibleAdapter, OPENAI_ENDPOINT, PERPLEXITY_ENDPOINT,
};
use crate::core::ports::credentials::CredentialStore;
use crate::core::ports::llm::ProviderAdapter;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelSpec {
    pub id: String,
    pub display_name: String,
    pub provider: String,
    pub max_tokens: u32,
    pub cost_per_1k_tokens: f64,
    pub supports_streaming: bool,
}

impl ModelSpec {
    pub fn new(
        id: &str,
        display_name: &str,
        provider: &str,
        max_tokens: u32,
        cost_per_1k_tokens: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            provider: provider.to_string(),
            max_tokens,
            cost_per_1k_tokens,
            supports_streaming: true,
        }
    }

    pub fn without_streaming(mut self) -> Self {
        self.supports_streaming = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProviderSpec {
    pub id: String,
    pub display_name: String,
    pub models: Vec<ModelSpec>,
    pub api_key_required: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("provider '{0}' is registered twice")]
    DuplicateProvider(String),
    #[error("model '{model}' is listed by both '{first}' and '{second}'")]
    DuplicateModel {
        model: String,
        first: String,
        second: String,
    },
    #[error("model '{model}' is listed under '{listed_under}' but names provider '{declared}'")]
    ProviderMismatch {
        model: String,
        listed_under: String,
        declared: String,
    },
}

/// Immutable catalog of providers and their models, in insertion order.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderSpec>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            providers: builtin_providers(),
        }
    }
}

impl ProviderRegistry {
    pub fn new(providers: Vec<ProviderSpec>) -> Result<Self, RegistryError> {
        let mut provider_ids = HashSet::new();
        let mut model_owners: HashMap<&str, &str> = HashMap::new();

        for provider in &providers {
            if !provider_ids.insert(provider.id.as_str()) {
                return Err(RegistryError::DuplicateProvider(provider.id.clone()));
            }
            for model in &provider.models {
                if model.provider != provider.id {
                    return Err(RegistryError::ProviderMismatch {
                        model: model.id.clone(),
                        listed_under: provider.id.clone(),
                        declared: model.provider.clone(),
                    });
                }
                if let Some(first) = model_owners.insert(model.id.as_str(), provider.id.as_str()) {
                    return Err(RegistryError::DuplicateModel {
                        model: model.id.clone(),
                        first: first.to_string(),
                        second: provider.id.clone(),
                    });
                }
            }
        }

        Ok(Self { providers })
    }

    pub fn list_providers(&self) -> &[ProviderSpec] {
        &self.providers
    }

    pub fn find_provider(&self, provider_id: &str) -> Option<&ProviderSpec> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    pub fn find_model(&self, model_id: &str) -> Option<&ModelSpec> {
        self.providers
            .iter()
            .flat_map(|p| p.models.iter())
            .find(|m| m.id == model_id)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelSpec> {
        self.providers.iter().flat_map(|p| p.models.iter())
    }
}

pub fn builtin_providers() -> Vec<ProviderSpec> {
    vec![
        ProviderSpec {
            id: "openai".to_string(),
            display_name: "OpenAI".to_string(),
            models: vec![
                ModelSpec::new("gpt-4o", "GPT-4o", "openai", 4096, 0.03),
                ModelSpec::new("gpt-4o-mini", "GPT-4o Mini", "openai", 16384, 0.00015),
                ModelSpec::new("gpt-3.5-turbo", "GPT-3.5 Turbo", "openai", 4096, 0.002),
            ],
            api_key_required: true,
        },
        ProviderSpec {
            id: "anthropic".to_string(),
            display_name: "Anthropic".to_string(),
            models: vec![
                ModelSpec::new(
                    "claude-3-5-sonnet-20241022",
                    "Claude 3.5 Sonnet",
                    "anthropic",
                    8192,
                    0.003,
                ),
                ModelSpec::new(
                    "claude-3-5-haiku-20241022",
                    "Claude 3.5 Haiku",
                    "anthropic",
                    8192,
                    0.001,
                ),
            ],
            api_key_required: true,
        },
        ProviderSpec {
            id: "perplexity".to_string(),
            display_name: "Perplexity".to_string(),
            models: vec![
                ModelSpec::new("sonar", "Sonar", "perplexity", 4096, 0.001),
                ModelSpec::new("sonar-pro", "Sonar Pro", "perplexity", 8192, 0.003),
            ],
            api_key_required: true,
        },
    ]
}

#[derive(Debug, Error)]
pub enum AdapterSetupError {
    #[error("credential_mode is \"proxy\" but proxy_base_url is not set")]
    MissingProxyBaseUrl,
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Provider id -> adapter, populated once at startup.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.id().to_string(), adapter);
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider_id).cloned()
    }

    /// Built-in adapters with endpoints, proxy routing and timeout taken from settings.
    pub fn from_settings(
        settings: &Settings,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, AdapterSetupError> {
        let endpoint = |provider: &str, default: &str| {
            settings
                .endpoint_for(provider, default)
                .ok_or(AdapterSetupError::MissingProxyBaseUrl)
        };
        let openai = endpoint("openai", OPENAI_ENDPOINT)?;
        let anthropic = endpoint(AnthropicAdapter::ID, ANTHROPIC_ENDPOINT)?;
        let perplexity = endpoint("perplexity", PERPLEXITY_ENDPOINT)?;

        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        let mut registry = Self::default();
        registry.register(Arc::new(OpenAiCompatibleAdapter::new(
            "openai",
            openai,
            client.clone(),
            credentials.clone(),
        )));
        registry.register(Arc::new(AnthropicAdapter::new(
            anthropic,
            client.clone(),
            credentials.clone(),
        )));
        registry.register(Arc::new(OpenAiCompatibleAdapter::new(
            "perplexity",
            perplexity,
            client,
            credentials,
        )));

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AdapterRegistry, AdapterSetupError, ModelSpec, ProviderRegistry, ProviderSpec,
        RegistryError,
    };
    use crate::adapters::config::{CredentialMode, Settings};
    use crate::adapters::credentials::{MemoryCredentialStore, ProxyCredentialStore};
    use crate::adapters::llm::{AdapterError, ChatMessage, ChatRequest};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn provider(id: &str, models: Vec<ModelSpec>) -> ProviderSpec {
        ProviderSpec {
            id: id.to_string(),
            display_name: id.to_string(),
            models,
            api_key_required: true,
        }
    }

    #[test]
    fn builtin_catalog_keeps_insertion_order() {
        let registry = ProviderRegistry::default();
        let ids = registry
            .list_providers()
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["openai", "anthropic", "perplexity"]);
        assert!(ProviderRegistry::new(super::builtin_providers()).is_ok());
    }

    #[test]
    fn found_models_belong_to_a_listed_provider() {
        let registry = ProviderRegistry::default();
        for model in registry.models() {
            let found = registry.find_model(&model.id).expect("model is findable");
            assert!(registry
                .list_providers()
                .iter()
                .any(|p| p.id == found.provider));
        }
        assert_eq!(
            registry.find_model("gpt-4o-mini").map(|m| m.max_tokens),
            Some(16384)
        );
        assert!(registry.find_model("gpt-5").is_none());
        assert!(registry.find_provider("anthropic").is_some());
        assert!(registry.find_provider("google").is_none());
    }

    #[test]
    fn duplicate_model_ids_are_rejected() {
        let result = ProviderRegistry::new(vec![
            provider("a", vec![ModelSpec::new("shared", "Shared", "a", 10, 0.0)]),
            provider("b", vec![ModelSpec::new("shared", "Shared", "b", 10, 0.0)]),
        ]);
        assert_eq!(
            result.err(),
            Some(RegistryError::DuplicateModel {
                model: "shared".to_string(),
                first: "a".to_string(),
                second: "b".to_string(),
            })
        );
    }

    #[test]
    fn mismatched_model_provider_is_rejected() {
        let result = ProviderRegistry::new(vec![provider(
            "a",
            vec![ModelSpec::new("m", "M", "b", 10, 0.0)],
        )]);
        assert!(matches!(
            result,
            Err(RegistryError::ProviderMismatch { .. })
        ));

        let duplicate = ProviderRegistry::new(vec![provider("a", vec![]), provider("a", vec![])]);
        assert!(matches!(
            duplicate,
            Err(RegistryError::DuplicateProvider(id)) if id == "a"
        ));
    }

    #[test]
    fn builtin_adapters_cover_every_catalog_provider() {
        let adapters = AdapterRegistry::from_settings(
            &Settings::default(),
            Arc::new(MemoryCredentialStore::default()),
        )
        .expect("adapters build");
        for provider in ProviderRegistry::default().list_providers() {
            let adapter = adapters.get(&provider.id).expect("adapter registered");
            assert_eq!(adapter.id(), provider.id);
        }
        assert!(adapters.get("google").is_none());
    }

    #[test]
    fn proxy_mode_requires_a_base_url() {
        let settings = Settings {
            credential_mode: CredentialMode::Proxy,
            proxy_base_url: None,
            ..Settings::default()
        };
        let result =
            AdapterRegistry::from_settings(&settings, Arc::new(ProxyCredentialStore::new(["openai"])));
        assert!(matches!(result, Err(AdapterSetupError::MissingProxyBaseUrl)));
    }

    #[tokio::test]
    async fn proxy_mode_posts_to_proxy_without_a_secret() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/llm/openai")
                    .json_body_partial(r#"{"model":"gpt-4o-mini"}"#);
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content": "proxied"}, "finish_reason": "stop"}]
                }));
            })
            .await;

        let settings = Settings {
            credential_mode: CredentialMode::Proxy,
            proxy_base_url: Some(server.url("/llm/")),
            ..Settings::default()
        };
        let adapters =
            AdapterRegistry::from_settings(&settings, Arc::new(ProxyCredentialStore::new(["openai"])))
                .expect("client builds");
        let adapter = adapters.get("openai").expect("openai adapter");

        let request = ChatRequest::new("gpt-4o-mini", vec![ChatMessage::user("Hi")]);
        let response = adapter.complete(&request).await.expect("complete");

        mock.assert_async().await;
        assert_eq!(response.content, "proxied");

        let unconfigured = adapters.get("anthropic").expect("anthropic adapter");
        let error = unconfigured
            .complete(&request)
            .await
            .expect_err("no managed key");
        assert!(matches!(error, AdapterError::MissingCredential { .. }));
    }
}
