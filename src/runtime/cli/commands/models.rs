use clap::Args;

use crate::core::ports::credentials::normalize_provider_id;
use crate::runtime::cli::{AppContext, CliError};

/// List providers and their models.
#[derive(Args, Debug)]
pub struct Models {
    /// Only show this provider.
    #[arg(long)]
    pub provider: Option<String>,
}

impl Models {
    pub fn run(self, ctx: &AppContext) -> Result<(), CliError> {
        for line in self.lines(ctx)? {
            println!("{line}");
        }
        Ok(())
    }

    fn lines(&self, ctx: &AppContext) -> Result<Vec<String>, CliError> {
        let filter = self.provider.as_deref().map(normalize_provider_id);
        if let Some(id) = filter.as_deref() {
            if ctx.registry.find_provider(id).is_none() {
                return Err(format!("Unknown provider '{id}'").into());
            }
        }

        let mut lines = Vec::new();
        for provider in ctx.registry.list_providers() {
            if filter.as_deref().is_some_and(|id| id != provider.id) {
                continue;
            }
            let key = if ctx.credentials.is_configured(&provider.id) {
                "key configured"
            } else {
                "no key"
            };
            lines.push(format!("{} ({}, {key})", provider.display_name, provider.id));
            for model in &provider.models {
                lines.push(format!(
                    "  {:<28} max_tokens={:<6} ${}/1k{}",
                    model.id,
                    model.max_tokens,
                    model.cost_per_1k_tokens,
                    if model.supports_streaming { "" } else { "  (no streaming)" }
                ));
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::Models;
    use crate::adapters::config::Settings;
    use crate::adapters::credentials::MemoryCredentialStore;
    use crate::core::ports::credentials::CredentialStore;
    use crate::runtime::cli::AppContext;
    use std::sync::Arc;

    #[test]
    fn lists_catalog_with_key_status() {
        let store = MemoryCredentialStore::default();
        store.set("anthropic", "sk-ant").expect("set");
        let ctx = AppContext::new(
            std::env::temp_dir().join("prdgen-models-unused.toml"),
            Settings::default(),
            Arc::new(store),
        )
        .expect("context");

        let lines = Models { provider: None }.lines(&ctx).expect("lines");
        assert_eq!(lines[0], "OpenAI (openai, no key)");
        assert!(lines[1].trim_start().starts_with("gpt-4o "));
        assert!(lines.contains(&"Anthropic (anthropic, key configured)".to_string()));
        assert_eq!(lines.len(), 3 + 7);

        let only = Models {
            provider: Some("Perplexity".to_string()),
        }
        .lines(&ctx)
        .expect("filtered");
        assert_eq!(only.len(), 3);

        assert!(Models {
            provider: Some("google".to_string()),
        }
        .lines(&ctx)
        .is_err());
    }
}
