use clap::Subcommand;

use crate::adapters::config::CredentialMode;
use crate::core::ports::credentials::{normalize_provider_id, Credential};
use crate::runtime::cli::{AppContext, CliError};

use super::shared::{ensure_valid_provider_id, mask_key};

/// API key management subcommands.
#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// Show which providers have a key.
    List,
    /// Store a key for a provider.
    Set {
        /// Provider id, e.g. openai.
        provider: String,
        /// The API key. In proxy mode any non-empty value marks the provider as configured.
        key: String,
    },
    /// Forget the key for a provider.
    Remove {
        /// Provider id.
        provider: String,
    },
}

impl KeysCommand {
    pub fn run(self, ctx: &AppContext) -> Result<(), CliError> {
        match self {
            KeysCommand::List => {
                for line in list_lines(ctx) {
                    println!("{line}");
                }
                Ok(())
            }
            KeysCommand::Set { provider, key } => {
                let provider = known_provider(ctx, &provider)?;
                if key.trim().is_empty() {
                    return Err("key is required; use `prdgen keys remove` to clear it".into());
                }
                ctx.credentials.set(&provider, &key)?;
                println!("Saved key for {provider}.");
                Ok(())
            }
            KeysCommand::Remove { provider } => {
                let provider = known_provider(ctx, &provider)?;
                ctx.credentials.remove(&provider)?;
                println!("Removed key for {provider}.");
                Ok(())
            }
        }
    }
}

fn known_provider(ctx: &AppContext, provider: &str) -> Result<String, CliError> {
    let provider = normalize_provider_id(provider);
    ensure_valid_provider_id(&provider)?;
    if ctx.registry.find_provider(&provider).is_none() {
        let known = ctx
            .registry
            .list_providers()
            .iter()
            .map(|p| p.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(format!("Unknown provider '{provider}'. Known providers: {known}").into());
    }
    Ok(provider)
}

fn list_lines(ctx: &AppContext) -> Vec<String> {
    let mut lines = Vec::new();
    if ctx.settings.credential_mode == CredentialMode::Proxy {
        lines.push("Credential mode: proxy (keys are held by the proxy)".to_string());
    }
    for provider in ctx.registry.list_providers() {
        let status = match ctx.credentials.get(&provider.id) {
            Some(Credential::ApiKey(key)) => mask_key(&key),
            Some(Credential::Managed) => "configured".to_string(),
            None if provider.api_key_required => "not set".to_string(),
            None => "not required".to_string(),
        };
        lines.push(format!("{:<12} {status}", provider.id));
    }
    lines.push(format!("Settings file: {}", ctx.settings_path.display()));
    lines
}
