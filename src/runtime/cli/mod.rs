use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::adapters::config::Settings;
use crate::adapters::credentials;
use crate::adapters::providers::{AdapterRegistry, ProviderRegistry};
use crate::core::dispatch::{Dispatcher, RateLimitConfig};
use crate::core::ports::credentials::CredentialStore;

pub mod commands;

pub type CliError = Box<dyn std::error::Error + Send + Sync>;

/// Turn an app idea into a product requirements document.
#[derive(Parser, Debug)]
#[command(name = "prdgen", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file. Defaults to $PRDGEN_CONFIG, then ~/.prdgen/config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a PRD from an app idea.
    Generate(commands::generate::Generate),
    /// Chat with a persona, optionally about a PRD.
    Chat(commands::chat::Chat),
    /// Manage provider API keys.
    Keys {
        #[command(subcommand)]
        action: commands::keys::KeysCommand,
    },
    /// List providers and models.
    Models(commands::models::Models),
}

/// Everything a command needs, built once per invocation.
pub struct AppContext {
    pub settings_path: PathBuf,
    pub settings: Settings,
    pub credentials: Arc<dyn CredentialStore>,
    pub registry: Arc<ProviderRegistry>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppContext {
    pub fn load(settings_path: PathBuf) -> Result<Self, CliError> {
        let settings = Settings::load_from(&settings_path);
        let credentials = credentials::store_for(&settings, &settings_path);
        Self::new(settings_path, settings, credentials)
    }

    pub fn new(
        settings_path: PathBuf,
        settings: Settings,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, CliError> {
        let registry = Arc::new(ProviderRegistry::default());
        let adapters = AdapterRegistry::from_settings(&settings, credentials.clone())
            .map_err(|e| format!("{e} (settings file: {})", settings_path.display()))?;
        let adapters = Arc::new(adapters);
        let dispatcher = Dispatcher::new(registry.clone(), adapters)
            .with_rate_limit(RateLimitConfig::per_minute(settings.rate_limit_per_minute()));

        Ok(Self {
            settings_path,
            settings,
            credentials,
            registry,
            dispatcher: Arc::new(dispatcher),
        })
    }
}

impl Cli {
    pub async fn run(self) -> Result<(), CliError> {
        let settings_path = self.config.unwrap_or_else(Settings::default_path);
        log::debug!("using settings at {}", settings_path.display());
        let ctx = AppContext::load(settings_path)?;

        match self.command {
            Command::Generate(generate) => generate.run(&ctx).await,
            Command::Chat(chat) => chat.run(&ctx).await,
            Command::Keys { action } => action.run(&ctx),
            Command::Models(models) => models.run(&ctx),
        }
    }
}
