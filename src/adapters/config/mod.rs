use crate::core::ports::credentials::normalize_provider_id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Bump this when adding new fields with non-trivial defaults.
/// When a loaded config has a lower version, it is re-saved to disk
/// so that users see the new keys in their `config.toml`.
const CURRENT_CONFIG_VERSION: u32 = 1;

pub const CONFIG_PATH_ENV: &str = "PRDGEN_CONFIG";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RATE_LIMIT_PER_MINUTE: usize = 60;

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_rate_limit_per_minute() -> usize {
    DEFAULT_RATE_LIMIT_PER_MINUTE
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Where provider secrets live.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// Keys are kept in this file (or the environment) and sent by the adapters.
    #[default]
    Local,
    /// Requests go through a proxy that injects the secrets server-side.
    Proxy,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub config_version: u32,
    pub default_model: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: usize,
    pub credential_mode: CredentialMode,
    pub proxy_base_url: Option<String>,
    pub proxy_providers: Vec<String>,
    pub api_keys: HashMap<String, String>,
    /// Provider id -> full endpoint URL override.
    pub base_urls: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_version: 0,
            default_model: None,
            request_timeout_secs: default_request_timeout_secs(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            credential_mode: CredentialMode::Local,
            proxy_base_url: None,
            proxy_providers: Vec::new(),
            api_keys: HashMap::new(),
            base_urls: HashMap::new(),
        }
    }
}

impl Settings {
    fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".prdgen")
    }

    /// `$PRDGEN_CONFIG` when set, else `~/.prdgen/config.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::global_config_dir().join("config.toml"))
    }

    pub fn load_global() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Loads settings, falling back to defaults when the file is missing or
    /// unreadable. Older files are migrated and re-saved in place.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self {
                config_version: CURRENT_CONFIG_VERSION,
                ..Self::default()
            };
        }

        let mut settings = match Self::read(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("[config] {e}. Using defaults.");
                return Self {
                    config_version: CURRENT_CONFIG_VERSION,
                    ..Self::default()
                };
            }
        };

        if settings.config_version < CURRENT_CONFIG_VERSION {
            settings.config_version = CURRENT_CONFIG_VERSION;
            if let Err(e) = settings.save_to(path) {
                log::warn!("[config] Failed to migrate config to v{CURRENT_CONFIG_VERSION}: {e}");
            }
        }

        settings
    }

    pub fn read(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_error = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_error)
    }

    /// Stores a key; a blank key removes the entry.
    pub fn set_api_key(&mut self, provider: &str, key: &str) {
        let provider = normalize_provider_id(provider);
        if provider.is_empty() {
            return;
        }
        let key = key.trim();
        if key.is_empty() {
            self.api_keys.remove(&provider);
        } else {
            self.api_keys.insert(provider, key.to_string());
        }
    }

    pub fn remove_api_key(&mut self, provider: &str) {
        self.api_keys.remove(&normalize_provider_id(provider));
    }

    pub fn stored_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys
            .get(&normalize_provider_id(provider))
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned)
    }

    /// The stored key, else `<PROVIDER>_API_KEY` from the environment.
    pub fn api_key_for_provider(&self, provider: &str) -> Option<String> {
        self.api_key_with_env(provider, |name| std::env::var(name).ok())
    }

    pub(crate) fn api_key_with_env<F>(&self, provider: &str, env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.stored_api_key(provider).or_else(|| {
            env(&api_key_env_var(provider))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
    }

    /// Resolves the URL a provider's adapter should post to.
    ///
    /// Proxy mode only ever targets the proxy, so it yields `None` when no
    /// `proxy_base_url` is configured.
    pub fn endpoint_for(&self, provider: &str, default_endpoint: &str) -> Option<String> {
        let provider = normalize_provider_id(provider);
        if self.credential_mode == CredentialMode::Proxy {
            return self
                .proxy_base_url()
                .map(|base| format!("{base}/{provider}"));
        }
        Some(
            self.base_urls
                .get(&provider)
                .map(|url| url.trim())
                .filter(|url| !url.is_empty())
                .unwrap_or(default_endpoint)
                .to_string(),
        )
    }

    pub fn proxy_base_url(&self) -> Option<&str> {
        self.proxy_base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    pub fn set_proxy_provider(&mut self, provider: &str, configured: bool) {
        let provider = normalize_provider_id(provider);
        if provider.is_empty() {
            return;
        }
        self.proxy_providers.retain(|p| normalize_provider_id(p) != provider);
        if configured {
            self.proxy_providers.push(provider);
            self.proxy_providers.sort();
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn rate_limit_per_minute(&self) -> usize {
        self.rate_limit_per_minute.max(1)
    }

    pub fn default_model(&self) -> Option<&str> {
        self.default_model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
    }
}

pub fn api_key_env_var(provider: &str) -> String {
    format!(
        "{}_API_KEY",
        normalize_provider_id(provider).replace('-', "_").to_ascii_uppercase()
    )
}
