use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::adapters::config::{CredentialMode, Settings};
use crate::core::ports::credentials::{
    normalize_provider_id, Credential, CredentialError, CredentialStore,
};

fn require_provider(provider_id: &str) -> Result<String, CredentialError> {
    let provider = normalize_provider_id(provider_id);
    if provider.is_empty() {
        return Err(CredentialError::EmptyProvider);
    }
    Ok(provider)
}

/// Picks the store matching the configured credential mode.
pub fn store_for(settings: &Settings, path: &Path) -> Arc<dyn CredentialStore> {
    match settings.credential_mode {
        CredentialMode::Local => Arc::new(SettingsCredentialStore::new(path, settings.clone())),
        CredentialMode::Proxy => Arc::new(ProxyCredentialStore::persisted(
            path,
            settings.proxy_providers.iter().map(String::as_str),
        )),
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    keys: RwLock<HashMap<String, String>>,
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, provider_id: &str) -> Option<Credential> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.get(&normalize_provider_id(provider_id))
            .cloned()
            .map(Credential::ApiKey)
    }

    fn set(&self, provider_id: &str, value: &str) -> Result<(), CredentialError> {
        let provider = require_provider(provider_id)?;
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        let value = value.trim();
        if value.is_empty() {
            keys.remove(&provider);
        } else {
            keys.insert(provider, value.to_string());
        }
        Ok(())
    }

    fn remove(&self, provider_id: &str) -> Result<(), CredentialError> {
        let provider = require_provider(provider_id)?;
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&provider);
        Ok(())
    }
}

/// Keys stored in the `[api_keys]` table of the settings file, with
/// `<PROVIDER>_API_KEY` environment variables as a read fallback.
pub struct SettingsCredentialStore {
    path: PathBuf,
    settings: RwLock<Settings>,
}

impl SettingsCredentialStore {
    pub fn new(path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            path: path.into(),
            settings: RwLock::new(settings),
        }
    }

    fn update<F>(&self, apply: F) -> Result<(), CredentialError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = settings.clone();
        apply(&mut next);
        next.save_to(&self.path)
            .map_err(|e| CredentialError::Persist(e.to_string()))?;
        *settings = next;
        Ok(())
    }
}

impl CredentialStore for SettingsCredentialStore {
    fn get(&self, provider_id: &str) -> Option<Credential> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .api_key_for_provider(provider_id)
            .map(Credential::ApiKey)
    }

    fn set(&self, provider_id: &str, value: &str) -> Result<(), CredentialError> {
        let provider = require_provider(provider_id)?;
        self.update(|settings| settings.set_api_key(&provider, value))
    }

    fn remove(&self, provider_id: &str) -> Result<(), CredentialError> {
        let provider = require_provider(provider_id)?;
        self.update(|settings| settings.remove_api_key(&provider))
    }
}

/// Proxy mode: the secrets live on the proxy, this process only tracks
/// which providers have one.
#[derive(Debug, Default)]
pub struct ProxyCredentialStore {
    configured: RwLock<BTreeSet<String>>,
    persist_to: Option<PathBuf>,
}

impl ProxyCredentialStore {
    pub fn new<'a>(providers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            configured: RwLock::new(
                providers
                    .into_iter()
                    .map(normalize_provider_id)
                    .filter(|p| !p.is_empty())
                    .collect(),
            ),
            persist_to: None,
        }
    }

    /// Like `new`, but flag changes are written back to `proxy_providers`
    /// in the settings file at `path`.
    pub fn persisted<'a>(
        path: impl Into<PathBuf>,
        providers: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            persist_to: Some(path.into()),
            ..Self::new(providers)
        }
    }

    fn toggle(&self, provider: String, configured: bool) -> Result<(), CredentialError> {
        let mut flags = self
            .configured
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(path) = &self.persist_to {
            let mut settings = Settings::load_from(path);
            settings.set_proxy_provider(&provider, configured);
            settings
                .save_to(path)
                .map_err(|e| CredentialError::Persist(e.to_string()))?;
        }

        if configured {
            flags.insert(provider);
        } else {
            flags.remove(&provider);
        }
        Ok(())
    }
}

impl CredentialStore for ProxyCredentialStore {
    fn get(&self, provider_id: &str) -> Option<Credential> {
        self.configured
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&normalize_provider_id(provider_id))
            .then_some(Credential::Managed)
    }

    fn set(&self, provider_id: &str, value: &str) -> Result<(), CredentialError> {
        let provider = require_provider(provider_id)?;
        self.toggle(provider, !value.trim().is_empty())
    }

    fn remove(&self, provider_id: &str) -> Result<(), CredentialError> {
        let provider = require_provider(provider_id)?;
        self.toggle(provider, false)
    }
}
