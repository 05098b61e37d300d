use std::fmt;

use thiserror::Error;

/// What a store knows about the secret for one provider.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// A plain API key readable by this process.
    ApiKey(String),
    /// Configured on a remote proxy that injects the secret server-side.
    Managed,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credential::Managed => f.write_str("Managed"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("provider id is required")]
    EmptyProvider,
    #[error("failed to persist credentials: {0}")]
    Persist(String),
}

/// Provider id -> credential, last write wins.
///
/// Local-file backed stores keep keys in plain text; they are a convenience,
/// not a vault.
pub trait CredentialStore: Send + Sync {
    fn get(&self, provider_id: &str) -> Option<Credential>;
    fn set(&self, provider_id: &str, value: &str) -> Result<(), CredentialError>;
    fn remove(&self, provider_id: &str) -> Result<(), CredentialError>;

    fn is_configured(&self, provider_id: &str) -> bool {
        self.get(provider_id).is_some()
    }
}

pub fn normalize_provider_id(provider_id: &str) -> String {
    provider_id.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{normalize_provider_id, Credential};

    #[test]
    fn debug_output_never_contains_the_key() {
        let credential = Credential::ApiKey("sk-secret-value".to_string());
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("sk-secret-value"));
        assert_eq!(format!("{:?}", Credential::Managed), "Managed");
    }

    #[test]
    fn provider_ids_are_trimmed_and_lowercased() {
        assert_eq!(normalize_provider_id("  OpenAI "), "openai");
        assert_eq!(normalize_provider_id("Perplexity\t"), "perplexity");
    }
}
