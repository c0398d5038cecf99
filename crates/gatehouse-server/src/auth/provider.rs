//! Authentication provider registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use gatehouse_core::{AuthenticationProvider, FileAuthenticationProvider};

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Builds a provider from the server configuration.
pub type ProviderFactory =
    Box<dyn Fn(&ServerConfig) -> Result<Arc<dyn AuthenticationProvider>> + Send + Sync>;

/// Authentication providers available to configuration, keyed by identifier.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in providers.
    pub fn with_builtins() -> Self {
        Self::new().with_provider(FileAuthenticationProvider::NAME, open_file_provider)
    }

    /// Register a provider.
    pub fn with_provider<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ServerConfig) -> Result<Arc<dyn AuthenticationProvider>> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
        self
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }

    /// Create the provider named by the configuration.
    pub fn create(&self, config: &ServerConfig) -> Result<Arc<dyn AuthenticationProvider>> {
        let factory = self.factories.get(&config.auth_provider).ok_or_else(|| {
            Error::Config(format!(
                "unknown authentication provider \"{}\" (available: {})",
                config.auth_provider,
                self.identifiers().join(", ")
            ))
        })?;

        factory(config)
    }
}

fn open_file_provider(config: &ServerConfig) -> Result<Arc<dyn AuthenticationProvider>> {
    let path = config.user_mapping.as_ref().ok_or_else(|| {
        Error::Config("missing user mapping path (--user-mapping or GATEHOUSE_USER_MAPPING)".into())
    })?;

    tracing::info!(path = %path.display(), "using user mapping file");
    let provider = FileAuthenticationProvider::open(path)?;
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider() {
        let config = ServerConfig::new().with_auth_provider("ldap");
        let err = ProviderRegistry::with_builtins().create(&config).err().unwrap();

        assert!(matches!(err, Error::Config(ref msg) if msg.contains("ldap")));
    }

    #[test]
    fn test_basic_file_requires_path() {
        let err = ProviderRegistry::with_builtins()
            .create(&ServerConfig::new())
            .err()
            .unwrap();

        assert!(matches!(err, Error::Config(ref msg) if msg.contains("user mapping")));
    }

    #[test]
    fn test_basic_file_with_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new().with_user_mapping(dir.path().join("absent.xml"));

        let provider = ProviderRegistry::with_builtins().create(&config).unwrap();
        assert_eq!(provider.name(), "basic-file");
    }

    #[test]
    fn test_basic_file_with_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-mapping.xml");
        std::fs::write(&path, "<user-mapping><authorize/></user-mapping>").unwrap();

        let err = ProviderRegistry::with_builtins()
            .create(&ServerConfig::new().with_user_mapping(&path))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Provider(_)));
    }
}
