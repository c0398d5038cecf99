//! Authentication providers.
//!
//! A provider turns submitted [`Credentials`] into the set of connections
//! the user may access. [`FileAuthenticationProvider`] backs this with a
//! [`MappingStore`] over a user mapping file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::credential::Credentials;
use crate::error::{ProviderError, StoreError};
use crate::mapping::ConnectionMap;
use crate::store::MappingStore;

/// Result of a successful authorization.
#[derive(Debug, Clone)]
pub struct AuthorizedContext {
    /// The authenticated username.
    pub username: String,
    /// Connections the user may access, keyed by name.
    pub configurations: ConnectionMap,
    /// When authorization was granted.
    pub authorized_at: SystemTime,
}

impl AuthorizedContext {
    pub fn new(username: impl Into<String>, configurations: ConnectionMap) -> Self {
        Self {
            username: username.into(),
            configurations,
            authorized_at: SystemTime::now(),
        }
    }

    /// Connection names in sorted order.
    pub fn connection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.configurations.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Trait for authentication providers.
pub trait AuthenticationProvider: Send + Sync {
    /// Identifier of this provider, used in log output.
    fn name(&self) -> &str;

    /// Check credentials. A rejection says why the credentials were not
    /// accepted, so callers can log the cause.
    fn check(&self, credentials: &Credentials) -> Result<Verdict, ProviderError>;

    /// The connections authorized for the given credentials, or `None` if
    /// the credentials are not accepted.
    fn authorized_configurations(
        &self,
        credentials: &Credentials,
    ) -> Result<Option<ConnectionMap>, ProviderError> {
        Ok(self.check(credentials)?.into_configurations())
    }
}

/// Outcome of checking credentials against a user mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Credentials accepted.
    Authorized(ConnectionMap),
    /// No entry exists for the username.
    UnknownUser,
    /// The entry exists but the password does not match.
    PasswordMismatch,
    /// Username or password was not supplied.
    MissingCredentials,
}

impl Verdict {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Verdict::Authorized(_))
    }

    /// The authorized connections, if the credentials were accepted.
    pub fn into_configurations(self) -> Option<ConnectionMap> {
        match self {
            Verdict::Authorized(configurations) => Some(configurations),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Authorized(_) => write!(f, "authorized"),
            Verdict::UnknownUser => write!(f, "unknown user"),
            Verdict::PasswordMismatch => write!(f, "password mismatch"),
            Verdict::MissingCredentials => write!(f, "missing credentials"),
        }
    }
}

/// Provider backed by a user mapping file.
#[derive(Debug, Clone)]
pub struct FileAuthenticationProvider {
    store: Arc<MappingStore>,
}

impl FileAuthenticationProvider {
    /// Identifier under which this provider is registered.
    pub const NAME: &'static str = "basic-file";

    /// Create a provider over an existing store.
    pub fn new(store: Arc<MappingStore>) -> Self {
        Self { store }
    }

    /// Open the mapping file at `path` and load it.
    ///
    /// A missing file is tolerated: the provider denies everyone until the
    /// file appears. A file that exists but does not parse is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProviderError> {
        let store = Arc::new(MappingStore::open(path));

        match store.mapping() {
            Ok(mapping) => {
                tracing::debug!(users = mapping.len(), "initial user mapping loaded");
            }
            Err(StoreError::Unavailable(source)) => {
                tracing::warn!(
                    source = %source,
                    "user mapping not found, all logins will be denied until it exists"
                );
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self { store })
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<MappingStore> {
        &self.store
    }
}

impl AuthenticationProvider for FileAuthenticationProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, credentials: &Credentials) -> Result<Verdict, ProviderError> {
        let (Some(username), Some(password)) = (
            credentials.username.as_deref(),
            credentials.password.as_deref(),
        ) else {
            return Ok(Verdict::MissingCredentials);
        };

        let Some(entry) = self.store.lookup(username)? else {
            return Ok(Verdict::UnknownUser);
        };

        if !entry.validate(Some(username), Some(password)) {
            return Ok(Verdict::PasswordMismatch);
        }

        Ok(Verdict::Authorized(entry.connections().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const MAPPING: &str = r#"<user-mapping>
        <authorize username="alice" password="5ebe2294ecd0e0f08eab7690d2a6ee69" encoding="md5">
            <connection name="vm1">
                <protocol>rdp</protocol>
                <param name="hostname">10.0.0.5</param>
            </connection>
        </authorize>
    </user-mapping>"#;

    fn provider() -> FileAuthenticationProvider {
        let source = MemorySource::new("memory").with_document(MAPPING, SystemTime::UNIX_EPOCH);
        FileAuthenticationProvider::new(Arc::new(MappingStore::new(Arc::new(source))))
    }

    fn credentials(username: &str, password: &str) -> Credentials {
        Credentials::new()
            .with_username(username)
            .with_password(password)
    }

    #[test]
    fn test_check_verdicts() {
        let provider = provider();

        assert!(provider
            .check(&credentials("alice", "secret"))
            .unwrap()
            .is_authorized());
        assert_eq!(
            provider.check(&credentials("alice", "wrong")).unwrap(),
            Verdict::PasswordMismatch
        );
        assert_eq!(
            provider.check(&credentials("bob", "anything")).unwrap(),
            Verdict::UnknownUser
        );
        assert_eq!(
            provider
                .check(&Credentials::new().with_username("alice"))
                .unwrap(),
            Verdict::MissingCredentials
        );
    }

    #[test]
    fn test_authorized_configurations() {
        let provider = provider();

        let configurations = provider
            .authorized_configurations(&credentials("alice", "secret"))
            .unwrap()
            .unwrap();
        let context = AuthorizedContext::new("alice", configurations);
        assert_eq!(context.connection_names(), vec!["vm1"]);

        let vm1 = &context.configurations["vm1"];
        assert_eq!(vm1.protocol(), Some("rdp"));
        assert_eq!(vm1.parameter("hostname"), Some("10.0.0.5"));

        assert!(provider
            .authorized_configurations(&credentials("alice", "wrong"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::UnknownUser.to_string(), "unknown user");
        assert_eq!(Verdict::PasswordMismatch.to_string(), "password mismatch");
        assert_eq!(Verdict::MissingCredentials.to_string(), "missing credentials");
    }

    #[test]
    fn test_unavailable_store_is_an_error() {
        let store = MappingStore::new(Arc::new(MemorySource::new("empty")));
        let provider = FileAuthenticationProvider::new(Arc::new(store));

        let err = provider
            .authorized_configurations(&credentials("alice", "secret"))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Store(StoreError::Unavailable(_))));
    }
}
