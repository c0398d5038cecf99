//! User mapping data model.

use std::collections::HashMap;
use std::sync::Arc;

/// Name of the connection that collects `protocol`/`param` elements declared
/// directly under an `authorize` element.
pub const DEFAULT_CONNECTION: &str = "DEFAULT";

/// Connections authorized for a user, keyed by connection name.
pub type ConnectionMap = HashMap<String, ConnectionConfig>;

/// Encoding of a stored password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PasswordEncoding {
    /// Password stored verbatim.
    #[default]
    Plain,
    /// Password stored as the hex MD5 digest of its bytes.
    Md5,
}

impl PasswordEncoding {
    /// Parse the value of an `encoding` attribute.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plain" => Some(PasswordEncoding::Plain),
            "md5" => Some(PasswordEncoding::Md5),
            _ => None,
        }
    }
}

impl std::fmt::Display for PasswordEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordEncoding::Plain => write!(f, "plain"),
            PasswordEncoding::Md5 => write!(f, "md5"),
        }
    }
}

/// Protocol and parameters of a single connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    protocol: Option<String>,
    parameters: HashMap<String, String>,
}

impl ConnectionConfig {
    /// Create an empty connection configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the protocol.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// The protocol, if one was declared.
    ///
    /// Named connections always carry a protocol; the default connection
    /// may consist of parameters only.
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// Get a parameter value by name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(|v| v.as_str())
    }

    /// All parameters.
    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub(crate) fn set_protocol(&mut self, protocol: String) {
        self.protocol = Some(protocol);
    }

    pub(crate) fn set_parameter(&mut self, name: String, value: String) {
        self.parameters.insert(name, value);
    }
}

/// A single `authorize` entry: one user's credentials and connections.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthEntry {
    username: String,
    password: String,
    encoding: PasswordEncoding,
    connections: ConnectionMap,
}

impl AuthEntry {
    /// Create an entry with no connections.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        encoding: PasswordEncoding,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            encoding,
            connections: HashMap::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The stored password, encoded per [`AuthEntry::encoding`].
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn encoding(&self) -> PasswordEncoding {
        self.encoding
    }

    /// All connections authorized for this user.
    pub fn connections(&self) -> &ConnectionMap {
        &self.connections
    }

    /// Get a connection by name.
    pub fn connection(&self, name: &str) -> Option<&ConnectionConfig> {
        self.connections.get(name)
    }

    /// Validate submitted credentials against this entry.
    pub fn validate(&self, username: Option<&str>, password: Option<&str>) -> bool {
        crate::credential::validate(self, username, password)
    }

    pub(crate) fn connections_mut(&mut self) -> &mut ConnectionMap {
        &mut self.connections
    }
}

impl std::fmt::Debug for AuthEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEntry")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("encoding", &self.encoding)
            .field("connections", &self.connections)
            .finish()
    }
}

/// Immutable index of authorize entries keyed by username.
#[derive(Debug, Clone, Default)]
pub struct UserMapping {
    entries: HashMap<String, Arc<AuthEntry>>,
}

impl UserMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for a username.
    pub fn get(&self, username: &str) -> Option<&Arc<AuthEntry>> {
        self.entries.get(username)
    }

    /// Check if an entry exists for a username.
    pub fn contains(&self, username: &str) -> bool {
        self.entries.contains_key(username)
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry, returning the entry it replaced.
    pub(crate) fn insert(&mut self, entry: AuthEntry) -> Option<Arc<AuthEntry>> {
        self.entries
            .insert(entry.username.clone(), Arc::new(entry))
    }
}
