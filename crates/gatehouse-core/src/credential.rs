//! Submitted credentials and password validation.

use md5::{Digest, Md5};
use subtle::ConstantTimeEq;

use crate::mapping::{AuthEntry, PasswordEncoding};

/// Credentials submitted with a request.
///
/// Every field is optional: a request may carry any subset of them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Address of the remote client, when known.
    pub remote_addr: Option<String>,
    /// Identifier of the session the request belongs to.
    pub session_id: Option<String>,
}

impl Credentials {
    /// Create empty credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the remote address.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Set the session identifier.
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// The username, or `""` for log output.
    pub fn username_or_empty(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("remote_addr", &self.remote_addr)
            .field("session_id", &self.session_id)
            .finish()
    }
}

/// Check a submitted username and password against an entry.
///
/// Absent values never match. Usernames compare exactly. For
/// [`PasswordEncoding::Md5`] the submitted password is hashed and its
/// uppercase hex digest compared with the stored value, ignoring the
/// stored value's case.
pub fn validate(entry: &AuthEntry, username: Option<&str>, password: Option<&str>) -> bool {
    let (Some(username), Some(password)) = (username, password) else {
        return false;
    };

    if username != entry.username() {
        return false;
    }

    match entry.encoding() {
        PasswordEncoding::Plain => {
            constant_time_eq(password.as_bytes(), entry.password().as_bytes())
        }
        PasswordEncoding::Md5 => {
            let digest = hex::encode_upper(Md5::digest(password.as_bytes()));
            let stored = entry.password().to_ascii_uppercase();
            constant_time_eq(digest.as_bytes(), stored.as_bytes())
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    // md5("secret")
    const SECRET_MD5: &str = "5EBE2294ECD0E0F08EAB7690D2A6EE69";

    #[test]
    fn test_plain_password() {
        let entry = AuthEntry::new("bob", "hunter2", PasswordEncoding::Plain);

        assert!(validate(&entry, Some("bob"), Some("hunter2")));
        assert!(!validate(&entry, Some("bob"), Some("hunter3")));
        assert!(!validate(&entry, Some("bob"), Some("HUNTER2")));
        assert!(!validate(&entry, Some("bob"), Some("")));
    }

    #[test]
    fn test_md5_password() {
        let entry = AuthEntry::new("alice", SECRET_MD5, PasswordEncoding::Md5);

        assert!(validate(&entry, Some("alice"), Some("secret")));
        assert!(!validate(&entry, Some("alice"), Some("wrong")));
        // The digest itself is not a valid password.
        assert!(!validate(&entry, Some("alice"), Some(SECRET_MD5)));
    }

    #[test]
    fn test_md5_stored_digest_case_insensitive() {
        let lower = SECRET_MD5.to_ascii_lowercase();
        let entry = AuthEntry::new("alice", lower, PasswordEncoding::Md5);
        assert!(validate(&entry, Some("alice"), Some("secret")));
    }

    #[test]
    fn test_username_must_match_exactly() {
        let entry = AuthEntry::new("bob", "hunter2", PasswordEncoding::Plain);

        assert!(!validate(&entry, Some("Bob"), Some("hunter2")));
        assert!(!validate(&entry, Some("bob "), Some("hunter2")));
        assert!(!validate(&entry, Some("alice"), Some("hunter2")));
    }

    #[test]
    fn test_absent_values_never_match() {
        let entry = AuthEntry::new("bob", "", PasswordEncoding::Plain);

        assert!(!validate(&entry, None, Some("")));
        assert!(!validate(&entry, Some("bob"), None));
        assert!(!validate(&entry, None, None));
        assert!(validate(&entry, Some("bob"), Some("")));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new()
            .with_username("alice")
            .with_password("secret")
            .with_remote_addr("127.0.0.1");

        let debug = format!("{:?}", credentials);
        assert!(debug.contains("alice"));
        assert!(debug.contains("127.0.0.1"));
        assert!(!debug.contains("secret"));
        assert_eq!(credentials.username_or_empty(), "alice");
        assert_eq!(Credentials::new().username_or_empty(), "");
    }
}
