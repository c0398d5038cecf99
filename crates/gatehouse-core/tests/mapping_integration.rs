//! Integration tests for the file-backed authentication provider.

use std::fs::File;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use gatehouse_core::{
    parse_user_mapping, AuthenticationProvider, Credentials, FileAuthenticationProvider,
    PasswordEncoding, ProviderError, StoreError, Verdict, DEFAULT_CONNECTION,
};

const MAPPING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<user-mapping>
    <!-- md5("secret") -->
    <authorize username="alice" password="5EBE2294ECD0E0F08EAB7690D2A6EE69" encoding="md5">
        <connection name="vm1">
            <protocol>rdp</protocol>
            <param name="hostname">10.0.0.5</param>
        </connection>
    </authorize>
    <authorize username="carol" password="correct horse" encoding="plain">
        <protocol>ssh</protocol>
        <param name="hostname">bastion</param>
    </authorize>
    <authorize username="dave" password="5D7845AC6EE7CFFFAFC5FE5F35CF666D" encoding="md5"/>
</user-mapping>
"#;

const UPDATED: &str = r#"<user-mapping>
    <authorize username="bob" password="builder">
        <connection name="shell"><protocol>ssh</protocol></connection>
    </authorize>
</user-mapping>
"#;

struct TestContext {
    path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-mapping.xml");
        Self { path, _dir: dir }
    }

    fn write(&self, document: &str, modified: SystemTime) {
        std::fs::write(&self.path, document).unwrap();
        File::options()
            .write(true)
            .open(&self.path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    fn provider(&self) -> FileAuthenticationProvider {
        FileAuthenticationProvider::open(&self.path).unwrap()
    }
}

fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
}

fn credentials(username: &str, password: &str) -> Credentials {
    Credentials::new()
        .with_username(username)
        .with_password(password)
        .with_remote_addr("192.0.2.10")
}

#[test]
fn test_alice_scenario() {
    let ctx = TestContext::new();
    ctx.write(MAPPING, at(0));
    let provider = ctx.provider();

    let configs = provider
        .authorized_configurations(&credentials("alice", "secret"))
        .unwrap()
        .unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs["vm1"].protocol(), Some("rdp"));
    assert_eq!(configs["vm1"].parameter("hostname"), Some("10.0.0.5"));

    assert!(provider
        .authorized_configurations(&credentials("alice", "wrong"))
        .unwrap()
        .is_none());

    assert_eq!(
        provider.check(&credentials("bob", "anything")).unwrap(),
        Verdict::UnknownUser
    );
    assert!(provider.store().lookup("bob").unwrap().is_none());
}

#[test]
fn test_declared_passwords_accepted_and_mutations_rejected() {
    let mapping = parse_user_mapping(MAPPING).unwrap();
    let plaintexts = [("alice", "secret"), ("carol", "correct horse"), ("dave", "secret123")];

    for (username, password) in plaintexts {
        let entry = mapping.get(username).unwrap();
        assert!(
            entry.validate(Some(username), Some(password)),
            "{} should be accepted",
            username
        );

        // Flip each character in turn.
        for (i, c) in password.char_indices() {
            let replacement = if c == 'x' { 'y' } else { 'x' };
            let mut mutated = String::with_capacity(password.len());
            mutated.push_str(&password[..i]);
            mutated.push(replacement);
            mutated.push_str(&password[i + c.len_utf8()..]);
            assert!(!entry.validate(Some(username), Some(&mutated)));
        }

        // Dropped and appended characters.
        assert!(!entry.validate(Some(username), Some(&password[1..])));
        assert!(!entry.validate(Some(username), Some(&format!("{}!", password))));
    }
}

#[test]
fn test_md5_stored_in_either_case() {
    let lower = MAPPING.replace(
        "5EBE2294ECD0E0F08EAB7690D2A6EE69",
        "5ebe2294ecd0e0f08eab7690d2a6ee69",
    );
    let mapping = parse_user_mapping(&lower).unwrap();
    let alice = mapping.get("alice").unwrap();

    assert_eq!(alice.encoding(), PasswordEncoding::Md5);
    assert!(alice.validate(Some("alice"), Some("secret")));
}

#[test]
fn test_default_connection_from_file() {
    let ctx = TestContext::new();
    ctx.write(MAPPING, at(0));
    let provider = ctx.provider();

    let configs = provider
        .authorized_configurations(&credentials("carol", "correct horse"))
        .unwrap()
        .unwrap();
    let default = &configs[DEFAULT_CONNECTION];
    assert_eq!(default.protocol(), Some("ssh"));
    assert_eq!(default.parameter("hostname"), Some("bastion"));
}

#[test]
fn test_file_reload_on_newer_mtime() {
    let ctx = TestContext::new();
    ctx.write(MAPPING, at(0));
    let provider = ctx.provider();
    let store = provider.store().clone();

    assert!(store.lookup("alice").unwrap().is_some());
    assert!(store.lookup("alice").unwrap().is_some());
    assert_eq!(store.parse_count(), 1);

    ctx.write(UPDATED, at(60));
    assert!(store.lookup("alice").unwrap().is_none());
    assert!(provider
        .authorized_configurations(&credentials("bob", "builder"))
        .unwrap()
        .is_some());
    assert_eq!(store.parse_count(), 2);
}

#[test]
fn test_missing_file_then_created() {
    let ctx = TestContext::new();
    let provider = ctx.provider();

    let err = provider
        .authorized_configurations(&credentials("alice", "secret"))
        .unwrap_err();
    assert!(matches!(err, ProviderError::Store(StoreError::Unavailable(_))));

    ctx.write(MAPPING, at(0));
    assert!(provider
        .authorized_configurations(&credentials("alice", "secret"))
        .unwrap()
        .is_some());
}

#[test]
fn test_deleted_file_keeps_last_mapping() {
    let ctx = TestContext::new();
    ctx.write(MAPPING, at(0));
    let provider = ctx.provider();
    assert!(provider.store().is_loaded());

    std::fs::remove_file(&ctx.path).unwrap();
    assert!(provider
        .authorized_configurations(&credentials("alice", "secret"))
        .unwrap()
        .is_some());
}

#[test]
fn test_malformed_file_rejected_at_open() {
    let ctx = TestContext::new();
    ctx.write(
        r#"<user-mapping><authorize username="x" password="y" encoding="rot13"/></user-mapping>"#,
        at(0),
    );

    let err = FileAuthenticationProvider::open(&ctx.path).unwrap_err();
    match err {
        ProviderError::Store(StoreError::Malformed { error, .. }) => {
            assert!(!error.is_structural());
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
