//! Live-reloading user mapping store.
//!
//! The store keeps the most recently parsed [`UserMapping`] together with
//! the modification time of the document it was built from. Every read
//! first checks the source's modification time; when it has moved past the
//! loaded snapshot the document is re-read and parsed under an exclusive
//! reload lock, then swapped in whole. Readers never block on a reload for
//! longer than it takes to clone an `Arc`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};

use crate::error::{MappingError, StoreError, StoreResult};
use crate::mapping::{parse_user_mapping_bytes, AuthEntry, ConnectionMap, UserMapping};
use crate::source::{FileSource, MappingSource};

/// A parsed mapping and the source modification time it reflects.
#[derive(Debug)]
struct Snapshot {
    mapping: Arc<UserMapping>,
    modified_at: SystemTime,
}

#[derive(Debug, Default)]
struct StoreState {
    current: Option<Arc<Snapshot>>,
    /// Modification time of a document that failed to parse. The same
    /// document is not parsed again until the source changes.
    rejected: Option<(SystemTime, MappingError)>,
}

/// Thread-safe, self-refreshing holder of the current user mapping.
pub struct MappingStore {
    source: Arc<dyn MappingSource>,
    state: RwLock<StoreState>,
    reload_lock: Mutex<()>,
    parse_count: AtomicU64,
}

impl MappingStore {
    /// Create a store over the given source. Nothing is read until the
    /// first lookup.
    pub fn new(source: Arc<dyn MappingSource>) -> Self {
        Self {
            source,
            state: RwLock::new(StoreState::default()),
            reload_lock: Mutex::new(()),
            parse_count: AtomicU64::new(0),
        }
    }

    /// Create a store over a mapping file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileSource::new(path)))
    }

    /// The current mapping, reloading it first if the source changed.
    ///
    /// Fails with [`StoreError::Malformed`] when the changed document does
    /// not parse, and with [`StoreError::Unavailable`] when no mapping has
    /// ever been loaded.
    pub fn mapping(&self) -> StoreResult<Arc<UserMapping>> {
        self.refresh()?;

        let state = self.state.read();
        if let Some(snapshot) = &state.current {
            return Ok(snapshot.mapping.clone());
        }

        match &state.rejected {
            Some((_, error)) => Err(self.malformed(error.clone())),
            None => Err(StoreError::Unavailable(self.source.name())),
        }
    }

    /// Look up the entry for a username.
    pub fn lookup(&self, username: &str) -> StoreResult<Option<Arc<AuthEntry>>> {
        Ok(self.mapping()?.get(username).cloned())
    }

    /// The connections authorized for a username, regardless of password.
    pub fn resolve(&self, username: &str) -> StoreResult<Option<ConnectionMap>> {
        Ok(self.lookup(username)?.map(|entry| entry.connections().clone()))
    }

    /// Reload the mapping if the source is newer than the loaded snapshot.
    ///
    /// A source that cannot be inspected or read leaves the current
    /// snapshot in place.
    pub fn refresh(&self) -> StoreResult<()> {
        let modified = match self.source.last_modified() {
            Ok(modified) => modified,
            Err(e) => {
                tracing::debug!(
                    source = %self.source.name(),
                    error = %e,
                    "user mapping source not available"
                );
                return Ok(());
            }
        };

        if !self.is_stale(modified) {
            return Ok(());
        }

        let _guard = self.reload_lock.lock();

        // Another reader may have finished the reload while we waited.
        if !self.is_stale(modified) {
            return Ok(());
        }

        self.reload(modified)
    }

    /// Number of times a document has been parsed.
    pub fn parse_count(&self) -> u64 {
        self.parse_count.load(Ordering::Relaxed)
    }

    /// Modification time of the loaded snapshot.
    pub fn modified_at(&self) -> Option<SystemTime> {
        self.state.read().current.as_ref().map(|s| s.modified_at)
    }

    /// Check if a mapping has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.state.read().current.is_some()
    }

    fn is_stale(&self, modified: SystemTime) -> bool {
        let state = self.state.read();

        if matches!(&state.rejected, Some((rejected_at, _)) if *rejected_at == modified) {
            return false;
        }

        match &state.current {
            None => true,
            Some(snapshot) => modified > snapshot.modified_at,
        }
    }

    /// Must be called with `reload_lock` held.
    fn reload(&self, modified: SystemTime) -> StoreResult<()> {
        let name = self.source.name();
        tracing::info!(source = %name, "reading user mapping");

        let document = match self.source.read() {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(
                    source = %name,
                    error = %e,
                    "user mapping could not be read, keeping current mapping"
                );
                return Ok(());
            }
        };

        self.parse_count.fetch_add(1, Ordering::Relaxed);

        match parse_user_mapping_bytes(&document) {
            Ok(mapping) => {
                let users = mapping.len();
                let mut state = self.state.write();
                state.current = Some(Arc::new(Snapshot {
                    mapping: Arc::new(mapping),
                    modified_at: modified,
                }));
                state.rejected = None;
                drop(state);

                tracing::info!(source = %name, users, "user mapping loaded");
                Ok(())
            }
            Err(error) => {
                let mut state = self.state.write();
                let keeping = state.current.is_some();
                state.rejected = Some((modified, error.clone()));
                drop(state);

                tracing::error!(
                    source = %name,
                    error = %error,
                    keeping_previous = keeping,
                    "error parsing user mapping"
                );
                Err(self.malformed(error))
            }
        }
    }

    fn malformed(&self, error: MappingError) -> StoreError {
        StoreError::Malformed {
            source_name: self.source.name(),
            error,
        }
    }
}

impl std::fmt::Debug for MappingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingStore")
            .field("source", &self.source.name())
            .field("loaded", &self.is_loaded())
            .field("parse_count", &self.parse_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use std::time::Duration;

    const ONE_USER: &str = r#"<user-mapping>
        <authorize username="bob" password="hunter2">
            <protocol>vnc</protocol>
        </authorize>
    </user-mapping>"#;

    const TWO_USERS: &str = r#"<user-mapping>
        <authorize username="bob" password="hunter2">
            <protocol>vnc</protocol>
        </authorize>
        <authorize username="carol" password="pw">
            <connection name="db"><protocol>ssh</protocol></connection>
        </authorize>
    </user-mapping>"#;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn store_with(source: &Arc<MemorySource>) -> MappingStore {
        MappingStore::new(source.clone())
    }

    #[test]
    fn test_unavailable_before_first_load() {
        let source = Arc::new(MemorySource::new("memory"));
        let store = store_with(&source);

        assert!(matches!(store.mapping(), Err(StoreError::Unavailable(_))));
        assert!(!store.is_loaded());
        assert_eq!(store.parse_count(), 0);
    }

    #[test]
    fn test_unchanged_source_is_not_reparsed() {
        let source = Arc::new(MemorySource::new("memory").with_document(ONE_USER, at(10)));
        let store = store_with(&source);

        for _ in 0..5 {
            assert!(store.lookup("bob").unwrap().is_some());
        }
        assert_eq!(store.parse_count(), 1);
        assert_eq!(store.modified_at(), Some(at(10)));
    }

    #[test]
    fn test_newer_source_is_reloaded() {
        let source = Arc::new(MemorySource::new("memory").with_document(ONE_USER, at(10)));
        let store = store_with(&source);
        assert!(store.lookup("carol").unwrap().is_none());

        source.update(TWO_USERS, at(20));
        assert!(store.lookup("carol").unwrap().is_some());
        assert_eq!(store.parse_count(), 2);

        // Older timestamps do not trigger a reload.
        source.update(ONE_USER, at(15));
        assert!(store.lookup("carol").unwrap().is_some());
        assert_eq!(store.parse_count(), 2);
    }

    #[test]
    fn test_missing_source_keeps_previous_mapping() {
        let source = Arc::new(MemorySource::new("memory").with_document(ONE_USER, at(10)));
        let store = store_with(&source);
        assert!(store.lookup("bob").unwrap().is_some());

        source.remove();
        assert!(store.lookup("bob").unwrap().is_some());
        assert_eq!(store.parse_count(), 1);
    }

    #[test]
    fn test_malformed_reload_keeps_previous_mapping() {
        let source = Arc::new(MemorySource::new("memory").with_document(ONE_USER, at(10)));
        let store = store_with(&source);
        assert!(store.lookup("bob").unwrap().is_some());

        source.update("<user-mapping><oops/></user-mapping>", at(20));
        let err = store.lookup("bob").unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));

        // The bad document is not parsed again; the old snapshot serves reads.
        assert!(store.lookup("bob").unwrap().is_some());
        assert_eq!(store.parse_count(), 2);
        assert_eq!(store.modified_at(), Some(at(10)));

        // Fixing the document is picked up.
        source.update(TWO_USERS, at(30));
        assert!(store.lookup("carol").unwrap().is_some());
        assert_eq!(store.parse_count(), 3);
    }

    #[test]
    fn test_malformed_first_load_fails_closed() {
        let source = Arc::new(
            MemorySource::new("memory")
                .with_document(r#"<user-mapping><authorize/></user-mapping>"#, at(10)),
        );
        let store = store_with(&source);

        assert!(matches!(store.mapping(), Err(StoreError::Malformed { .. })));
        assert!(matches!(store.mapping(), Err(StoreError::Malformed { .. })));
        assert_eq!(store.parse_count(), 1);
    }

    #[test]
    fn test_resolve_ignores_password() {
        let source = Arc::new(MemorySource::new("memory").with_document(TWO_USERS, at(10)));
        let store = store_with(&source);

        let connections = store.resolve("carol").unwrap().unwrap();
        assert_eq!(connections["db"].protocol(), Some("ssh"));
        assert!(store.resolve("mallory").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_readers_parse_once() {
        let source = Arc::new(MemorySource::new("memory").with_document(TWO_USERS, at(10)));
        let store = Arc::new(store_with(&source));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        assert!(store.lookup("bob").unwrap().is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.parse_count(), 1);
    }
}
