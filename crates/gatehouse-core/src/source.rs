//! Backing sources for user mapping documents.

use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use parking_lot::RwLock;

/// A place a user mapping document can be read from.
///
/// The store only re-reads a source when its modification time moves
/// past that of the mapping currently loaded.
pub trait MappingSource: Send + Sync {
    /// Human-readable name used in log output and errors.
    fn name(&self) -> String;

    /// Modification time of the current document.
    fn last_modified(&self) -> io::Result<SystemTime>;

    /// Read the full document.
    fn read(&self) -> io::Result<Vec<u8>>;
}

/// Mapping document stored in a file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MappingSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn last_modified(&self) -> io::Result<SystemTime> {
        std::fs::metadata(&self.path)?.modified()
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

/// In-memory mapping document with an explicit modification time.
///
/// Useful for tests and for embedding a fixed mapping.
#[derive(Debug, Default)]
pub struct MemorySource {
    name: String,
    document: RwLock<Option<(Vec<u8>, SystemTime)>>,
}

impl MemorySource {
    /// Create a source with no document.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            document: RwLock::new(None),
        }
    }

    /// Set the initial document.
    pub fn with_document(self, document: impl Into<Vec<u8>>, modified: SystemTime) -> Self {
        *self.document.write() = Some((document.into(), modified));
        self
    }

    /// Replace the document and its modification time.
    pub fn update(&self, document: impl Into<Vec<u8>>, modified: SystemTime) {
        *self.document.write() = Some((document.into(), modified));
    }

    /// Remove the document, as if its file were deleted.
    pub fn remove(&self) {
        *self.document.write() = None;
    }
}

impl MappingSource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn last_modified(&self) -> io::Result<SystemTime> {
        self.document
            .read()
            .as_ref()
            .map(|(_, modified)| *modified)
            .ok_or_else(|| not_found(&self.name))
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        self.document
            .read()
            .as_ref()
            .map(|(document, _)| document.clone())
            .ok_or_else(|| not_found(&self.name))
    }
}

fn not_found(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} has no document", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_memory_source_lifecycle() {
        let source = MemorySource::new("memory");
        assert_eq!(
            source.last_modified().unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        source.update("<user-mapping/>", t0);
        assert_eq!(source.last_modified().unwrap(), t0);
        assert_eq!(source.read().unwrap(), b"<user-mapping/>");

        source.remove();
        assert!(source.read().is_err());
    }

    #[test]
    fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-mapping.xml");
        let source = FileSource::new(&path);

        assert!(source.last_modified().is_err());

        std::fs::write(&path, "<user-mapping/>").unwrap();
        assert!(source.last_modified().is_ok());
        assert_eq!(source.read().unwrap(), b"<user-mapping/>");
        assert!(source.name().ends_with("user-mapping.xml"));
    }
}
