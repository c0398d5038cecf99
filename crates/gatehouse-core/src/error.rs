//! Core error types.

use thiserror::Error;

/// Category of a user mapping parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingErrorKind {
    /// Unexpected or missing element, missing attribute, ill-formed markup.
    Structural,
    /// Unrecognized password encoding.
    Encoding,
}

impl std::fmt::Display for MappingErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingErrorKind::Structural => write!(f, "structural"),
            MappingErrorKind::Encoding => write!(f, "encoding"),
        }
    }
}

/// Error raised while parsing a user mapping document.
#[derive(Debug, Clone, Error)]
#[error("{kind} error at byte {position}: {message}")]
pub struct MappingError {
    /// Error category.
    pub kind: MappingErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Byte offset in the document where the error was detected.
    pub position: u64,
}

impl MappingError {
    /// Create a structural error.
    pub fn structural(message: impl Into<String>, position: u64) -> Self {
        Self {
            kind: MappingErrorKind::Structural,
            message: message.into(),
            position,
        }
    }

    /// Create an encoding error.
    pub fn encoding(message: impl Into<String>, position: u64) -> Self {
        Self {
            kind: MappingErrorKind::Encoding,
            message: message.into(),
            position,
        }
    }

    /// Check if this is a structural error.
    pub fn is_structural(&self) -> bool {
        self.kind == MappingErrorKind::Structural
    }
}

/// Mapping store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No mapping has ever been loaded and the source cannot be read.
    #[error("user mapping could not be read from {0}")]
    Unavailable(String),

    /// The source was read but its contents are not a valid user mapping.
    #[error("error parsing user mapping {source_name}: {error}")]
    Malformed {
        /// Description of the source that failed to parse.
        source_name: String,
        /// Underlying parse error.
        #[source]
        error: MappingError,
    },
}

/// Result type for mapping store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Authentication provider errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Mapping store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Provider configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
