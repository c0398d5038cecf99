//! Gatehouse Core - user mapping parsing, credential validation and storage.
//!
//! This crate provides the file-backed authentication core for Gatehouse:
//! the XML user mapping parser, password validation under the supported
//! encodings, and a mapping store that reloads itself when its backing
//! source changes.

pub mod credential;
pub mod error;
pub mod mapping;
pub mod provider;
pub mod source;
pub mod store;

pub use credential::{validate, Credentials};
pub use error::{MappingError, MappingErrorKind, ProviderError, StoreError, StoreResult};
pub use mapping::{
    parse_user_mapping, parse_user_mapping_bytes, AuthEntry, ConnectionConfig, ConnectionMap,
    MappingParser, PasswordEncoding, UserMapping, DEFAULT_CONNECTION,
};
pub use provider::{
    AuthenticationProvider, AuthorizedContext, FileAuthenticationProvider, Verdict,
};
pub use source::{FileSource, MappingSource, MemorySource};
pub use store::MappingStore;
