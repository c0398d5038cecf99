//! User mapping model and parser.
//!
//! A user mapping is an XML document listing the users allowed to log in,
//! their passwords, and the connections each user is authorized to use:
//!
//! ```text
//! <user-mapping>
//!     <authorize username="alice" password="5EBE2294ECD0E0F08EAB7690D2A6EE69" encoding="md5">
//!         <connection name="vm1">
//!             <protocol>rdp</protocol>
//!             <param name="hostname">10.0.0.5</param>
//!         </connection>
//!     </authorize>
//!     <authorize username="bob" password="hunter2">
//!         <protocol>vnc</protocol>
//!         <param name="port">5901</param>
//!     </authorize>
//! </user-mapping>
//! ```
//!
//! `protocol` and `param` elements placed directly under `authorize`
//! describe the connection named [`DEFAULT_CONNECTION`].

mod model;
mod parser;

pub use model::{
    AuthEntry, ConnectionConfig, ConnectionMap, PasswordEncoding, UserMapping, DEFAULT_CONNECTION,
};
pub use parser::{parse_user_mapping, parse_user_mapping_bytes, MappingParser};
