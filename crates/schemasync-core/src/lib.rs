//! Core contracts and helpers for schemasync.
//!
//! This crate defines the connection and diff models exchanged with external
//! collaborators, the selection model over diff items, and the SQL script
//! assembler. Everything here is synchronous and free of I/O.

pub mod connection;
pub mod diff;
pub mod error;
pub mod redaction;
pub mod script;
pub mod selection;

pub use connection::{Connection, ConnectionDescriptor, Credentials, Dialect, SslConfig};
pub use diff::{DiffItem, DiffKind, DiffResult, TableGroup};
pub use error::{Error, Result};
pub use redaction::{RedactedConnection, redact_connection_string, redact_urls};
pub use script::{
    BANNER, Clock, END_MARKER, SCRIPT_VERSION, ScriptCache, ScriptKey, SystemClock, assemble,
    resolve_dialect,
};
pub use selection::{GroupState, Selection};
