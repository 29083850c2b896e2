//! Stellaris save-file parser service: a synchronous archive loader, a
//! Clausewitz tokenizer/tree builder, a section-indexed query engine, the
//! Signals Builder, and the stdin/stdout session server that fronts them.

pub mod archive;
pub mod bridge;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod index;
pub mod names;
pub mod observability;
pub mod query;
pub mod server;
pub mod signals;
pub mod tokenizer;
pub mod tree;
pub mod types;
pub mod validation;
pub mod value;

pub use archive::ZipArchiveLoader;
pub use bridge::{current_active_session, pop_active_session, push_active_session, BridgeSession};
pub use config::{BridgeConfig, LoggingConfig, ParserConfig, ServerConfig, StreamConfig};
pub use contracts::{ArchiveLoader, LoadedSave, SessionTransport};
pub use errors::{ErrorFrame, ParserError};
pub use query::QueryEngine;
pub use server::{SessionServer, EXIT_ARCHIVE_ERROR, EXIT_INVALID_ARGS, EXIT_OK, EXIT_PARSE_ERROR};
pub use signals::{SignalsBuilder, FORMAT_VERSION};
pub use tree::parse_document;
pub use value::{Entry, Scalar, Value};
