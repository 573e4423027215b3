//! # rmload-store
//!
//! Document database for migrated records, backed by SQLite.
//!
//! Documents live in a single `documents` table addressed by collection path
//! and id, which keeps the nested collection layout of the destination
//! (`messages/<board>/<id>`, `users/<id>`, `issues/<id>`).  The crate exposes
//! a synchronous [`Database`] handle with typed helpers, and the async
//! [`SqliteDocumentSink`] the pipeline writes through.

pub mod database;
pub mod documents;
pub mod migrations;
pub mod models;
pub mod sink;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::StoredDocument;
pub use sink::SqliteDocumentSink;
