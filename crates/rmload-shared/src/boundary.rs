//! Seams between the pipeline and the systems it moves data between.
//!
//! Implementations must be safe to share across concurrently running tasks.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IngestError;
use crate::model::Envelope;

/// Flat-keyed object storage holding the source records.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every key starting with `prefix`, across all pages. Order is unspecified.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, IngestError>;

    /// Full contents of `key`. Fails with `NotFound` if the key is absent.
    async fn read(&self, key: &str) -> Result<Bytes, IngestError>;

    /// Copy `src` to `dst`, wait for the copy to become visible, delete `src`
    /// and wait for the delete to become visible.
    ///
    /// On success exactly one of the two keys (`dst`) is present. A failure
    /// after the copy landed may leave both keys present; the error says so.
    async fn relocate(&self, src: &str, dst: &str) -> Result<(), IngestError>;
}

/// Destination document database.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Upsert `envelope` at [`Envelope::document_path`], replacing any
    /// document already stored under the same id.
    async fn write(&self, envelope: &Envelope) -> Result<(), IngestError>;
}
