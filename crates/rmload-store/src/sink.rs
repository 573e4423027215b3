//! [`DocumentSink`] backed by the SQLite document database.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rmload_shared::{DocumentSink, Envelope, IngestError};
use tracing::debug;

use crate::database::Database;
use crate::error::StoreError;

/// Shares one connection between concurrent pipeline tasks.
///
/// Each write runs on the blocking pool so SQLite I/O never stalls the async
/// workers.
#[derive(Clone)]
pub struct SqliteDocumentSink {
    db: Arc<Mutex<Database>>,
}

impl SqliteDocumentSink {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `f` against the database on the blocking pool.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl DocumentSink for SqliteDocumentSink {
    async fn write(&self, envelope: &Envelope) -> Result<(), IngestError> {
        let path = envelope.document_path();
        let body = envelope.to_document().map_err(StoreError::Json)?;
        let object_key = envelope.object_key.clone();

        let target = path.clone();
        self.with_db(move |db| db.upsert_document(&target, &body, &object_key))
            .await?;

        debug!(document = %path, key = %envelope.object_key, "document upserted");
        Ok(())
    }
}
