//! Rows persisted in the document database.

use chrono::{DateTime, Utc};

/// A stored document together with its bookkeeping columns.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Slash-joined collection path, e.g. `messages/42`.
    pub collection: String,
    /// Document id (the envelope id).
    pub id: String,
    /// The document body exactly as written.
    pub body: serde_json::Value,
    /// Object key the body was decoded from.
    pub object_key: String,
    /// When the document was last upserted.
    pub updated_at: DateTime<Utc>,
}
