use chrono::{DateTime, Utc};
use rmload_shared::constants::MAX_DOCUMENT_SIZE;
use rmload_shared::DocumentPath;
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::StoredDocument;

impl Database {
    /// Insert or fully replace the document at `path`.
    ///
    /// An existing body is overwritten, never merged.
    pub fn upsert_document(
        &self,
        path: &DocumentPath,
        body: &serde_json::Value,
        object_key: &str,
    ) -> Result<()> {
        let encoded = serde_json::to_string(body)?;
        if encoded.len() > MAX_DOCUMENT_SIZE {
            return Err(StoreError::DocumentTooLarge {
                size: encoded.len(),
                max: MAX_DOCUMENT_SIZE,
            });
        }

        self.conn().execute(
            "INSERT INTO documents (collection, doc_id, body, object_key, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(collection, doc_id) DO UPDATE SET
                 body = excluded.body,
                 object_key = excluded.object_key,
                 updated_at = excluded.updated_at",
            params![
                path.collection_path(),
                path.id,
                encoded,
                object_key,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, path: &DocumentPath) -> Result<StoredDocument> {
        self.conn()
            .query_row(
                "SELECT collection, doc_id, body, object_key, updated_at
                 FROM documents WHERE collection = ?1 AND doc_id = ?2",
                params![path.collection_path(), path.id],
                row_to_document,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All documents directly in `collection` (e.g. `users` or `messages/42`).
    pub fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let mut stmt = self.conn().prepare(
            "SELECT collection, doc_id, body, object_key, updated_at
             FROM documents
             WHERE collection = ?1
             ORDER BY doc_id ASC",
        )?;
        let rows = stmt.query_map(params![collection], row_to_document)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn count_documents(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredDocument> {
    let collection: String = row.get(0)?;
    let id: String = row.get(1)?;
    let body_str: String = row.get(2)?;
    let object_key: String = row.get(3)?;
    let updated_str: String = row.get(4)?;

    let body = serde_json::from_str(&body_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let updated_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&updated_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(StoredDocument {
        collection,
        id,
        body,
        object_key,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn upsert_then_get() {
        let db = Database::open_in_memory().unwrap();
        let path = DocumentPath::nested("messages", "42", "m1");

        db.upsert_document(&path, &json!({"id": "m1", "data": {"board_id": 42}}), "a/messages/1")
            .unwrap();

        let doc = db.get_document(&path).unwrap();
        assert_eq!(doc.id, "m1");
        assert_eq!(doc.collection, "messages/42");
        assert_eq!(doc.body["data"]["board_id"], 42);
        assert_eq!(doc.object_key, "a/messages/1");
    }

    #[test]
    fn second_write_replaces_first() {
        let db = Database::open_in_memory().unwrap();
        let path = DocumentPath::new("users", "u1");

        db.upsert_document(&path, &json!({"login": "old", "extra": true}), "k/1")
            .unwrap();
        db.upsert_document(&path, &json!({"login": "new"}), "k/2")
            .unwrap();

        let doc = db.get_document(&path).unwrap();
        assert_eq!(doc.body, json!({"login": "new"}));
        assert_eq!(doc.object_key, "k/2");
        assert_eq!(db.count_documents().unwrap(), 1);
    }

    #[test]
    fn same_id_in_different_collections() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_document(&DocumentPath::new("users", "x"), &json!(1), "k/u")
            .unwrap();
        db.upsert_document(&DocumentPath::new("issues", "x"), &json!(2), "k/i")
            .unwrap();

        assert_eq!(db.count_documents().unwrap(), 2);
        assert_eq!(db.list_documents("users").unwrap().len(), 1);
    }

    #[test]
    fn missing_document_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .get_document(&DocumentPath::new("users", "nobody"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn corrupt_timestamp_is_sqlite_conversion_error() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO documents (collection, doc_id, body, object_key, updated_at)
                 VALUES ('users', 'u1', '{}', 'k', 'yesterday')",
                [],
            )
            .unwrap();

        let err = db.get_document(&DocumentPath::new("users", "u1")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Sqlite(rusqlite::Error::FromSqlConversionFailure(4, _, _))
        ));
    }

    #[test]
    fn oversized_document_rejected() {
        let db = Database::open_in_memory().unwrap();
        let body = json!({ "notes": "x".repeat(MAX_DOCUMENT_SIZE) });

        let err = db
            .upsert_document(&DocumentPath::new("issues", "big"), &body, "k")
            .unwrap_err();
        assert!(matches!(err, StoreError::DocumentTooLarge { .. }));
        assert_eq!(db.count_documents().unwrap(), 0);
    }
}
