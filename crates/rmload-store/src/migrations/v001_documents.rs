//! v001 -- Initial schema creation.
//!
//! Creates the `documents` table.  A document is addressed by its collection
//! path (`users`, `messages/42`, ...) plus its id, mirroring the
//! collection/document hierarchy of the source data.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection  TEXT NOT NULL,                -- slash-joined collection path
    doc_id      TEXT NOT NULL,                -- envelope id
    body        TEXT NOT NULL,                -- JSON document
    object_key  TEXT NOT NULL,                -- source key the body came from
    updated_at  TEXT NOT NULL,                -- RFC-3339, time of last upsert

    PRIMARY KEY (collection, doc_id)
);

CREATE INDEX IF NOT EXISTS idx_documents_object_key ON documents(object_key);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
