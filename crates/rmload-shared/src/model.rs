//! Record model: the CloudEvents-style envelope and its per-category payloads.
//!
//! Every struct derives `Serialize` so the decoded record can be written to
//! the document database verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::nullable;
use crate::types::{Category, DocumentPath};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Category-independent wrapper around every record.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Envelope {
    pub specversion: String,
    /// Document key within the destination collection. Never empty.
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datacontenttype: Option<String>,
    pub time: DateTime<Utc>,
    #[serde(rename = "data")]
    pub payload: Payload,
    /// Store key the envelope was read from. Set by the decoder only.
    pub object_key: String,
}

impl Envelope {
    pub fn category(&self) -> Category {
        self.payload.category()
    }

    /// Where this record lives in the document database.
    pub fn document_path(&self) -> DocumentPath {
        match &self.payload {
            Payload::Message(message) => DocumentPath::nested(
                Category::Message.collection(),
                message.board_id.to_string(),
                &self.id,
            ),
            Payload::User(_) => DocumentPath::new(Category::User.collection(), &self.id),
            Payload::Issue(_) => DocumentPath::new(Category::Issue.collection(), &self.id),
        }
    }

    /// The document body written to the sink.
    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Decoded payload; the variant always matches the category the key was
/// listed under.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Payload {
    Message(MessageData),
    User(UserData),
    Issue(IssueData),
}

impl Payload {
    pub fn category(&self) -> Category {
        match self {
            Payload::Message(_) => Category::Message,
            Payload::User(_) => Category::User,
            Payload::Issue(_) => Category::Issue,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A forum message posted to a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageData {
    pub id: i64,
    /// Thread root this message replies to, if any.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub parent_id: Option<i64>,
    pub board_id: i64,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub author_id: Option<i64>,
    #[serde(default)]
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub sticky: bool,
    pub created_on: DateTime<Utc>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub updated_on: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An account, including its authentication metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserData {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub hashed_password: String,
    #[serde(default)]
    pub salt: String,
    /// External authentication source (LDAP etc.); `None` for local accounts.
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub auth_source_id: Option<i64>,
    #[serde(default)]
    pub admin: bool,
    pub status: i32,
    #[serde(default)]
    pub language: String,
    pub created_on: DateTime<Utc>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub updated_on: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub last_login_on: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

/// A tracked issue and its latest journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueData {
    pub id: i64,
    pub job_id: i64,
    pub status: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub commentor: String,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub done_ratio: i32,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub estimated_hours: Option<f64>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}
