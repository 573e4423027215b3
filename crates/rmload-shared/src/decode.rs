//! Record decoding.
//!
//! The envelope is parsed first with its `data` member kept opaque, then the
//! payload is decoded against the schema of the category the key was listed
//! under.  Any mismatch in either step is a [`IngestError::MalformedRecord`];
//! there is no lenient or partial decoding.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::IngestError;
use crate::model::{Envelope, IssueData, MessageData, Payload, UserData};
use crate::types::Category;

/// Envelope as stored. Any `object_key` member in the bytes is ignored.
#[derive(Deserialize)]
struct RawEnvelope {
    specversion: String,
    id: String,
    source: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    datacontenttype: Option<String>,
    time: DateTime<Utc>,
    data: serde_json::Value,
}

/// Decode the object stored at `key` as a record of `category`.
pub fn decode(category: Category, key: &str, bytes: &[u8]) -> Result<Envelope, IngestError> {
    let raw: RawEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| IngestError::MalformedRecord(format!("envelope: {}", e)))?;

    if raw.id.trim().is_empty() {
        return Err(IngestError::MalformedRecord(
            "envelope: id is empty".to_string(),
        ));
    }

    let payload = decode_payload(category, raw.data)?;

    Ok(Envelope {
        specversion: raw.specversion,
        id: raw.id,
        source: raw.source,
        event_type: raw.event_type,
        datacontenttype: raw.datacontenttype,
        time: raw.time,
        payload,
        object_key: key.to_string(),
    })
}

fn decode_payload(category: Category, data: serde_json::Value) -> Result<Payload, IngestError> {
    let decoded = match category {
        Category::Message => serde_json::from_value::<MessageData>(data).map(Payload::Message),
        Category::User => serde_json::from_value::<UserData>(data).map(Payload::User),
        Category::Issue => serde_json::from_value::<IssueData>(data).map(Payload::Issue),
    };
    decoded.map_err(|e| IngestError::MalformedRecord(format!("{} payload: {}", category, e)))
}
