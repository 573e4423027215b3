//! Decoding for nullable payload fields.
//!
//! Upstream exports write nullable columns either as a bare value / `null`,
//! or as an explicit presence pair such as `{"Int64": 7, "Valid": true}` or
//! `{"Time": "2024-01-01T00:00:00Z", "Valid": false}`.  Both shapes decode
//! into `Option<T>`; a pair with `Valid: false` is `None` regardless of the
//! value it carries, so "absent" never collapses into zero or the epoch.
//! A pair marked `Valid: true` must carry its value under one of the known
//! value keys.
//!
//! Use together with `#[serde(default)]` so a missing field is also `None`:
//!
//! ```ignore
//! #[serde(default, deserialize_with = "nullable::deserialize")]
//! pub parent_id: Option<i64>,
//! ```

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Wire<T> {
    Pair(PresencePair<T>),
    Bare(Option<T>),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PresencePair<T> {
    #[serde(rename = "Valid", alias = "valid")]
    valid: bool,
    #[serde(
        alias = "Int64",
        alias = "Int32",
        alias = "Float64",
        alias = "String",
        alias = "Time",
        alias = "Bool"
    )]
    value: Option<T>,
}

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    match Wire::<T>::deserialize(deserializer)? {
        Wire::Pair(PresencePair { valid: true, value: None }) => Err(D::Error::custom(
            "presence pair marked Valid without a value",
        )),
        Wire::Pair(PresencePair { valid: true, value }) => Ok(value),
        Wire::Pair(_) => Ok(None),
        Wire::Bare(value) => Ok(value),
    }
}
