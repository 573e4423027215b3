use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Record category, resolved once from the listing prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "messages")]
    Message,
    #[serde(rename = "users")]
    User,
    #[serde(rename = "issues")]
    Issue,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Message, Category::User, Category::Issue];

    /// Name used both as the prefix segment and as the collection name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Message => "messages",
            Category::User => "users",
            Category::Issue => "issues",
        }
    }

    pub fn collection(&self) -> &'static str {
        self.as_str()
    }

    /// Listing prefix for this category under `root`, e.g. `rmine_push_data/users`.
    pub fn prefix(&self, root: &str) -> String {
        let root = root.trim_end_matches('/');
        if root.is_empty() {
            self.as_str().to_string()
        } else {
            format!("{}/{}", root, self.as_str())
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown category: {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "messages" | "message" => Ok(Category::Message),
            "users" | "user" => Ok(Category::User),
            "issues" | "issue" => Ok(Category::Issue),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

/// Location of a document in the destination database.
///
/// Messages nest one level deeper, under a sub-collection named after the
/// board they were posted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub sub_collection: Option<String>,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            sub_collection: None,
            id: id.into(),
        }
    }

    pub fn nested(
        collection: impl Into<String>,
        sub_collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            sub_collection: Some(sub_collection.into()),
            id: id.into(),
        }
    }

    /// Slash-joined collection part, e.g. `messages/42` or `users`.
    pub fn collection_path(&self) -> String {
        match &self.sub_collection {
            Some(sub) => format!("{}/{}", self.collection, sub),
            None => self.collection.clone(),
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection_path(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_prefix() {
        assert_eq!(Category::User.prefix("rmine_push_data"), "rmine_push_data/users");
        assert_eq!(Category::Message.prefix("a/"), "a/messages");
        assert_eq!(Category::Issue.prefix(""), "issues");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("messages".parse::<Category>(), Ok(Category::Message));
        assert_eq!(" issues ".parse::<Category>(), Ok(Category::Issue));
        assert!("comments".parse::<Category>().is_err());
    }

    #[test]
    fn test_document_path_display() {
        assert_eq!(DocumentPath::nested("messages", "42", "m1").to_string(), "messages/42/m1");
        assert_eq!(DocumentPath::new("users", "u1").collection_path(), "users");
    }
}
