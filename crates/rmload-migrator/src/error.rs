use rmload_shared::UnknownCategory;
use thiserror::Error;

/// Fatal startup errors. Any of these aborts the process before a single
/// object is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),
}
