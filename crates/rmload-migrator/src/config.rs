//! Migrator configuration.
//!
//! Settings come from a Java-style properties file (`key = value`), and every
//! key can be overridden by an environment variable named after it
//! (`storage.bucket.name` -> `STORAGE_BUCKET_NAME`).  Absent keys read as the
//! empty string; typed settings fall back to their defaults, and malformed
//! numbers are logged and ignored.  [`MigratorConfig::validate`] then rejects
//! anything the run cannot start without.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rmload_shared::constants::{
    DEFAULT_BACKOFF_MILLIS, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DEFAULT_PREFIX_ROOT,
    DEFAULT_WAIT_INTERVAL_MILLIS, DEFAULT_WAIT_MAX_CHECKS, PROCESSED_PREFIX,
};
use rmload_shared::Category;

use crate::error::ConfigError;

/// Every key the migrator reads. Only these are looked up in the environment.
pub const KNOWN_KEYS: &[&str] = &[
    "storage.backend",
    "storage.bucket.name",
    "storage.region",
    "storage.endpoint.url",
    "storage.access.key",
    "storage.secret.key",
    "storage.root.path",
    "storage.wait.interval.millis",
    "storage.wait.max.checks",
    "docstore.path",
    "object.prefix.root",
    "pipeline.categories",
    "pipeline.concurrency",
    "pipeline.max.attempts",
    "pipeline.backoff.millis",
    "pipeline.processed.prefix",
    "pipeline.deadline.secs",
];

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Raw key/value settings.
#[derive(Debug, Clone, Default)]
pub struct Properties(HashMap<String, String>);

impl Properties {
    /// Parse `key = value` lines. Lines without `=` and `#`/`!` comments are
    /// skipped; keys and values are trimmed.
    pub fn parse(text: &str) -> Self {
        let mut map = HashMap::new();
        for line in text.lines() {
            let line = line.trim_start();
            if line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    map.insert(key.to_string(), value.trim().to_string());
                }
            }
        }
        Self(map)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Apply environment overrides for [`KNOWN_KEYS`] from `vars`
    /// (normally `std::env::vars()`).
    pub fn with_env_overrides<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: HashMap<String, String> = vars.into_iter().collect();
        for key in KNOWN_KEYS {
            if let Some(value) = env.get(&env_name(key)) {
                self.0.insert((*key).to_string(), value.trim().to_string());
            }
        }
        self
    }

    /// Value for `key`, or the empty string when absent.
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    fn get_opt(&self, key: &str) -> Option<String> {
        let value = self.get(key);
        (!value.is_empty()).then(|| value.to_string())
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        let raw = self.get(key);
        if raw.is_empty() {
            return default;
        }
        match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Invalid value, using default");
                default
            }
        }
    }
}

/// `storage.bucket.name` -> `STORAGE_BUCKET_NAME`
fn env_name(key: &str) -> String {
    key.to_ascii_uppercase().replace('.', "_")
}

// ---------------------------------------------------------------------------
// Typed configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// S3-compatible object storage.
    S3,
    /// Local directory, one sub-directory per bucket.
    Fs,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "s3" => Ok(StorageBackend::S3),
            "fs" | "local" => Ok(StorageBackend::Fs),
            other => Err(ConfigError::Invalid {
                key: "storage.backend",
                reason: format!("expected s3 or fs, got {:?}", other),
            }),
        }
    }
}

/// A credential that must never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"***\"")
    }
}

/// Object store connection settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Env: `STORAGE_BACKEND` (`s3` | `fs`). Default: `s3`.
    pub backend: StorageBackend,
    /// Env: `STORAGE_BUCKET_NAME`. Required.
    pub bucket: String,
    /// Env: `STORAGE_REGION`. Default: SDK region chain.
    pub region: Option<String>,
    /// Env: `STORAGE_ENDPOINT_URL`. Default: SDK endpoint.
    pub endpoint_url: Option<String>,
    /// Env: `STORAGE_ACCESS_KEY` / `STORAGE_SECRET_KEY`. Both or neither.
    pub access_key: Option<String>,
    pub secret_key: Option<Secret>,
    /// Root directory for the `fs` backend. Default: `.`
    pub root_path: PathBuf,
    /// Relocate visibility polling.
    pub wait_interval: Duration,
    pub wait_max_checks: u32,
}

/// Complete migrator configuration, constructed once at startup and handed
/// to each component's constructor.
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    pub storage: StorageConfig,

    /// Document database file.
    /// Env: `DOCSTORE_PATH`. Required.
    pub docstore_path: PathBuf,

    /// Root the category prefixes hang off.
    /// Env: `OBJECT_PREFIX_ROOT`. Default: `rmine_push_data`
    pub prefix_root: String,

    /// Categories to process, in order.
    /// Env: `PIPELINE_CATEGORIES`. Default: `messages,users,issues`
    pub categories: Vec<Category>,

    /// Env: `PIPELINE_CONCURRENCY`. Default: 5
    pub concurrency: usize,

    /// Env: `PIPELINE_MAX_ATTEMPTS`. Default: 3
    pub max_attempts: u32,

    /// Linear backoff unit; attempt N waits N units.
    /// Env: `PIPELINE_BACKOFF_MILLIS`. Default: 1000
    pub backoff_unit: Duration,

    /// Env: `PIPELINE_PROCESSED_PREFIX`. Default: `processed/`
    pub processed_prefix: String,

    /// Optional bound on the whole run.
    /// Env: `PIPELINE_DEADLINE_SECS`. Default: none.
    pub deadline: Option<Duration>,
}

impl MigratorConfig {
    /// Build from raw properties. Structural errors (unknown backend or
    /// category) fail here; missing required settings fail in
    /// [`validate`](Self::validate).
    pub fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
        let storage = StorageConfig {
            backend: props.get("storage.backend").parse()?,
            bucket: props.get("storage.bucket.name").to_string(),
            region: props.get_opt("storage.region"),
            endpoint_url: props.get_opt("storage.endpoint.url"),
            access_key: props.get_opt("storage.access.key"),
            secret_key: props.get_opt("storage.secret.key").map(Secret),
            root_path: props
                .get_opt("storage.root.path")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            wait_interval: Duration::from_millis(
                props.parse_or("storage.wait.interval.millis", DEFAULT_WAIT_INTERVAL_MILLIS),
            ),
            wait_max_checks: props.parse_or("storage.wait.max.checks", DEFAULT_WAIT_MAX_CHECKS),
        };

        let categories = match props.get_opt("pipeline.categories") {
            Some(list) => parse_categories(&list)?,
            None => Category::ALL.to_vec(),
        };

        let deadline = match props.parse_or::<u64>("pipeline.deadline.secs", 0) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            storage,
            docstore_path: PathBuf::from(props.get("docstore.path")),
            prefix_root: props
                .get_opt("object.prefix.root")
                .unwrap_or_else(|| DEFAULT_PREFIX_ROOT.to_string()),
            categories,
            concurrency: props.parse_or("pipeline.concurrency", DEFAULT_CONCURRENCY),
            max_attempts: props.parse_or("pipeline.max.attempts", DEFAULT_MAX_ATTEMPTS),
            backoff_unit: Duration::from_millis(
                props.parse_or("pipeline.backoff.millis", DEFAULT_BACKOFF_MILLIS),
            ),
            processed_prefix: props
                .get_opt("pipeline.processed.prefix")
                .unwrap_or_else(|| PROCESSED_PREFIX.to_string()),
            deadline,
        })
    }

    /// Load from an optional properties file plus the process environment.
    ///
    /// Without an explicit path, `config.properties` in the working directory
    /// is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let props = match path {
            Some(path) => Properties::load(path)?,
            None => {
                let default = Path::new("config.properties");
                if default.exists() {
                    Properties::load(default)?
                } else {
                    tracing::warn!("No config.properties found, using environment only");
                    Properties::default()
                }
            }
        };
        Self::from_properties(&props.with_env_overrides(std::env::vars()))
    }

    /// Reject configurations the run cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::Missing("storage.bucket.name"));
        }
        if self.docstore_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("docstore.path"));
        }
        if self.storage.access_key.is_some() != self.storage.secret_key.is_some() {
            return Err(ConfigError::Invalid {
                key: "storage.access.key",
                reason: "access key and secret key must be set together".to_string(),
            });
        }
        if self.categories.is_empty() {
            return Err(ConfigError::Invalid {
                key: "pipeline.categories",
                reason: "at least one category is required".to_string(),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "pipeline.concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "pipeline.max.attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Parse a comma-separated, ordered category list. Duplicates are dropped.
pub fn parse_categories(list: &str) -> Result<Vec<Category>, ConfigError> {
    let mut categories = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let category: Category = name.parse()?;
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    Ok(categories)
}
