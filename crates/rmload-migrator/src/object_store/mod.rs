//! [`ObjectStore`] backends.
//!
//! - [`S3ObjectStore`]: any S3-compatible service (custom endpoint, static
//!   credentials, path-style addressing).
//! - [`FsObjectStore`]: a local directory laid out like a bucket, for
//!   development and tests.

mod fs;
mod s3;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rmload_shared::{IngestError, ObjectStore};
use tokio::time::sleep;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};

pub use fs::FsObjectStore;
pub use s3::S3ObjectStore;

/// How long relocate waits for a copy or delete to become observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityWait {
    pub interval: Duration,
    pub max_checks: u32,
}

impl VisibilityWait {
    pub fn new(interval: Duration, max_checks: u32) -> Self {
        Self {
            interval,
            max_checks: max_checks.max(1),
        }
    }

    /// Poll `probe` until it returns `want`.
    ///
    /// Probe errors are returned immediately. Running out of checks is a
    /// `TransientIo` naming `what`.
    pub async fn until<F, Fut>(&self, what: &str, want: bool, mut probe: F) -> Result<(), IngestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, IngestError>>,
    {
        for check in 1..=self.max_checks {
            if probe().await? == want {
                return Ok(());
            }
            if check < self.max_checks {
                sleep(self.interval).await;
            }
        }
        Err(IngestError::TransientIo(format!(
            "gave up waiting for {} after {} checks",
            what, self.max_checks
        )))
    }
}

impl From<&StorageConfig> for VisibilityWait {
    fn from(config: &StorageConfig) -> Self {
        Self::new(config.wait_interval, config.wait_max_checks)
    }
}

/// Build the configured backend and make sure its bucket is reachable.
///
/// Failing here is fatal: the run never starts against a store it cannot
/// reach.
pub async fn connect(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::S3 => {
            let store = S3ObjectStore::connect(config).await;
            store.check_bucket().await?;
            info!(bucket = %config.bucket, "S3 object store ready");
            Ok(Arc::new(store))
        }
        StorageBackend::Fs => {
            let store =
                FsObjectStore::new(&config.root_path.join(&config.bucket), config.into()).await?;
            info!(path = %store.base_path().display(), "Filesystem object store ready");
            Ok(Arc::new(store))
        }
    }
}
