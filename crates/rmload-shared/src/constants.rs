/// Default root under which the per-category prefixes live.
pub const DEFAULT_PREFIX_ROOT: &str = "rmine_push_data";

/// Prefix prepended to a key when its object is relocated after processing.
pub const PROCESSED_PREFIX: &str = "processed/";

/// Default number of concurrently running tasks.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default number of read/decode/write attempts per object.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default linear backoff unit in milliseconds (attempt N sleeps N units).
pub const DEFAULT_BACKOFF_MILLIS: u64 = 1_000;

/// Largest document body the sink accepts (1 MiB).
pub const MAX_DOCUMENT_SIZE: usize = 1024 * 1024;

/// Relocate visibility polling defaults, matching the S3 waiter defaults.
pub const DEFAULT_WAIT_INTERVAL_MILLIS: u64 = 5_000;
pub const DEFAULT_WAIT_MAX_CHECKS: u32 = 20;
