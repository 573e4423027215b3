//! # rmload-migrator
//!
//! One-shot migration of pushed tracker records from object storage into the
//! document database.
//!
//! For each configured category the binary:
//! - lists every object under `<prefix root>/<category>`
//! - reads, decodes and upserts each record, retrying with linear backoff
//! - moves each migrated object under the processed prefix
//!
//! A record that cannot be migrated stays where it is, so the next run picks
//! it up again.

mod config;
mod error;
mod object_store;
mod pipeline;
mod report;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rmload_shared::Category;
use rmload_store::{Database, SqliteDocumentSink};
use tracing::{error, info, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::MigratorConfig;
use crate::pipeline::{Pipeline, PipelineSettings};

/// Exit status for an interrupted or timed-out run (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

/// Migrate pushed tracker records from object storage into the document database.
#[derive(Debug, Parser)]
#[command(name = "rmload-migrator", version)]
struct Args {
    /// Properties file (defaults to ./config.properties when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum objects processed at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Attempts per object before giving up
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Category to migrate; repeat for several (overrides pipeline.categories)
    #[arg(long = "category")]
    categories: Vec<Category>,
}

impl Args {
    fn apply(&self, config: &mut MigratorConfig) {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if !self.categories.is_empty() {
            let mut categories = Vec::new();
            for &category in &self.categories {
                if !categories.contains(&category) {
                    categories.push(category);
                }
            }
            config.categories = categories;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rmload_migrator=debug")),
        )
        .init();

    let args = Args::parse();
    info!("Starting rmload migrator v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load and validate configuration
    // -----------------------------------------------------------------------
    let mut config =
        MigratorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Connect to the object store and open the document database
    // -----------------------------------------------------------------------
    let store = object_store::connect(&config.storage)
        .await
        .context("Failed to connect to object storage")?;

    let db = Database::open_at(&config.docstore_path).with_context(|| {
        format!(
            "Failed to open document database at {}",
            config.docstore_path.display()
        )
    })?;
    info!(path = ?db.path(), "Document database ready");
    let sink = Arc::new(SqliteDocumentSink::new(db));

    let pipeline = Pipeline::new(store, sink, PipelineSettings::from(&config));

    // -----------------------------------------------------------------------
    // 4. Run until done, interrupted, or out of time
    // -----------------------------------------------------------------------
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id);
    let run = pipeline.run(&config.categories).instrument(span);

    let deadline = async {
        match config.deadline {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    // Dropping the run future drops its JoinSet, which aborts in-flight tasks.
    let report = tokio::select! {
        report = run => report,
        _ = tokio::signal::ctrl_c() => {
            warn!(%run_id, "Received Ctrl+C, aborting run");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        _ = deadline => {
            warn!(%run_id, "Run deadline reached, aborting run");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    for &category in &config.categories {
        let counts = report.counts(category);
        info!(
            %category,
            succeeded = counts.succeeded,
            exhausted = counts.exhausted,
            "Category summary"
        );
    }
    for exhausted in &report.exhausted {
        error!(
            category = %exhausted.category,
            key = %exhausted.key,
            attempts = exhausted.attempts,
            stage = %exhausted.stage,
            error = %exhausted.error,
            "Object not migrated"
        );
    }
    for failure in &report.list_failures {
        error!(
            category = %failure.category,
            prefix = %failure.prefix,
            error = %failure.error,
            "Category not listed"
        );
    }

    if report.is_clean() {
        info!(%run_id, succeeded = report.succeeded(), "Migration complete");
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(
            %run_id,
            succeeded = report.succeeded(),
            exhausted = report.exhausted(),
            list_failures = report.list_failures.len(),
            panicked = report.panicked,
            "Migration finished with failures"
        );
        Ok(ExitCode::FAILURE)
    }
}
