//! Bounded-concurrency retry-and-relocate pipeline.
//!
//! Every listed key becomes one task. A task reads, decodes and writes its
//! record, retrying the whole step with linear backoff, and only after a
//! confirmed write moves the source object under the processed prefix.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rmload_shared::{decode, Category, DocumentSink, IngestError, ObjectStore};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::MigratorConfig;
use crate::report::RunReport;

/// Where in a task a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Read,
    Decode,
    Write,
    Relocate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Read => "read",
            Stage::Decode => "decode",
            Stage::Write => "write",
            Stage::Relocate => "relocate",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub stage: Stage,
    pub error: IngestError,
}

impl Failure {
    fn at(stage: Stage) -> impl FnOnce(IngestError) -> Failure {
        move |error| Failure { stage, error }
    }
}

/// Terminal state of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32, failure: Failure },
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub prefix_root: String,
    pub concurrency: usize,
    pub max_attempts: u32,
    /// Sleep after attempt `n` fails is `n * backoff_unit`.
    pub backoff_unit: Duration,
    pub processed_prefix: String,
}

impl From<&MigratorConfig> for PipelineSettings {
    fn from(config: &MigratorConfig) -> Self {
        Self {
            prefix_root: config.prefix_root.clone(),
            concurrency: config.concurrency,
            max_attempts: config.max_attempts,
            backoff_unit: config.backoff_unit,
            processed_prefix: config.processed_prefix.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn DocumentSink>,
    settings: Arc<PipelineSettings>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn DocumentSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            sink,
            settings: Arc::new(settings),
        }
    }

    /// Read, decode and write `key` once.
    async fn attempt(&self, category: Category, key: &str) -> Result<(), Failure> {
        let bytes = self.store.read(key).await.map_err(Failure::at(Stage::Read))?;
        let envelope = decode(category, key, &bytes).map_err(Failure::at(Stage::Decode))?;
        self.sink
            .write(&envelope)
            .await
            .map_err(Failure::at(Stage::Write))?;
        debug!(%category, key, document = %envelope.document_path(), "Record written");
        Ok(())
    }

    /// Drive `key` to a terminal outcome.
    pub async fn process_one(&self, category: Category, key: &str) -> Outcome {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(category, key).await {
                Ok(()) => break,
                Err(failure) => {
                    warn!(
                        %category,
                        key,
                        attempt,
                        stage = %failure.stage,
                        kind = failure.error.kind(),
                        transient = failure.error.is_transient(),
                        error = %failure.error,
                        "Attempt failed"
                    );
                    if attempt >= max_attempts {
                        error!(
                            %category,
                            key,
                            attempts = attempt,
                            stage = %failure.stage,
                            "Giving up on object"
                        );
                        return Outcome::Exhausted {
                            attempts: attempt,
                            failure,
                        };
                    }
                    sleep(backoff(self.settings.backoff_unit, attempt)).await;
                    attempt += 1;
                }
            }
        }

        let dst = format!("{}{}", self.settings.processed_prefix, key);
        match self.store.relocate(key, &dst).await {
            Ok(()) => {
                info!(%category, key, attempts = attempt, "Object migrated");
                Outcome::Succeeded { attempts: attempt }
            }
            Err(error) => {
                error!(
                    %category,
                    key,
                    dst = %dst,
                    kind = error.kind(),
                    error = %error,
                    "Relocate failed after write"
                );
                Outcome::Exhausted {
                    attempts: attempt,
                    failure: Failure {
                        stage: Stage::Relocate,
                        error,
                    },
                }
            }
        }
    }

    /// Migrate every object under each category's prefix, in category order.
    ///
    /// Returns once every spawned task has finished.
    pub async fn run(&self, categories: &[Category]) -> RunReport {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut report = RunReport::default();

        for &category in categories {
            let prefix = category.prefix(&self.settings.prefix_root);
            let keys = match self.store.list(&prefix).await {
                Ok(keys) => keys,
                Err(e) => {
                    error!(%category, prefix = %prefix, error = %e, "Listing failed, skipping category");
                    report.record_list_failure(category, prefix, &e);
                    continue;
                }
            };
            info!(%category, prefix = %prefix, count = keys.len(), "Listed objects");

            for key in keys {
                // Wait for a free slot before spawning.
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let pipeline = self.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    let outcome = pipeline.process_one(category, &key).await;
                    (category, key, outcome)
                });

                while let Some(joined) = tasks.try_join_next() {
                    collect(&mut report, joined);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            collect(&mut report, joined);
        }

        info!(
            succeeded = report.succeeded(),
            exhausted = report.exhausted(),
            list_failures = report.list_failures.len(),
            panicked = report.panicked,
            "Run finished"
        );
        report
    }
}

/// Linear backoff after attempt `attempt` fails, saturating at `Duration::MAX`.
fn backoff(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(attempt)
}

fn collect(report: &mut RunReport, joined: Result<(Category, String, Outcome), JoinError>) {
    match joined {
        Ok((category, key, outcome)) => report.record(category, key, outcome),
        Err(e) => {
            error!(error = %e, "Task did not complete");
            report.record_panic();
        }
    }
}
