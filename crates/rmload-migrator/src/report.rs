//! End-of-run summary.

use std::collections::BTreeMap;

use rmload_shared::{Category, IngestError};
use serde::Serialize;

use crate::pipeline::{Outcome, Stage};

/// Per-category tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub succeeded: usize,
    pub exhausted: usize,
}

/// A key that ran out of attempts (or failed to relocate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExhaustedKey {
    pub category: Category,
    pub key: String,
    pub attempts: u32,
    pub stage: Stage,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListFailure {
    pub category: Category,
    pub prefix: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub categories: BTreeMap<Category, CategoryCounts>,
    pub exhausted: Vec<ExhaustedKey>,
    pub list_failures: Vec<ListFailure>,
    pub panicked: usize,
}

impl RunReport {
    pub fn record(&mut self, category: Category, key: String, outcome: Outcome) {
        let counts = self.categories.entry(category).or_default();
        match outcome {
            Outcome::Succeeded { .. } => counts.succeeded += 1,
            Outcome::Exhausted { attempts, failure } => {
                counts.exhausted += 1;
                self.exhausted.push(ExhaustedKey {
                    category,
                    key,
                    attempts,
                    stage: failure.stage,
                    error: failure.error.to_string(),
                });
            }
        }
    }

    pub fn record_list_failure(&mut self, category: Category, prefix: String, error: &IngestError) {
        self.list_failures.push(ListFailure {
            category,
            prefix,
            error: error.to_string(),
        });
    }

    pub fn record_panic(&mut self) {
        self.panicked += 1;
    }

    pub fn succeeded(&self) -> usize {
        self.categories.values().map(|c| c.succeeded).sum()
    }

    pub fn exhausted(&self) -> usize {
        self.categories.values().map(|c| c.exhausted).sum()
    }

    pub fn counts(&self, category: Category) -> CategoryCounts {
        self.categories.get(&category).copied().unwrap_or_default()
    }

    /// True when every listed key was migrated and every listing worked.
    pub fn is_clean(&self) -> bool {
        self.exhausted.is_empty() && self.list_failures.is_empty() && self.panicked == 0
    }
}
