//! Parallel reconciliation executor
//!
//! Runs a batch of lifecycle operations, one per resource address, on a
//! bounded thread pool. Tasks own their stores and share nothing mutable, so
//! they run in any order; results come back in submission order.

use crate::controller::{Context, Lifecycle, Operation};
use crate::state::StateFile;
use anyhow::{Context as AnyhowContext, Result, bail};
use declarative::{AttributeStore, Diagnostic, Diagnostics, MemoryStore};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of parallel workers
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// One lifecycle operation on one resource
pub struct Task {
    /// Resource address, e.g. `quota.big`
    pub address: String,
    pub lifecycle: Arc<dyn Lifecycle>,
    pub operation: Operation,
    pub store: MemoryStore,
}

impl Task {
    pub fn new(
        address: impl Into<String>,
        lifecycle: Arc<dyn Lifecycle>,
        operation: Operation,
        store: MemoryStore,
    ) -> Self {
        Self {
            address: address.into(),
            lifecycle,
            operation,
            store,
        }
    }
}

/// Outcome of one task
#[derive(Debug)]
pub struct TaskResult {
    pub address: String,
    pub kind: &'static str,
    pub operation: Operation,
    /// The store after the operation ran
    pub store: MemoryStore,
    pub diagnostics: Diagnostics,
}

impl TaskResult {
    pub fn failed(&self) -> bool {
        self.diagnostics.has_error()
    }
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub read: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Per-address results, in submission order
    pub results: Vec<TaskResult>,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn count(&mut self, result: &TaskResult) {
        if result.failed() {
            self.failed += 1;
            return;
        }
        match result.operation {
            Operation::Create => self.created += 1,
            Operation::Read => self.read += 1,
            Operation::Update => self.updated += 1,
            Operation::Delete => self.deleted += 1,
        }
    }

    /// Every diagnostic, each tagged with its resource
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.results.iter().flat_map(|r| r.diagnostics.iter())
    }

    /// Write successful results into `state`.
    ///
    /// Deleted resources are forgotten. Failed creates that never bound an
    /// identity leave no record; other failures keep whatever the store holds
    /// so a later read can reconcile it.
    pub fn record_into(&self, state: &mut StateFile) {
        for result in &self.results {
            match result.operation {
                Operation::Delete if !result.failed() => {
                    state.forget(&result.address);
                }
                _ if result.store.is_bound() => {
                    state.record(&result.address, result.kind, &result.store);
                }
                _ => {}
            }
        }
    }
}

/// Run every task, at most `opts.jobs` at a time
pub fn execute(tasks: Vec<Task>, ctx: &Context, opts: &ExecuteOptions) -> Result<ExecuteSummary> {
    let mut seen = BTreeSet::new();
    for task in &tasks {
        if !seen.insert(task.address.as_str()) {
            bail!("Resource {} is scheduled more than once", task.address);
        }
    }
    if tasks.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    log::info!(
        "Applying {} resources with {} workers",
        tasks.len(),
        opts.jobs.max(1)
    );
    let results: Vec<TaskResult> = pool.install(|| {
        tasks
            .into_par_iter()
            .map(|task| run_task(task, ctx))
            .collect()
    });

    let mut summary = ExecuteSummary::default();
    for result in &results {
        summary.count(result);
    }
    summary.results = results;

    log::info!(
        "{} created, {} read, {} updated, {} deleted, {} failed",
        summary.created,
        summary.read,
        summary.updated,
        summary.deleted,
        summary.failed
    );
    Ok(summary)
}

fn run_task(task: Task, ctx: &Context) -> TaskResult {
    let Task {
        address,
        lifecycle,
        operation,
        mut store,
    } = task;

    log::debug!("{operation} {address}");
    let diagnostics = lifecycle.apply(operation, ctx, &mut store);
    if diagnostics.has_error() {
        log::warn!("{operation} {address} failed");
    } else {
        log::debug!("{operation} {address} done ({})", store.id());
    }

    TaskResult {
        address,
        kind: lifecycle.kind(),
        operation,
        store,
        diagnostics,
    }
}
