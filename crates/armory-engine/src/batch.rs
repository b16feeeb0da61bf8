//! Concurrent batch execution
//!
//! Used for the baseline-dependency phase only: every task is an independent
//! process with its own log sink, all are launched at once with no
//! concurrency cap, and the runner joins on the full set before returning.
//! Completion order across the batch is unspecified; results come back in
//! task order. Per-tool provisioning stays sequential so log attribution and
//! conflict resolution remain simple.

use std::time::Duration;

use armory_core::error::Result;
use armory_core::layout::Layout;
use futures::future::join_all;
use tracing::info;

use crate::exec::{CommandSpec, ExecutionResult, TimeoutExecutor};

/// One independent unit of a batch
#[derive(Debug, Clone)]
pub struct BatchTask {
    /// Names the private log sink for this task
    pub name: String,
    pub command: CommandSpec,
}

impl BatchTask {
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
        }
    }
}

/// Runs a batch of independent installations concurrently
pub struct ParallelGroupRunner {
    executor: TimeoutExecutor,
    layout: Layout,
    timeout: Duration,
}

impl ParallelGroupRunner {
    pub fn new(executor: TimeoutExecutor, layout: Layout, timeout: Duration) -> Self {
        Self {
            executor,
            layout,
            timeout,
        }
    }

    /// Launch every task, join on all, return results in task order
    pub async fn run_batch(&self, tasks: &[BatchTask]) -> Vec<(String, Result<ExecutionResult>)> {
        info!(count = tasks.len(), "running batch");

        join_all(tasks.iter().map(|task| async {
            let log = self.layout.log_path(&task.name, 1);
            let result = self
                .executor
                .execute(&task.command, self.timeout, &log, 1)
                .await;
            (task.name.clone(), result)
        }))
        .await
    }
}
