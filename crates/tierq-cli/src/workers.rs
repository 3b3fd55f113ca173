//! Built-in workers so the queue can be driven end to end from the shell.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use tierq_core::app::RegistryError;
use tierq_core::{Task, TaskWorker, WorkerRegistry};

/// Logs the `message` metadata and succeeds.
pub struct EchoWorker;

#[async_trait]
impl TaskWorker for EchoWorker {
    async fn run(&self, task: &mut Task) -> bool {
        let message = task
            .meta("message")
            .map(|value| match value.as_str() {
                Some(text) => text.to_string(),
                None => value.to_string(),
            })
            .unwrap_or_default();
        info!(task = ?task.id(), %message, "echo");
        true
    }

    async fn child_tasks_completed(&self, task: &mut Task) -> bool {
        !task.child_failed()
    }

    async fn cleanup(&self, task: &mut Task) {
        debug!(task = ?task.id(), status = %task.status(), "echo cleanup");
    }
}

/// Always reports failure.
pub struct FailWorker;

#[async_trait]
impl TaskWorker for FailWorker {
    async fn run(&self, task: &mut Task) -> bool {
        info!(task = ?task.id(), attempt = task.times_executed(), "fail");
        false
    }

    async fn child_tasks_completed(&self, _task: &mut Task) -> bool {
        false
    }

    async fn cleanup(&self, _task: &mut Task) {}
}

pub fn builtin_registry() -> Result<WorkerRegistry, RegistryError> {
    let mut registry = WorkerRegistry::new();
    registry.register("echo", Arc::new(EchoWorker))?;
    registry.register("fail", Arc::new(FailWorker))?;
    Ok(registry)
}
