//! Worker behavior and its registry.
//!
//! A task names its worker by selector string; the registry maps selectors
//! to shared trait objects (`HashMap<String, Arc<dyn TaskWorker>>`).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::Task;

/// Pluggable task behavior.
///
/// Each callback may mutate the task (status, metadata, ...). The engine
/// persists the task after every callback.
#[async_trait]
pub trait TaskWorker: Send + Sync {
    /// Do the task's own job. `true` marks the job as executed.
    async fn run(&self, task: &mut Task) -> bool;

    /// Called once no claimable child is left. `true` -> Done, `false` -> Failed.
    async fn child_tasks_completed(&self, task: &mut Task) -> bool;

    /// Called after the task reached a terminal status.
    async fn cleanup(&self, task: &mut Task);
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("worker '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default, Clone)]
pub struct WorkerRegistry {
    workers: HashMap<String, Arc<dyn TaskWorker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        selector: impl Into<String>,
        worker: Arc<dyn TaskWorker>,
    ) -> Result<(), RegistryError> {
        let selector = selector.into();
        if self.workers.contains_key(&selector) {
            return Err(RegistryError::AlreadyRegistered(selector));
        }
        self.workers.insert(selector, worker);
        Ok(())
    }

    pub fn get(&self, selector: &str) -> Option<Arc<dyn TaskWorker>> {
        self.workers.get(selector).cloned()
    }

    pub fn selectors(&self) -> Vec<String> {
        let mut selectors: Vec<String> = self.workers.keys().cloned().collect();
        selectors.sort();
        selectors
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("selectors", &self.selectors())
            .finish()
    }
}
