//! Queue facade: enqueue, hand out work, expire finished trees.

use std::sync::Arc;
use tracing::info;

use super::config::QueueConfig;
use crate::domain::{ProcessorId, QueueError, Task, TaskDefaults, TaskId};
use crate::ports::{Pagination, PurgeReport, TaskFilter, TaskPage, TaskStore};

#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn TaskStore>,
    defaults: TaskDefaults,
}

impl Queue {
    pub fn new(store: Arc<dyn TaskStore>, config: &QueueConfig) -> Self {
        Self {
            store,
            defaults: config.task_defaults(),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// A new, unsaved task carrying the configured defaults, created at the
    /// store's current time.
    pub fn new_task(&self, worker: impl Into<String>) -> Task {
        Task::with_defaults(worker, &self.defaults, self.store.now())
    }

    /// Save a new or updated task (and its parent chain).
    pub async fn enqueue(&self, task: &mut Task) -> Result<TaskId, QueueError> {
        let id = self.store.save(task).await?;
        info!(task = %id, worker = task.worker(), group = task.queue_group(), "enqueued");
        Ok(id)
    }

    /// Next claimable task for `processor_id`. `None` group means the
    /// configured default group.
    pub async fn next_task(
        &self,
        processor_id: &str,
        queue_group: Option<&str>,
    ) -> Result<Option<Task>, QueueError> {
        let (processor_id, queue_group) = self.validate(processor_id, queue_group)?;
        self.store.next_claimable(&processor_id, queue_group).await
    }

    /// Like [`Queue::next_task`], but only returns a task this processor
    /// actually won through a conditional claim. Retries when another
    /// processor claimed the candidate first.
    pub async fn claim_next(
        &self,
        processor_id: &str,
        queue_group: Option<&str>,
    ) -> Result<Option<Task>, QueueError> {
        let (processor_id, queue_group) = self.validate(processor_id, queue_group)?;
        while let Some(mut task) = self.store.next_claimable(&processor_id, queue_group).await? {
            if self.store.try_claim(&mut task, &processor_id).await? {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    /// Purge expired Done/Failed roots (see [`TaskStore::purge_expired`]).
    pub async fn cleanup(&self, expired_before: &str) -> Result<PurgeReport, QueueError> {
        self.store.purge_expired(expired_before).await
    }

    pub async fn find(
        &self,
        filter: &TaskFilter,
        pagination: Option<Pagination>,
    ) -> Result<TaskPage, QueueError> {
        self.store.search(filter, pagination).await
    }

    pub async fn get(&self, id: TaskId) -> Result<Option<Task>, QueueError> {
        self.store.load_by_id(id).await
    }

    fn validate<'a>(
        &'a self,
        processor_id: &str,
        queue_group: Option<&'a str>,
    ) -> Result<(ProcessorId, &'a str), QueueError> {
        let processor_id = ProcessorId::parse(processor_id)?;
        let queue_group = queue_group.unwrap_or(&self.defaults.queue_group);
        if queue_group.trim().is_empty() {
            return Err(QueueError::InvalidArgument(
                "queue group must not be empty".to_string(),
            ));
        }
        Ok((processor_id, queue_group))
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue").field("defaults", &self.defaults).finish()
    }
}
