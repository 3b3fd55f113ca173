//! Processor - 1 タスクを 1 ステップ進める実行エンジン
//!
//! `execute` moves a task forward by exactly one step:
//!
//! 1. claim (processor id, Processing, last-processed) and persist
//! 2. resolve the worker (missing -> Failed + `WorkerNotFound`)
//! 3. timeout check (expired -> Failed + cleanup)
//! 4. own job not executed yet: count the attempt, run the worker or fail
//!    once `max_executions` is exceeded
//! 5. own job executed: advance the next claimable child, or finish the
//!    task through `child_tasks_completed`
//!
//! Step 5 descends iteratively; the caller's task is refreshed afterwards
//! from the child's parent snapshot, so failure propagated by the child is
//! not lost.
//!
//! The task is persisted after every mutation.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::registry::{TaskWorker, WorkerRegistry};
use crate::domain::{ProcessorId, QueueError, Task, TaskId, TaskStatus};
use crate::ports::TaskStore;

enum Step {
    Finished,
    Descend(Task),
}

pub struct Processor {
    id: ProcessorId,
    queue_group: String,
    store: Arc<dyn TaskStore>,
    workers: Arc<WorkerRegistry>,
}

impl Processor {
    pub fn new(
        id: ProcessorId,
        queue_group: impl Into<String>,
        store: Arc<dyn TaskStore>,
        workers: Arc<WorkerRegistry>,
    ) -> Self {
        Self {
            id,
            queue_group: queue_group.into(),
            store,
            workers,
        }
    }

    pub fn id(&self) -> &ProcessorId {
        &self.id
    }

    pub fn queue_group(&self) -> &str {
        &self.queue_group
    }

    /// Advance `task` by one step. On return `task` holds its latest state,
    /// also when a child was the one advanced.
    pub async fn execute(&self, task: &mut Task) -> Result<(), QueueError> {
        let mut current = task.clone();
        let mut depth = 0usize;

        let outcome = loop {
            match self.step(&mut current).await {
                Ok(Step::Finished) => break Ok(()),
                Ok(Step::Descend(child)) => {
                    debug!(parent = ?current.id(), child = ?child.id(), "descending into child");
                    current = child;
                    depth += 1;
                }
                Err(err) => break Err(err),
            }
        };

        if depth == 0 {
            *task = current;
        } else if let Some(refreshed) = current.into_ancestor(depth) {
            *task = refreshed;
        } else if let Some(id) = task.id()
            && let Some(reloaded) = self.store.load_by_id(id).await?
        {
            *task = reloaded;
        }
        outcome
    }

    /// Fetch the next claimable task of this processor's group and execute it.
    pub async fn process_next(&self) -> Result<Option<TaskId>, QueueError> {
        let Some(mut task) = self
            .store
            .next_claimable(&self.id, &self.queue_group)
            .await?
        else {
            return Ok(None);
        };
        let id = task.id();
        self.execute(&mut task).await?;
        Ok(id)
    }

    async fn step(&self, task: &mut Task) -> Result<Step, QueueError> {
        task.set_processor_id(Some(self.id.to_string()));
        task.set_status(TaskStatus::Processing);
        task.touch_processed(self.store.now());
        self.store.save(task).await?;
        debug!(task = ?task.id(), processor = %self.id, "claimed");

        let Some(worker) = self.workers.get(task.worker()) else {
            warn!(task = ?task.id(), worker = task.worker(), "worker not registered");
            task.set_status(TaskStatus::Failed);
            self.store.save(task).await?;
            return Err(QueueError::WorkerNotFound(task.worker().to_string()));
        };

        if let Some(timeout) = task.timeout()
            && task.last_processed().is_some_and(|last| last >= timeout)
        {
            warn!(task = ?task.id(), %timeout, "timed out");
            self.fail_and_clean_up(task, worker.as_ref()).await?;
            return Ok(Step::Finished);
        }

        if !task.executed() {
            task.increment_times_executed();
            self.store.save(task).await?;

            let max = task.max_executions();
            if max == 0 || task.times_executed() <= max {
                if worker.run(task).await {
                    task.set_executed(true);
                }
                self.store.save(task).await?;
                debug!(task = ?task.id(), executed = task.executed(), attempt = task.times_executed(), "worker ran");

                if task.status().is_terminal() {
                    self.clean_up(task, worker.as_ref()).await?;
                }
            } else {
                warn!(task = ?task.id(), max, "max executions exceeded");
                self.fail_and_clean_up(task, worker.as_ref()).await?;
            }
            return Ok(Step::Finished);
        }

        if let Some(child) = self.store.next_child(task, true).await? {
            return Ok(Step::Descend(child));
        }

        let status = if worker.child_tasks_completed(task).await {
            TaskStatus::Done
        } else {
            TaskStatus::Failed
        };
        task.set_status(status);
        self.store.save(task).await?;
        info!(task = ?task.id(), %status, "task finished");
        self.clean_up(task, worker.as_ref()).await?;
        Ok(Step::Finished)
    }

    async fn fail_and_clean_up(&self, task: &mut Task, worker: &dyn TaskWorker) -> Result<(), QueueError> {
        task.set_status(TaskStatus::Failed);
        self.store.save(task).await?;
        self.clean_up(task, worker).await
    }

    async fn clean_up(&self, task: &mut Task, worker: &dyn TaskWorker) -> Result<(), QueueError> {
        worker.cleanup(task).await;
        self.store.save(task).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("id", &self.id)
            .field("queue_group", &self.queue_group)
            .finish()
    }
}
