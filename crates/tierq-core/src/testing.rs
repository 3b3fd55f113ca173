//! Test helpers shared by the inline test modules.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::app::{QueueConfig, TaskWorker};
use crate::domain::Task;
use crate::impls::SqliteTaskStore;
use crate::ports::FixedClock;

pub(crate) const SIMULATE_FAILED_TASK: &str = "simulate_failed_task";
pub(crate) const SIMULATE_FAILED_CHILDREN: &str = "simulate_failed_on_child_tasks_completed";

/// Succeeds unless the task's effective metadata carries one of the
/// `simulate_*` flags. Counts every callback.
#[derive(Debug, Default)]
pub(crate) struct DemoWorker {
    pub runs: AtomicUsize,
    pub completions: AtomicUsize,
    pub cleanups: AtomicUsize,
}

impl DemoWorker {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskWorker for DemoWorker {
    async fn run(&self, task: &mut Task) -> bool {
        self.runs.fetch_add(1, Ordering::SeqCst);
        task.meta(SIMULATE_FAILED_TASK).is_none()
    }

    async fn child_tasks_completed(&self, task: &mut Task) -> bool {
        self.completions.fetch_add(1, Ordering::SeqCst);
        task.meta(SIMULATE_FAILED_CHILDREN).is_none()
    }

    async fn cleanup(&self, _task: &mut Task) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

/// 2016-10-10 12:00:00 UTC.
pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 10, 10, 12, 0, 0).unwrap()
}

pub(crate) fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(fixed_now()))
}

pub(crate) async fn memory_store(clock: Arc<FixedClock>) -> SqliteTaskStore {
    SqliteTaskStore::open(QueueConfig::in_memory(), clock)
        .await
        .unwrap()
}
