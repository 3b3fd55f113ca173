//! TaskStore port - 永続化の正本
//!
//! Implementations own the storage format; the entity, the engine and the
//! facade only go through this trait. Every method is async and object safe
//! (`Arc<dyn TaskStore>` works).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::info;

use super::filter::{Pagination, TaskFilter};
use crate::domain::{ProcessorId, QueueError, Task, TaskId, timexpr};

/// Effective pagination of a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PageInfo {
    pub per_page: u32,
    pub page: u32,
    pub pages: u32,
}

/// Search result: tasks keyed (and therefore ordered) by id.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPage {
    pub tasks: BTreeMap<TaskId, Task>,
    pub pagination: PageInfo,
}

/// Outcome of [`TaskStore::purge_expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PurgeReport {
    pub cutoff: DateTime<Utc>,
    /// Number of root tasks removed (children not counted).
    pub deleted: usize,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Current time as seen by the store.
    fn now(&self) -> DateTime<Utc>;

    /// Task with its parent chain resolved.
    async fn load_by_id(&self, id: TaskId) -> Result<Option<Task>, QueueError>;

    /// `None` pagination returns every match in one page.
    async fn search(
        &self,
        filter: &TaskFilter,
        pagination: Option<Pagination>,
    ) -> Result<TaskPage, QueueError>;

    /// Processing-by-`processor_id` first, then the lowest-id Pending task.
    async fn next_claimable(
        &self,
        processor_id: &ProcessorId,
        queue_group: &str,
    ) -> Result<Option<Task>, QueueError>;

    /// Lowest-id direct child; with `claimable_only` just Pending/Processing
    /// children, Processing first.
    async fn next_child(&self, parent: &Task, claimable_only: bool)
    -> Result<Option<Task>, QueueError>;

    /// Insert or update `task` and its resolved parent chain. Generated ids
    /// are written back into the chain.
    async fn save(&self, task: &mut Task) -> Result<TaskId, QueueError>;

    /// Remove the task's own row. `false` when nothing was deleted.
    async fn delete(&self, task: &Task) -> Result<bool, QueueError>;

    /// Done/Failed root tasks created before `cutoff`, oldest first.
    async fn expired_roots(&self, cutoff: DateTime<Utc>) -> Result<Vec<Task>, QueueError>;

    /// Move `task` to Processing for `processor_id` only if the stored row is
    /// still Pending, or Processing for the same processor.
    async fn try_claim(&self, task: &mut Task, processor_id: &ProcessorId)
    -> Result<bool, QueueError>;

    /// Delete expired finished trees. `before` is a time expression; a
    /// future instant is mirrored into the past ("4 days" = 4 days ago).
    async fn purge_expired(&self, before: &str) -> Result<PurgeReport, QueueError> {
        let cutoff = purge_cutoff(before, self.now())?;
        let mut deleted = 0;
        for mut root in self.expired_roots(cutoff).await? {
            root.delete(self).await?;
            if root.id().is_none() {
                deleted += 1;
            }
        }
        info!(cutoff = %timexpr::format(cutoff), deleted, "purged expired tasks");
        Ok(PurgeReport { cutoff, deleted })
    }
}

/// Resolve a purge expression; instants after `now` are reflected around it.
///
/// The reflection keeps the elapsed duration, not the calendar step: on
/// Oct 10 "1 month" spans the 31 days to Nov 10, so the cutoff is Sep 9
/// (while "-1 month" resolves to Sep 10).
pub fn purge_cutoff(before: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, QueueError> {
    let resolved = timexpr::resolve(before, now)?;
    if resolved > now {
        Ok(now - (resolved - now))
    } else {
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 10, 10, 12, 0, 0).unwrap()
    }

    #[rstest]
    #[case::relative_future("4 days", Utc.with_ymd_and_hms(2016, 10, 6, 12, 0, 0).unwrap())]
    #[case::relative_past("-4 days", Utc.with_ymd_and_hms(2016, 10, 6, 12, 0, 0).unwrap())]
    #[case::absolute_past("2016-10-04", Utc.with_ymd_and_hms(2016, 10, 4, 0, 0, 0).unwrap())]
    #[case::absolute_future("2016-10-11 12:00:00", Utc.with_ymd_and_hms(2016, 10, 9, 12, 0, 0).unwrap())]
    #[case::month_mirrors_duration("1 month", Utc.with_ymd_and_hms(2016, 9, 9, 12, 0, 0).unwrap())]
    #[case::month_past_is_calendar("-1 month", Utc.with_ymd_and_hms(2016, 9, 10, 12, 0, 0).unwrap())]
    fn cutoff_is_never_in_the_future(#[case] expr: &str, #[case] expected: DateTime<Utc>) {
        assert_eq!(purge_cutoff(expr, now()).unwrap(), expected);
    }

    #[test]
    fn unparsable_cutoff_is_invalid_argument() {
        let err = purge_cutoff("sometime", now()).unwrap_err();
        assert!(matches!(err, QueueError::InvalidArgument(_)));
    }
}
