//! Task entity: status machine, parent linkage, metadata, record mapping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::errors::{QueueError, StorageError};
use super::ids::TaskId;
use super::record::TaskRecord;
use super::state::TaskStatus;
use super::timexpr;
use crate::ports::TaskStore;

/// Queue group used when none is given.
pub const DEFAULT_QUEUE_GROUP: &str = "default";

/// Key -> value metadata attached to a task.
pub type MetaData = BTreeMap<String, serde_json::Value>;

/// Values a freshly constructed task starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefaults {
    pub queue_group: String,
    pub status: TaskStatus,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            queue_group: DEFAULT_QUEUE_GROUP.to_string(),
            status: TaskStatus::Pending,
        }
    }
}

/// Link from a child to its parent.
///
/// The stored parent id is the source of truth. A store that loads a task
/// resolves the id into an owned snapshot of the whole ancestor chain, which
/// is what status propagation, metadata merging and the recursive save act on.
#[derive(Debug, Clone, PartialEq)]
pub enum ParentLink {
    Unresolved(TaskId),
    Resolved(Box<Task>),
}

impl ParentLink {
    pub fn id(&self) -> Option<TaskId> {
        match self {
            ParentLink::Unresolved(id) => Some(*id),
            ParentLink::Resolved(parent) => parent.id(),
        }
    }
}

/// Where [`Task::set_meta`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaScope {
    /// The task's own metadata.
    Local,
    /// The root task's metadata (visible to the whole tree).
    Global,
}

/// One unit of queued work.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: Option<TaskId>,
    parent: Option<ParentLink>,
    queue_group: String,
    status: TaskStatus,
    processor_id: Option<String>,
    created: DateTime<Utc>,
    first_processed: Option<DateTime<Utc>>,
    last_processed: Option<DateTime<Utc>>,
    times_executed: u32,
    max_executions: u32,
    timeout: Option<DateTime<Utc>>,
    executed: bool,
    child_failed: bool,
    break_on_child_fail: bool,
    worker: String,
    meta_data: MetaData,
}

impl Task {
    /// New task for `worker` in the default queue group, created at `now`.
    pub fn new(worker: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::with_defaults(worker, &TaskDefaults::default(), now)
    }

    /// `now` should come from the same [`Clock`](crate::ports::Clock) the
    /// store uses, otherwise expiry and timeouts compare against another time.
    pub fn with_defaults(
        worker: impl Into<String>,
        defaults: &TaskDefaults,
        now: DateTime<Utc>,
    ) -> Self {
        let queue_group = if defaults.queue_group.is_empty() {
            DEFAULT_QUEUE_GROUP.to_string()
        } else {
            defaults.queue_group.clone()
        };
        Self {
            id: None,
            parent: None,
            queue_group,
            status: defaults.status,
            processor_id: None,
            created: timexpr::truncate(now),
            first_processed: None,
            last_processed: None,
            times_executed: 0,
            max_executions: 0,
            timeout: None,
            executed: false,
            child_failed: false,
            break_on_child_fail: false,
            worker: worker.into(),
            meta_data: MetaData::new(),
        }
    }

    pub fn with_queue_group(mut self, group: impl Into<String>) -> Self {
        self.set_queue_group(group);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta_data.insert(key.into(), value.into());
        self
    }

    pub fn with_max_executions(mut self, max: u32) -> Self {
        self.max_executions = max;
        self
    }

    // ---- accessors ----

    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    /// Resolved parent snapshot, if any.
    pub fn parent(&self) -> Option<&Task> {
        match &self.parent {
            Some(ParentLink::Resolved(parent)) => Some(parent),
            _ => None,
        }
    }

    pub fn parent_mut(&mut self) -> Option<&mut Task> {
        match &mut self.parent {
            Some(ParentLink::Resolved(parent)) => Some(parent.as_mut()),
            _ => None,
        }
    }

    pub fn parent_link(&self) -> Option<&ParentLink> {
        self.parent.as_ref()
    }

    pub fn parent_id(&self) -> Option<TaskId> {
        self.parent.as_ref().and_then(ParentLink::id)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// This task followed by its resolved ancestors, nearest first.
    pub fn lineage(&self) -> impl Iterator<Item = &Task> {
        std::iter::successors(Some(self), |task| task.parent())
    }

    /// Topmost resolved ancestor (or `self`).
    pub fn root(&self) -> &Task {
        self.lineage().last().unwrap_or(self)
    }

    /// Queue group of the root task.
    pub fn queue_group(&self) -> &str {
        &self.root().queue_group
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn processor_id(&self) -> Option<&str> {
        self.processor_id.as_deref()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn first_processed(&self) -> Option<DateTime<Utc>> {
        self.first_processed
    }

    pub fn last_processed(&self) -> Option<DateTime<Utc>> {
        self.last_processed
    }

    pub fn times_executed(&self) -> u32 {
        self.times_executed
    }

    pub fn max_executions(&self) -> u32 {
        self.max_executions
    }

    pub fn timeout(&self) -> Option<DateTime<Utc>> {
        self.timeout
    }

    /// Has the task's own job (as opposed to its children) completed?
    pub fn executed(&self) -> bool {
        self.executed
    }

    pub fn child_failed(&self) -> bool {
        self.child_failed
    }

    pub fn break_on_child_fail(&self) -> bool {
        self.break_on_child_fail
    }

    /// Worker selector.
    pub fn worker(&self) -> &str {
        &self.worker
    }

    pub fn own_meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    /// Effective metadata: the parent's effective metadata overlaid with
    /// this task's own entries.
    pub fn meta_data(&self) -> MetaData {
        let mut merged = self.parent().map(Task::meta_data).unwrap_or_default();
        merged.extend(
            self.meta_data
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        merged
    }

    /// Effective value for one key.
    pub fn meta(&self, key: &str) -> Option<&serde_json::Value> {
        self.lineage().find_map(|task| task.meta_data.get(key))
    }

    // ---- mutators ----

    #[cfg(test)]
    pub(crate) fn set_id(&mut self, id: Option<TaskId>) {
        self.id = id;
    }

    /// Set the status. Re-setting the current value does nothing.
    ///
    /// Entering Pending clears the processor id; every change is reported to
    /// the parent.
    pub fn set_status(&mut self, status: TaskStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        if status == TaskStatus::Pending {
            self.processor_id = None;
        }
        if let Some(parent) = self.parent_mut() {
            parent.record_child_status_change(status);
        }
    }

    /// Called on the parent whenever a child's status changes.
    pub fn record_child_status_change(&mut self, child_status: TaskStatus) {
        if child_status != TaskStatus::Failed {
            return;
        }
        self.child_failed = true;
        if self.break_on_child_fail {
            debug!(task = ?self.id, "child failed, breaking parent");
            self.set_status(TaskStatus::Failed);
        }
    }

    pub fn set_processor_id(&mut self, processor_id: Option<String>) {
        self.processor_id = processor_id;
    }

    /// Root tasks only; children keep following the root's group.
    /// An empty group falls back to [`DEFAULT_QUEUE_GROUP`].
    pub fn set_queue_group(&mut self, group: impl Into<String>) {
        if self.parent.is_some() {
            return;
        }
        let group = group.into();
        self.queue_group = if group.is_empty() {
            DEFAULT_QUEUE_GROUP.to_string()
        } else {
            group
        };
    }

    /// Make `parent` this task's parent.
    ///
    /// Fails with `InvalidState` when the parent has not been persisted yet,
    /// or when this task already appears in the parent's lineage.
    pub fn set_parent(&mut self, parent: Task) -> Result<(), QueueError> {
        if parent.id().is_none() {
            return Err(QueueError::InvalidState(
                "parent task has not been saved yet".to_string(),
            ));
        }
        if let Some(own) = self.id
            && parent.lineage().any(|ancestor| ancestor.id == Some(own))
        {
            return Err(QueueError::InvalidState(format!(
                "{own} cannot become its own ancestor"
            )));
        }
        self.parent = Some(ParentLink::Resolved(Box::new(parent)));
        Ok(())
    }

    /// Attach `child` under this task (see [`Task::set_parent`]).
    pub fn attach_child(&self, child: &mut Task) -> Result<(), QueueError> {
        child.set_parent(self.clone())
    }

    /// Resolve `expr` (see [`timexpr`]) against `now`.
    /// `None` disables the timeout.
    pub fn set_timeout(&mut self, expr: Option<&str>, now: DateTime<Utc>) -> Result<(), QueueError> {
        self.timeout = match expr {
            Some(expr) => Some(timexpr::resolve(expr, now)?),
            None => None,
        };
        Ok(())
    }

    pub fn set_timeout_at(&mut self, at: Option<DateTime<Utc>>) {
        self.timeout = at.map(timexpr::truncate);
    }

    pub fn set_max_executions(&mut self, max: u32) {
        self.max_executions = max;
    }

    pub fn set_executed(&mut self, executed: bool) {
        self.executed = executed;
    }

    pub fn set_break_on_child_fail(&mut self, brk: bool) {
        self.break_on_child_fail = brk;
    }

    /// Write one metadata entry. `Global` writes go to the root task.
    pub fn set_meta(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
        scope: MetaScope,
    ) {
        if scope == MetaScope::Global
            && let Some(parent) = self.parent_mut()
        {
            parent.set_meta(key, value, scope);
            return;
        }
        self.meta_data.insert(key.into(), value.into());
    }

    /// Stamp last-processed (and first-processed, once).
    pub fn touch_processed(&mut self, now: DateTime<Utc>) {
        let now = timexpr::truncate(now);
        self.last_processed = Some(now);
        if self.first_processed.is_none() {
            self.first_processed = Some(now);
        }
    }

    pub fn increment_times_executed(&mut self) {
        self.times_executed = self.times_executed.saturating_add(1);
    }

    // ---- record mapping ----

    pub fn to_record(&self) -> TaskRecord {
        let parent_id = self.parent_id();
        TaskRecord {
            id: self.id,
            parent_id,
            queue_group: match parent_id {
                Some(_) => None,
                None => Some(self.queue_group.clone()),
            },
            status: self.status,
            processor_id: self.processor_id.clone(),
            created: self.created,
            first_processed: self.first_processed,
            last_processed: self.last_processed,
            times_executed: self.times_executed,
            max_executions: self.max_executions,
            timeout: self.timeout,
            executed: self.executed,
            child_failed: self.child_failed,
            break_on_child_fail: self.break_on_child_fail,
            task_worker_class: self.worker.clone(),
            meta_data: serde_json::to_string(&self.meta_data).unwrap_or_else(|_| "{}".to_string()),
        }
    }

    /// Rebuild a task from its record. A stored parent id stays unresolved.
    pub fn from_record(record: TaskRecord) -> Result<Self, QueueError> {
        let meta_data = if record.meta_data.trim().is_empty() {
            MetaData::new()
        } else {
            serde_json::from_str(&record.meta_data).map_err(StorageError::from)?
        };
        let queue_group = record
            .queue_group
            .filter(|group| !group.is_empty())
            .unwrap_or_else(|| DEFAULT_QUEUE_GROUP.to_string());

        Ok(Self {
            id: record.id,
            parent: record.parent_id.map(ParentLink::Unresolved),
            queue_group,
            status: record.status,
            processor_id: record.processor_id,
            created: record.created,
            first_processed: record.first_processed,
            last_processed: record.last_processed,
            times_executed: record.times_executed,
            max_executions: record.max_executions,
            timeout: record.timeout,
            executed: record.executed,
            child_failed: record.child_failed,
            break_on_child_fail: record.break_on_child_fail,
            worker: record.task_worker_class,
            meta_data,
        })
    }

    /// Build a task from `records` = [task, parent, grandparent, ...],
    /// resolving each parent link along the way.
    pub fn from_lineage(records: Vec<TaskRecord>) -> Result<Option<Self>, QueueError> {
        let mut resolved: Option<Task> = None;
        for record in records.into_iter().rev() {
            let mut task = Task::from_record(record)?;
            if let Some(parent) = resolved.take()
                && task.parent_id().is_some()
                && task.parent_id() == parent.id()
            {
                task.parent = Some(ParentLink::Resolved(Box::new(parent)));
            }
            resolved = Some(task);
        }
        Ok(resolved)
    }

    /// Records for this task and every resolved ancestor, nearest first.
    pub fn lineage_records(&self) -> Vec<TaskRecord> {
        self.lineage().map(Task::to_record).collect()
    }

    /// Hand out ids (nearest first) to this task and its ancestors.
    pub(crate) fn assign_lineage_ids(&mut self, ids: &[TaskId]) {
        let mut current = Some(self);
        for id in ids {
            let Some(task) = current else { break };
            task.id = Some(*id);
            current = task.parent_mut();
        }
    }

    /// Walk `levels` resolved parents up and return that ancestor.
    pub fn into_ancestor(self, levels: usize) -> Option<Task> {
        let mut current = self;
        for _ in 0..levels {
            match current.parent {
                Some(ParentLink::Resolved(parent)) => current = *parent,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Delete every stored descendant (depth-first, oldest id first) and
    /// then this task's own record. The id is cleared once the own record
    /// is gone.
    pub async fn delete<S>(&mut self, store: &S) -> Result<(), QueueError>
    where
        S: TaskStore + ?Sized,
    {
        if self.id.is_none() {
            return Ok(());
        }

        // post-order: keep descending into the oldest child, delete leaves
        let mut stack: Vec<Task> = Vec::new();
        loop {
            let top = stack.last().unwrap_or(&*self);
            match store.next_child(top, false).await? {
                Some(child) => stack.push(child),
                None => match stack.pop() {
                    Some(leaf) => {
                        store.delete(&leaf).await?;
                    }
                    None => break,
                },
            }
        }

        if store.delete(self).await? {
            self.id = None;
        } else {
            debug!(task = ?self.id, "record already gone");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixed_now;
    use chrono::TimeZone;
    use serde_json::json;

    fn saved(worker: &str, id: i64) -> Task {
        let mut task = Task::new(worker, fixed_now());
        task.set_id(Some(TaskId::new(id)));
        task
    }

    #[test]
    fn new_task_starts_with_defaults() {
        let task = Task::new("echo", fixed_now());
        assert_eq!(task.id(), None);
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.queue_group(), DEFAULT_QUEUE_GROUP);
        assert_eq!(task.worker(), "echo");
        assert_eq!(task.times_executed(), 0);
        assert_eq!(task.first_processed(), None);
        assert!(!task.executed());
    }

    #[test]
    fn created_and_relative_timeout_use_the_given_instant() {
        let now = fixed_now();
        let mut task = Task::new("echo", now + chrono::Duration::milliseconds(400));
        assert_eq!(task.created(), now);

        task.set_timeout(Some("+2 hours"), now).unwrap();
        assert_eq!(task.timeout(), Some(now + chrono::Duration::hours(2)));
    }

    #[test]
    fn configured_defaults_apply() {
        let defaults = TaskDefaults {
            queue_group: "mail".into(),
            status: TaskStatus::Processing,
        };
        let task = Task::with_defaults("echo", &defaults, fixed_now());
        assert_eq!(task.queue_group(), "mail");
        assert_eq!(task.status(), TaskStatus::Processing);
    }

    #[test]
    fn setting_same_status_is_a_noop() {
        let mut parent = saved("echo", 1);
        parent.set_break_on_child_fail(true);
        let mut child = saved("echo", 2);
        child.set_parent(parent).unwrap();
        child.set_status(TaskStatus::Failed);
        child.parent_mut().unwrap().set_status(TaskStatus::Processing);

        child.set_processor_id(Some("proc".into()));
        child.set_status(TaskStatus::Failed);

        assert_eq!(child.processor_id(), Some("proc"));
        assert_eq!(child.parent().unwrap().status(), TaskStatus::Processing);
    }

    #[test]
    fn entering_pending_clears_processor() {
        let mut task = Task::new("echo", fixed_now());
        task.set_status(TaskStatus::Processing);
        task.set_processor_id(Some("proc".into()));
        task.set_status(TaskStatus::Pending);
        assert_eq!(task.processor_id(), None);
    }

    #[test]
    fn failed_child_breaks_parent_when_enabled() {
        let mut parent = saved("echo", 1);
        parent.set_break_on_child_fail(true);
        let mut child = Task::new("echo", fixed_now());
        parent.attach_child(&mut child).unwrap();

        child.set_status(TaskStatus::Failed);

        let parent = child.parent().unwrap();
        assert_eq!(parent.status(), TaskStatus::Failed);
        assert!(parent.child_failed());
    }

    #[test]
    fn failed_child_only_flags_parent_when_disabled() {
        let parent = saved("echo", 1);
        let mut child = Task::new("echo", fixed_now());
        parent.attach_child(&mut child).unwrap();

        child.set_status(TaskStatus::Failed);

        let parent = child.parent().unwrap();
        assert_eq!(parent.status(), TaskStatus::Pending);
        assert!(parent.child_failed());
    }

    #[test]
    fn failure_propagates_up_the_chain() {
        let mut root = saved("echo", 1);
        root.set_break_on_child_fail(true);
        let mut middle = saved("echo", 2);
        middle.set_break_on_child_fail(true);
        middle.set_parent(root).unwrap();
        let mut leaf = Task::new("echo", fixed_now());
        leaf.set_parent(middle).unwrap();

        leaf.set_status(TaskStatus::Failed);

        let statuses: Vec<_> = leaf.lineage().map(Task::status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Failed, TaskStatus::Failed, TaskStatus::Failed]
        );
    }

    #[test]
    fn non_failure_changes_do_not_touch_parent() {
        let parent = saved("echo", 1);
        let mut child = Task::new("echo", fixed_now());
        parent.attach_child(&mut child).unwrap();
        child.set_status(TaskStatus::Done);
        assert!(!child.parent().unwrap().child_failed());
    }

    #[test]
    fn attaching_to_unsaved_parent_fails() {
        let parent = Task::new("echo", fixed_now());
        let mut child = Task::new("echo", fixed_now());
        let err = parent.attach_child(&mut child).unwrap_err();
        assert!(matches!(err, QueueError::InvalidState(_)));
        assert!(child.is_root());
    }

    #[test]
    fn task_cannot_parent_itself() {
        let mut task = saved("echo", 7);
        let copy = task.clone();
        let err = task.set_parent(copy).unwrap_err();
        assert!(matches!(err, QueueError::InvalidState(_)));
    }

    #[test]
    fn ancestor_cannot_become_child() {
        let root = saved("echo", 1);
        let mut child = saved("echo", 2);
        child.set_parent(root.clone()).unwrap();
        let mut root = root;
        let err = root.set_parent(child).unwrap_err();
        assert!(matches!(err, QueueError::InvalidState(_)));
    }

    #[test]
    fn child_follows_root_queue_group() {
        let parent = saved("echo", 1).with_queue_group("reports");
        let mut child = Task::new("echo", fixed_now()).with_queue_group("other");
        parent.attach_child(&mut child).unwrap();
        child.set_queue_group("ignored");
        assert_eq!(child.queue_group(), "reports");
        assert_eq!(child.to_record().queue_group, None);
    }

    #[test]
    fn empty_queue_group_falls_back_to_default() {
        let task = Task::new("echo", fixed_now()).with_queue_group("");
        assert_eq!(task.queue_group(), DEFAULT_QUEUE_GROUP);
    }

    #[test]
    fn effective_metadata_merges_parent_first() {
        let parent = saved("echo", 1)
            .with_meta("file", "a.csv")
            .with_meta("owner", "ops");
        let mut child = Task::new("echo", fixed_now())
            .with_meta("file", "b.csv")
            .with_meta("row", 3);
        parent.attach_child(&mut child).unwrap();

        let merged = child.meta_data();
        assert_eq!(merged["file"], json!("b.csv"));
        assert_eq!(merged["owner"], json!("ops"));
        assert_eq!(merged["row"], json!(3));
        assert_eq!(child.meta("owner"), Some(&json!("ops")));
        assert_eq!(child.parent().unwrap().meta_data().len(), 2);
    }

    #[test]
    fn global_meta_writes_land_on_root() {
        let root = saved("echo", 1);
        let mut middle = saved("echo", 2);
        middle.set_parent(root).unwrap();
        let mut leaf = Task::new("echo", fixed_now());
        leaf.set_parent(middle).unwrap();

        leaf.set_meta("seen", true, MetaScope::Global);
        leaf.set_meta("local", 1, MetaScope::Local);

        assert!(leaf.own_meta_data().contains_key("local"));
        assert!(!leaf.own_meta_data().contains_key("seen"));
        assert_eq!(leaf.root().own_meta_data()["seen"], json!(true));
        assert_eq!(leaf.meta("seen"), Some(&json!(true)));
    }

    #[test]
    fn touch_processed_sets_first_only_once() {
        let mut task = Task::new("echo", fixed_now());
        let first = Utc.with_ymd_and_hms(2016, 10, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2016, 10, 2, 8, 0, 0).unwrap();
        task.touch_processed(first);
        task.touch_processed(second);
        assert_eq!(task.first_processed(), Some(first));
        assert_eq!(task.last_processed(), Some(second));
    }

    #[test]
    fn timeout_can_be_set_and_disabled() {
        let mut task = Task::new("echo", fixed_now());
        task.set_timeout(Some("2016-10-10 17:00:00"), fixed_now()).unwrap();
        assert_eq!(
            task.timeout(),
            Some(Utc.with_ymd_and_hms(2016, 10, 10, 17, 0, 0).unwrap())
        );
        task.set_timeout(None, fixed_now()).unwrap();
        assert_eq!(task.timeout(), None);
        assert!(task.set_timeout(Some("at some point"), fixed_now()).is_err());
    }

    #[test]
    fn record_round_trip_is_lossless() {
        let record = TaskRecord {
            id: Some(TaskId::new(9)),
            parent_id: Some(TaskId::new(3)),
            queue_group: None,
            status: TaskStatus::Processing,
            processor_id: Some("proc".into()),
            created: Utc.with_ymd_and_hms(2016, 10, 1, 8, 0, 0).unwrap(),
            first_processed: Some(Utc.with_ymd_and_hms(2016, 10, 2, 8, 0, 0).unwrap()),
            last_processed: None,
            times_executed: 2,
            max_executions: 5,
            timeout: None,
            executed: true,
            child_failed: true,
            break_on_child_fail: false,
            task_worker_class: "echo".into(),
            meta_data: r#"{"Key 1":"Value 1","Key 2":2}"#.into(),
        };

        let task = Task::from_record(record.clone()).unwrap();
        assert_eq!(task.parent_id(), Some(TaskId::new(3)));
        assert_eq!(task.last_processed(), None);
        assert_eq!(task.to_record(), record);
    }

    #[test]
    fn root_round_trip_reproduces_task() {
        let mut task = saved("echo", 4).with_queue_group("test").with_meta("k", "v");
        task.touch_processed(Utc.with_ymd_and_hms(2016, 10, 2, 8, 0, 0).unwrap());
        task.set_timeout_at(Some(Utc.with_ymd_and_hms(2016, 10, 10, 17, 0, 0).unwrap()));

        let back = Task::from_record(task.to_record()).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn corrupt_metadata_is_a_storage_error() {
        let mut record = Task::new("echo", fixed_now()).to_record();
        record.meta_data = "{not json".into();
        let err = Task::from_record(record).unwrap_err();
        assert!(matches!(err, QueueError::Storage(StorageError::MetaData(_))));
    }

    #[test]
    fn lineage_resolves_parent_chain() {
        let grand = saved("echo", 1).with_queue_group("g");
        let mut parent = saved("echo", 2);
        parent.set_parent(grand).unwrap();
        let mut child = saved("echo", 3);
        child.set_parent(parent).unwrap();

        let rebuilt = Task::from_lineage(child.lineage_records()).unwrap().unwrap();
        assert_eq!(rebuilt, child);
        assert_eq!(rebuilt.queue_group(), "g");
        assert_eq!(rebuilt.clone().into_ancestor(2).unwrap().id(), Some(TaskId::new(1)));
        assert!(rebuilt.into_ancestor(3).is_none());
    }

    #[test]
    fn assign_ids_walks_up() {
        let parent = saved("echo", 1);
        let mut child = Task::new("echo", fixed_now());
        child.set_parent(parent).unwrap();
        child.assign_lineage_ids(&[TaskId::new(5), TaskId::new(1)]);
        assert_eq!(child.id(), Some(TaskId::new(5)));
        assert_eq!(child.parent_id(), Some(TaskId::new(1)));
    }
}
