//! Flat task record: the storage shape of a task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::state::TaskStatus;

/// One row of the task table.
///
/// Design:
/// - Mirrors the stored columns one to one (no resolved parent object).
/// - Optional values stay `None` (JSON `null`) instead of a zero value, so
///   "never processed" and "processed at epoch" remain distinguishable.
/// - `queue_group` is `None` whenever `parent_id` is set; children inherit
///   the root's group.
/// - `meta_data` is the task's *own* metadata as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Option<TaskId>,
    pub parent_id: Option<TaskId>,
    pub queue_group: Option<String>,
    pub status: TaskStatus,
    pub processor_id: Option<String>,
    pub created: DateTime<Utc>,
    pub first_processed: Option<DateTime<Utc>>,
    pub last_processed: Option<DateTime<Utc>>,
    pub times_executed: u32,
    pub max_executions: u32,
    pub timeout: Option<DateTime<Utc>>,
    pub executed: bool,
    pub child_failed: bool,
    pub break_on_child_fail: bool,
    pub task_worker_class: String,
    pub meta_data: String,
}

/// Column list in storage order (without `id`).
pub const COLUMNS: [&str; 15] = [
    "parent_id",
    "queue_group",
    "status",
    "processor_id",
    "created",
    "first_processed",
    "last_processed",
    "times_executed",
    "max_executions",
    "timeout",
    "executed",
    "child_failed",
    "break_on_child_fail",
    "task_worker_class",
    "meta_data",
];

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn absent_values_serialize_as_null() {
        let record = TaskRecord {
            id: None,
            parent_id: None,
            queue_group: Some("default".into()),
            status: TaskStatus::Pending,
            processor_id: None,
            created: Utc.with_ymd_and_hms(2016, 10, 1, 8, 0, 0).unwrap(),
            first_processed: None,
            last_processed: None,
            times_executed: 0,
            max_executions: 0,
            timeout: None,
            executed: false,
            child_failed: false,
            break_on_child_fail: false,
            task_worker_class: "echo".into(),
            meta_data: "{}".into(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert!(value["first_processed"].is_null());
        assert!(value["last_processed"].is_null());
        assert!(value["timeout"].is_null());
        assert!(value["parent_id"].is_null());
        assert_eq!(value["status"], "pending");

        let back: TaskRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
