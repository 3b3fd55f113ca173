//! Queue configuration.
//!
//! Passed explicitly to the store and facade constructors. Deserializable so
//! a binary can load it from TOML; every field has a default except the
//! database location.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::{DEFAULT_QUEUE_GROUP, QueueError, TaskDefaults, TaskStatus};

/// Where tasks are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatabaseConfig {
    Memory,
    File { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub database: Option<DatabaseConfig>,
    pub table_name: String,
    pub default_queue_group: String,
    pub default_task_status: TaskStatus,
    pub default_page_size: u32,
    pub create_schema: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database: None,
            table_name: "queue".to_string(),
            default_queue_group: DEFAULT_QUEUE_GROUP.to_string(),
            default_task_status: TaskStatus::Pending,
            default_page_size: 20,
            create_schema: true,
        }
    }
}

impl QueueConfig {
    pub fn in_memory() -> Self {
        Self {
            database: Some(DatabaseConfig::Memory),
            ..Self::default()
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            database: Some(DatabaseConfig::File { path: path.into() }),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        if !is_identifier(&self.table_name) {
            return Err(QueueError::Configuration(format!(
                "table name must be a plain identifier: {:?}",
                self.table_name
            )));
        }
        if self.default_queue_group.trim().is_empty() {
            return Err(QueueError::Configuration(
                "default queue group must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Storage location, or `Configuration` when none is set.
    pub fn require_database(&self) -> Result<&DatabaseConfig, QueueError> {
        self.database
            .as_ref()
            .ok_or_else(|| QueueError::Configuration("no database configured".to_string()))
    }

    pub fn task_defaults(&self) -> TaskDefaults {
        TaskDefaults {
            queue_group: self.default_queue_group.clone(),
            status: self.default_task_status,
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_documented_values() {
        let config = QueueConfig::default();
        assert_eq!(config.table_name, "queue");
        assert_eq!(config.default_queue_group, "default");
        assert_eq!(config.default_page_size, 20);
        assert!(config.database.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_database_is_a_configuration_error() {
        let err = QueueConfig::default().require_database().unwrap_err();
        assert!(matches!(err, QueueError::Configuration(_)));
    }

    #[rstest]
    #[case::plain("queue", true)]
    #[case::underscored("_tasks_2", true)]
    #[case::digit_first("2tasks", false)]
    #[case::injection("queue; DROP TABLE x", false)]
    #[case::quoted("\"queue\"", false)]
    #[case::empty("", false)]
    fn table_name_must_be_identifier(#[case] name: &str, #[case] ok: bool) {
        let config = QueueConfig {
            table_name: name.to_string(),
            ..QueueConfig::in_memory()
        };
        assert_eq!(config.validate().is_ok(), ok);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: QueueConfig = serde_json::from_str(
            r#"{"database": {"kind": "file", "path": "/tmp/q.db"}, "default_queue_group": "mail"}"#,
        )
        .unwrap();
        assert_eq!(
            config.database,
            Some(DatabaseConfig::File {
                path: PathBuf::from("/tmp/q.db")
            })
        );
        assert_eq!(config.default_queue_group, "mail");
        assert_eq!(config.table_name, "queue");
    }
}
