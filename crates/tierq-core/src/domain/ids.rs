//! Domain identifiers (strongly-typed IDs).
//!
//! - `TaskId` は store が採番する整数 ID。昇順 = 作成順なので "lowest id" の
//!   選択規則（next_claimable, next_child, delete の順序）がそのまま使える。
//! - `ProcessorId` は task を claim する processor の名前。生成する場合は ULID。

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use super::errors::QueueError;

/// Identifier of a stored task.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Longest processor id accepted by [`ProcessorId::parse`].
pub const MAX_PROCESSOR_ID_LEN: usize = 64;

/// Name of a processor claiming tasks.
///
/// Only constructible through [`ProcessorId::parse`] or
/// [`ProcessorId::generate`], so a value in hand is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProcessorId(String);

impl ProcessorId {
    /// Validate a processor id: non-empty, no whitespace, at most
    /// [`MAX_PROCESSOR_ID_LEN`] characters.
    pub fn parse(raw: impl Into<String>) -> Result<Self, QueueError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(QueueError::InvalidArgument(
                "processor id must not be empty".to_string(),
            ));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(QueueError::InvalidArgument(format!(
                "processor id must not contain whitespace: {raw:?}"
            )));
        }
        if raw.chars().count() > MAX_PROCESSOR_ID_LEN {
            return Err(QueueError::InvalidArgument(format!(
                "processor id longer than {MAX_PROCESSOR_ID_LEN} characters"
            )));
        }
        Ok(Self(raw))
    }

    /// A fresh `proc-<ULID>` id.
    pub fn generate() -> Self {
        Self(format!("proc-{}", Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ProcessorId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ProcessorId::parse(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for ProcessorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn task_ids_order_by_value() {
        let a = TaskId::new(1);
        let b = TaskId::new(2);
        assert!(a < b);
        assert_eq!(a.to_string(), "task-1");
        assert_eq!(b.get(), 2);
    }

    #[test]
    fn task_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&TaskId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TaskId::new(42));
    }

    #[rstest]
    #[case::empty("")]
    #[case::space("proc 1")]
    #[case::tab("proc\t1")]
    #[case::too_long(&"p".repeat(MAX_PROCESSOR_ID_LEN + 1))]
    fn malformed_processor_ids_are_rejected(#[case] raw: &str) {
        let err = ProcessorId::parse(raw).unwrap_err();
        assert!(matches!(err, QueueError::InvalidArgument(_)));
    }

    #[test]
    fn generated_processor_ids_are_valid_and_unique() {
        let a = ProcessorId::generate();
        let b = ProcessorId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("proc-"));
        assert_eq!(ProcessorId::parse(a.as_str()).unwrap(), a);
    }

    #[test]
    fn processor_id_deserialization_validates() {
        assert!(serde_json::from_str::<ProcessorId>("\"worker-1\"").is_ok());
        assert!(serde_json::from_str::<ProcessorId>("\"\"").is_err());
    }
}
