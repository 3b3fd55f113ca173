//! Typed search filters.
//!
//! A [`TaskFilter`] is a conjunction of [`Predicate`]s over a closed set of
//! columns ([`Field`]) and metadata keys. Stores compile it into a query with
//! bound parameters; no caller-supplied text ever becomes SQL.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::domain::{QueueError, TaskId, TaskStatus};

/// Filterable task column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    ParentId,
    QueueGroup,
    Status,
    ProcessorId,
    Created,
    FirstProcessed,
    LastProcessed,
    TimesExecuted,
    MaxExecutions,
    Timeout,
    Executed,
    ChildFailed,
    BreakOnChildFail,
    Worker,
}

impl Field {
    pub fn column(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::ParentId => "parent_id",
            Field::QueueGroup => "queue_group",
            Field::Status => "status",
            Field::ProcessorId => "processor_id",
            Field::Created => "created",
            Field::FirstProcessed => "first_processed",
            Field::LastProcessed => "last_processed",
            Field::TimesExecuted => "times_executed",
            Field::MaxExecutions => "max_executions",
            Field::Timeout => "timeout",
            Field::Executed => "executed",
            Field::ChildFailed => "child_failed",
            Field::BreakOnChildFail => "break_on_child_fail",
            Field::Worker => "task_worker_class",
        }
    }
}

impl FromStr for Field {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.trim() {
            "id" => Field::Id,
            "parent_id" => Field::ParentId,
            "queue_group" => Field::QueueGroup,
            "status" => Field::Status,
            "processor_id" => Field::ProcessorId,
            "created" => Field::Created,
            "first_processed" => Field::FirstProcessed,
            "last_processed" => Field::LastProcessed,
            "times_executed" => Field::TimesExecuted,
            "max_executions" => Field::MaxExecutions,
            "timeout" => Field::Timeout,
            "executed" => Field::Executed,
            "child_failed" => Field::ChildFailed,
            "break_on_child_fail" => Field::BreakOnChildFail,
            "worker" | "task_worker_class" => Field::Worker,
            other => {
                return Err(QueueError::InvalidArgument(format!(
                    "unknown filter field: {other:?}"
                )));
            }
        };
        Ok(field)
    }
}

/// Comparison operator. Against [`FilterValue::Null`], `Eq` and `Ne`
/// become `IS NULL` / `IS NOT NULL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CompareOp {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}

impl CompareOp {
    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

impl FromStr for CompareOp {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        let op = match normalized.as_str() {
            "=" | "==" => CompareOp::Eq,
            "!=" | "<>" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            "LIKE" => CompareOp::Like,
            "NOT LIKE" => CompareOp::NotLike,
            _ => {
                return Err(QueueError::InvalidArgument(format!(
                    "unknown comparison operator: {s:?}"
                )));
            }
        };
        Ok(op)
    }
}

/// A bound query value.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    Time(DateTime<Utc>),
}

impl FilterValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Real(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Time(value)
    }
}

impl From<TaskStatus> for FilterValue {
    fn from(value: TaskStatus) -> Self {
        FilterValue::Text(value.as_str().to_string())
    }
}

impl From<TaskId> for FilterValue {
    fn from(value: TaskId) -> Self {
        FilterValue::Int(value.get())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FilterValue::Null, Into::into)
    }
}

impl From<serde_json::Value> for FilterValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FilterValue::Null,
            Value::Bool(b) => FilterValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FilterValue::Int(i),
                None => n.as_f64().map_or(FilterValue::Null, FilterValue::Real),
            },
            Value::String(s) => FilterValue::Text(s),
            other => FilterValue::Text(other.to_string()),
        }
    }
}

/// One condition of a [`TaskFilter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: Field,
        op: CompareOp,
        value: FilterValue,
    },
    In {
        field: Field,
        values: Vec<FilterValue>,
    },
    Between {
        field: Field,
        low: FilterValue,
        high: FilterValue,
    },
    /// Compare one key of the task's own stored metadata.
    Meta {
        key: String,
        op: CompareOp,
        value: FilterValue,
    },
}

/// Conjunction of predicates. The empty filter matches every task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    predicates: Vec<Predicate>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn push(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn eq(self, field: Field, value: impl Into<FilterValue>) -> Self {
        self.compare(field, CompareOp::Eq, value)
    }

    pub fn compare(self, field: Field, op: CompareOp, value: impl Into<FilterValue>) -> Self {
        self.push(Predicate::Compare {
            field,
            op,
            value: value.into(),
        })
    }

    pub fn in_list<I, V>(self, field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        self.push(Predicate::In {
            field,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// `IN` from a comma separated string, e.g. `"pending, processing"`.
    pub fn in_csv(self, field: Field, csv: &str) -> Self {
        let values: Vec<FilterValue> = csv
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(FilterValue::from)
            .collect();
        self.push(Predicate::In { field, values })
    }

    pub fn between(
        self,
        field: Field,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        self.push(Predicate::Between {
            field,
            low: low.into(),
            high: high.into(),
        })
    }

    pub fn meta(self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.meta_compare(key, CompareOp::Eq, value)
    }

    pub fn meta_compare(
        self,
        key: impl Into<String>,
        op: CompareOp,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.push(Predicate::Meta {
            key: key.into(),
            op,
            value: value.into(),
        })
    }
}

/// Requested page. `per_page: None` falls back to the store's configured
/// page size; `Some(0)` returns everything in one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: Option<u32>,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page: Some(per_page),
        }
    }

    pub fn all() -> Self {
        Self::new(1, 0)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("=", CompareOp::Eq)]
    #[case("<>", CompareOp::Ne)]
    #[case(">=", CompareOp::Ge)]
    #[case("like", CompareOp::Like)]
    #[case("not   LIKE", CompareOp::NotLike)]
    fn parses_operators(#[case] raw: &str, #[case] expected: CompareOp) {
        assert_eq!(raw.parse::<CompareOp>().unwrap(), expected);
    }

    #[test]
    fn unknown_operator_is_invalid_argument() {
        let err = "; DROP TABLE queue".parse::<CompareOp>().unwrap_err();
        assert!(matches!(err, QueueError::InvalidArgument(_)));
    }

    #[test]
    fn field_names_map_to_columns() {
        assert_eq!("worker".parse::<Field>().unwrap().column(), "task_worker_class");
        assert_eq!(Field::QueueGroup.column(), "queue_group");
        assert!("meta_data".parse::<Field>().is_err());
    }

    #[test]
    fn csv_lists_are_trimmed() {
        let filter = TaskFilter::new().in_csv(Field::Status, "pending , processing,");
        assert_eq!(
            filter.predicates(),
            &[Predicate::In {
                field: Field::Status,
                values: vec!["pending".into(), "processing".into()],
            }]
        );
    }

    #[test]
    fn builder_keeps_order() {
        let filter = TaskFilter::new()
            .eq(Field::QueueGroup, "default")
            .eq(Field::Status, TaskStatus::Pending)
            .meta("Key 1", "Value 1");
        assert_eq!(filter.predicates().len(), 3);
        assert!(matches!(filter.predicates()[2], Predicate::Meta { ref key, .. } if key == "Key 1"));
    }

    #[rstest]
    #[case::null(json!(null), FilterValue::Null)]
    #[case::bool(json!(true), FilterValue::Bool(true))]
    #[case::int(json!(3), FilterValue::Int(3))]
    #[case::real(json!(1.5), FilterValue::Real(1.5))]
    #[case::text(json!("x"), FilterValue::Text("x".into()))]
    fn json_values_convert(#[case] raw: serde_json::Value, #[case] expected: FilterValue) {
        assert_eq!(FilterValue::from(raw), expected);
    }
}
