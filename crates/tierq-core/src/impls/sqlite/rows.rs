//! Row <-> record mapping.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, Value, ValueRef};

use crate::domain::record::COLUMNS;
use crate::domain::timexpr::{self, TimeExprError};
use crate::domain::{TaskId, TaskRecord, TaskStatus};

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for TaskId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.get()))
    }
}

impl FromSql for TaskId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(TaskId::new)
    }
}

/// `id, parent_id, ..., meta_data`
pub(crate) fn select_list() -> String {
    std::iter::once("id")
        .chain(COLUMNS)
        .collect::<Vec<_>>()
        .join(", ")
}

fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => match timexpr::parse_stored(&raw) {
            Some(at) => Ok(Some(at)),
            None => Err(rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                Box::new(TimeExprError::Unrecognized(raw)),
            )),
        },
    }
}

/// Read a row selected with [`select_list`].
pub(crate) fn read_record(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let created = time_at(row, 5)?
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(5, "created".to_string(), Type::Null))?;
    let parent_id: Option<TaskId> = row.get(1)?;

    Ok(TaskRecord {
        id: Some(row.get(0)?),
        parent_id: parent_id.filter(|id| id.get() > 0),
        queue_group: row.get(2)?,
        status: row.get(3)?,
        processor_id: row.get(4)?,
        created,
        first_processed: time_at(row, 6)?,
        last_processed: time_at(row, 7)?,
        times_executed: row.get(8)?,
        max_executions: row.get(9)?,
        timeout: time_at(row, 10)?,
        executed: row.get(11)?,
        child_failed: row.get(12)?,
        break_on_child_fail: row.get(13)?,
        task_worker_class: row.get(14)?,
        meta_data: row.get::<_, Option<String>>(15)?.unwrap_or_default(),
    })
}

/// Bind values for [`COLUMNS`], in order.
pub(crate) fn record_values(record: &TaskRecord) -> Vec<Value> {
    let time = |at: Option<DateTime<Utc>>| at.map_or(Value::Null, |at| Value::Text(timexpr::format(at)));
    let text = |s: &Option<String>| s.clone().map_or(Value::Null, Value::Text);
    let flag = |b: bool| Value::Integer(i64::from(b));

    vec![
        record.parent_id.map_or(Value::Null, |id| Value::Integer(id.get())),
        text(&record.queue_group),
        Value::Text(record.status.as_str().to_string()),
        text(&record.processor_id),
        Value::Text(timexpr::format(record.created)),
        time(record.first_processed),
        time(record.last_processed),
        Value::Integer(i64::from(record.times_executed)),
        Value::Integer(i64::from(record.max_executions)),
        time(record.timeout),
        flag(record.executed),
        flag(record.child_failed),
        flag(record.break_on_child_fail),
        Value::Text(record.task_worker_class.clone()),
        Value::Text(record.meta_data.clone()),
    ]
}
