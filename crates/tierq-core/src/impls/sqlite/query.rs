//! SQL text for one task table, and filter compilation.
//!
//! Only validated identifiers and fixed keywords are spliced into SQL;
//! every caller-supplied value is a bound parameter.

use rusqlite::types::Value;

use super::rows::select_list;
use crate::domain::QueueError;
use crate::domain::record::COLUMNS;
use crate::domain::timexpr;
use crate::ports::{CompareOp, FilterValue, Predicate, TaskFilter};

const CLAIMABLE_ORDER: &str = "ORDER BY CASE WHEN status = 'processing' THEN 1 ELSE 2 END, id ASC";

/// Prepared SQL for one table.
#[derive(Debug)]
pub(crate) struct Statements {
    pub select_by_id: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
    pub next_claimable: String,
    pub next_child_claimable: String,
    pub next_child_any: String,
    pub expired_roots: String,
    pub try_claim: String,
    pub count: String,
    pub select_ids: String,
}

impl Statements {
    pub fn new(table: &str) -> Self {
        let placeholders = (1..=COLUMNS.len())
            .map(|n| format!("?{n}"))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let id_param = COLUMNS.len() + 1;

        Self {
            select_by_id: format!("SELECT {} FROM {table} WHERE id = ?1", select_list()),
            insert: format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                COLUMNS.join(", ")
            ),
            update: format!("UPDATE {table} SET {assignments} WHERE id = ?{id_param}"),
            delete: format!("DELETE FROM {table} WHERE id = ?1"),
            next_claimable: format!(
                "SELECT id FROM {table} \
                 WHERE (status = 'pending' OR (status = 'processing' AND processor_id = ?1)) \
                 AND queue_group = ?2 {CLAIMABLE_ORDER} LIMIT 1"
            ),
            next_child_claimable: format!(
                "SELECT id FROM {table} \
                 WHERE parent_id = ?1 AND status IN ('pending', 'processing') \
                 {CLAIMABLE_ORDER} LIMIT 1"
            ),
            next_child_any: format!(
                "SELECT id FROM {table} WHERE parent_id = ?1 ORDER BY id ASC LIMIT 1"
            ),
            expired_roots: format!(
                "SELECT id FROM {table} \
                 WHERE (parent_id IS NULL OR parent_id = 0) AND status IN ('done', 'failed') AND created < ?1 \
                 ORDER BY created ASC, id ASC"
            ),
            try_claim: format!(
                "UPDATE {table} SET status = 'processing', processor_id = ?1 \
                 WHERE id = ?2 AND (status = 'pending' OR (status = 'processing' AND processor_id = ?1))"
            ),
            count: format!("SELECT count(id) FROM {table}"),
            select_ids: format!("SELECT id FROM {table}"),
        }
    }
}

/// A compiled `WHERE` clause (empty when the filter is empty).
#[derive(Debug, Default, PartialEq)]
pub(crate) struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

pub(crate) fn bind(value: &FilterValue) -> Value {
    match value {
        FilterValue::Null => Value::Null,
        FilterValue::Bool(b) => Value::Integer(i64::from(*b)),
        FilterValue::Int(i) => Value::Integer(*i),
        FilterValue::Real(r) => Value::Real(*r),
        FilterValue::Text(s) => Value::Text(s.clone()),
        FilterValue::Time(at) => Value::Text(timexpr::format(*at)),
    }
}

fn meta_path(key: &str) -> Result<String, QueueError> {
    if key.is_empty() || key.contains('"') || key.contains('\\') {
        return Err(QueueError::InvalidArgument(format!(
            "unsupported meta_data key: {key:?}"
        )));
    }
    Ok(format!("$.\"{key}\""))
}

/// `lhs op ?` with null-aware equality.
fn comparison(
    lhs: &str,
    op: CompareOp,
    value: &FilterValue,
    params: &mut Vec<Value>,
) -> Result<String, QueueError> {
    if value.is_null() {
        return match op {
            CompareOp::Eq => Ok(format!("{lhs} IS NULL")),
            CompareOp::Ne => Ok(format!("{lhs} IS NOT NULL")),
            other => Err(QueueError::InvalidArgument(format!(
                "cannot compare {lhs} {other} NULL"
            ))),
        };
    }
    params.push(bind(value));
    Ok(format!("{lhs} {} ?{}", op.sql(), params.len()))
}

pub(crate) fn compile(filter: &TaskFilter) -> Result<WhereClause, QueueError> {
    let mut params: Vec<Value> = Vec::new();
    let mut conditions: Vec<String> = Vec::with_capacity(filter.predicates().len());

    for predicate in filter.predicates() {
        let condition = match predicate {
            Predicate::Compare { field, op, value } => {
                comparison(field.column(), *op, value, &mut params)?
            }
            Predicate::In { field, values } => {
                if values.is_empty() {
                    "0 = 1".to_string()
                } else {
                    let mut slots = Vec::with_capacity(values.len());
                    for value in values {
                        params.push(bind(value));
                        slots.push(format!("?{}", params.len()));
                    }
                    format!("{} IN ({})", field.column(), slots.join(", "))
                }
            }
            Predicate::Between { field, low, high } => {
                params.push(bind(low));
                params.push(bind(high));
                format!(
                    "{} BETWEEN ?{} AND ?{}",
                    field.column(),
                    params.len() - 1,
                    params.len()
                )
            }
            Predicate::Meta { key, op, value } => {
                params.push(Value::Text(meta_path(key)?));
                let lhs = format!("json_extract(meta_data, ?{})", params.len());
                comparison(&lhs, *op, value, &mut params)?
            }
        };
        conditions.push(condition);
    }

    if conditions.is_empty() {
        return Ok(WhereClause::default());
    }
    Ok(WhereClause {
        sql: format!(" WHERE {}", conditions.join(" AND ")),
        params,
    })
}
