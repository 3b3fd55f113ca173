//! SQLite-backed [`TaskStore`].
//!
//! All statements run on the `tokio-rusqlite` connection thread. Parent
//! chains are resolved inside the same call that found the task, so a
//! loaded task always carries a consistent snapshot of its ancestors.

mod query;
mod rows;
mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params_from_iter};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

use self::query::Statements;
use self::rows::{read_record, record_values};
use crate::app::{DatabaseConfig, QueueConfig};
use crate::domain::{ProcessorId, QueueError, Task, TaskId, TaskRecord, TaskStatus, timexpr};
use crate::ports::{Clock, PageInfo, Pagination, TaskFilter, TaskPage, TaskStore};

pub struct SqliteTaskStore {
    conn: Connection,
    sql: Arc<Statements>,
    default_page_size: u32,
    clock: Arc<dyn Clock>,
}

impl SqliteTaskStore {
    /// Open the configured database, creating the table when
    /// `create_schema` is set.
    pub async fn open(config: QueueConfig, clock: Arc<dyn Clock>) -> Result<Self, QueueError> {
        config.validate()?;
        let conn = match config.require_database()? {
            DatabaseConfig::Memory => Connection::open_in_memory().await?,
            DatabaseConfig::File { path } => Connection::open(path.clone()).await?,
        };

        if config.create_schema {
            let table = config.table_name.clone();
            conn.call(move |conn| Ok(schema::init_schema(conn, &table)?))
                .await?;
        }
        info!(table = %config.table_name, "task store ready");

        Ok(Self {
            conn,
            sql: Arc::new(Statements::new(&config.table_name)),
            default_page_size: config.default_page_size,
            clock,
        })
    }

    /// Run a `SELECT id ...` query and load the first hit with its parents.
    async fn first_match(&self, query: String, params: Vec<Value>) -> Result<Option<Task>, QueueError> {
        let sql = Arc::clone(&self.sql);
        let lineage = self
            .conn
            .call(move |conn| {
                let id: Option<TaskId> = conn
                    .query_row(&query, params_from_iter(params.iter()), |row| row.get(0))
                    .optional()?;
                match id {
                    Some(id) => Ok(load_lineage(conn, &sql, id)?),
                    None => Ok(Vec::new()),
                }
            })
            .await?;
        Task::from_lineage(lineage)
    }
}

/// Records for `id` and its ancestors, nearest first. Stops at a missing
/// parent or at an id already seen.
fn load_lineage(
    conn: &rusqlite::Connection,
    sql: &Statements,
    id: TaskId,
) -> rusqlite::Result<Vec<TaskRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(id);
    while let Some(id) = next {
        if !seen.insert(id) {
            warn!(task = %id, "parent cycle in stored tasks");
            break;
        }
        let Some(record) = conn
            .query_row(&sql.select_by_id, [id], read_record)
            .optional()?
        else {
            break;
        };
        next = record.parent_id;
        records.push(record);
    }
    Ok(records)
}

fn page_count(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 1;
    }
    u32::try_from(total.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX)
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn load_by_id(&self, id: TaskId) -> Result<Option<Task>, QueueError> {
        let sql = Arc::clone(&self.sql);
        let lineage = self
            .conn
            .call(move |conn| Ok(load_lineage(conn, &sql, id)?))
            .await?;
        Task::from_lineage(lineage)
    }

    async fn search(
        &self,
        filter: &TaskFilter,
        pagination: Option<Pagination>,
    ) -> Result<TaskPage, QueueError> {
        let clause = query::compile(filter)?;
        let (per_page, page) = match pagination {
            None => (0, 1),
            Some(p) => (p.per_page.unwrap_or(self.default_page_size), p.page.max(1)),
        };

        let sql = Arc::clone(&self.sql);
        let (total, lineages) = self
            .conn
            .call(move |conn| {
                let total: i64 = conn.query_row(
                    &format!("{}{}", sql.count, clause.sql),
                    params_from_iter(clause.params.iter()),
                    |row| row.get(0),
                )?;

                let mut select = format!("{}{} ORDER BY id ASC", sql.select_ids, clause.sql);
                if per_page > 0 {
                    let offset = u64::from(page - 1) * u64::from(per_page);
                    select.push_str(&format!(" LIMIT {per_page} OFFSET {offset}"));
                }
                let mut stmt = conn.prepare(&select)?;
                let ids = stmt
                    .query_map(params_from_iter(clause.params.iter()), |row| row.get::<_, TaskId>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                drop(stmt);

                let mut lineages = Vec::with_capacity(ids.len());
                for id in ids {
                    lineages.push(load_lineage(conn, &sql, id)?);
                }
                Ok((total, lineages))
            })
            .await?;

        let mut tasks = BTreeMap::new();
        for lineage in lineages {
            if let Some(task) = Task::from_lineage(lineage)?
                && let Some(id) = task.id()
            {
                tasks.insert(id, task);
            }
        }

        let pages = page_count(u64::try_from(total).unwrap_or(0), per_page);
        let per_page = if page > pages { pages } else { per_page };
        debug!(total, page, pages, "search");

        Ok(TaskPage {
            tasks,
            pagination: PageInfo {
                per_page,
                page,
                pages,
            },
        })
    }

    async fn next_claimable(
        &self,
        processor_id: &ProcessorId,
        queue_group: &str,
    ) -> Result<Option<Task>, QueueError> {
        self.first_match(
            self.sql.next_claimable.clone(),
            vec![
                Value::Text(processor_id.to_string()),
                Value::Text(queue_group.to_string()),
            ],
        )
        .await
    }

    async fn next_child(
        &self,
        parent: &Task,
        claimable_only: bool,
    ) -> Result<Option<Task>, QueueError> {
        let Some(parent_id) = parent.id() else {
            return Ok(None);
        };
        let query = if claimable_only {
            self.sql.next_child_claimable.clone()
        } else {
            self.sql.next_child_any.clone()
        };
        self.first_match(query, vec![Value::Integer(parent_id.get())])
            .await
    }

    async fn save(&self, task: &mut Task) -> Result<TaskId, QueueError> {
        let records = task.lineage_records();
        let sql = Arc::clone(&self.sql);
        let ids = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut ids = Vec::with_capacity(records.len());
                for record in &records {
                    let mut values = record_values(record);
                    let id = match record.id {
                        Some(id) => {
                            values.push(Value::Integer(id.get()));
                            tx.execute(&sql.update, params_from_iter(values.iter()))?;
                            id
                        }
                        None => {
                            tx.execute(&sql.insert, params_from_iter(values.iter()))?;
                            TaskId::new(tx.last_insert_rowid())
                        }
                    };
                    ids.push(id);
                }
                tx.commit()?;
                Ok(ids)
            })
            .await?;

        task.assign_lineage_ids(&ids);
        debug!(task = ?task.id(), chain = ids.len(), status = %task.status(), "saved");
        task.id()
            .ok_or_else(|| QueueError::InvalidState("save assigned no id".to_string()))
    }

    async fn delete(&self, task: &Task) -> Result<bool, QueueError> {
        let Some(id) = task.id() else {
            return Ok(false);
        };
        let sql = Arc::clone(&self.sql);
        let changed = self
            .conn
            .call(move |conn| Ok(conn.execute(&sql.delete, [id])?))
            .await?;
        debug!(task = %id, changed, "deleted");
        Ok(changed > 0)
    }

    async fn expired_roots(&self, cutoff: DateTime<Utc>) -> Result<Vec<Task>, QueueError> {
        let sql = Arc::clone(&self.sql);
        let cutoff = timexpr::format(cutoff);
        let lineages = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql.expired_roots)?;
                let ids = stmt
                    .query_map([cutoff], |row| row.get::<_, TaskId>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                drop(stmt);

                let mut lineages = Vec::with_capacity(ids.len());
                for id in ids {
                    lineages.push(load_lineage(conn, &sql, id)?);
                }
                Ok(lineages)
            })
            .await?;

        let mut roots = Vec::with_capacity(lineages.len());
        for lineage in lineages {
            roots.extend(Task::from_lineage(lineage)?);
        }
        Ok(roots)
    }

    async fn try_claim(
        &self,
        task: &mut Task,
        processor_id: &ProcessorId,
    ) -> Result<bool, QueueError> {
        let Some(id) = task.id() else {
            return Err(QueueError::InvalidState(
                "cannot claim a task that was never saved".to_string(),
            ));
        };
        let sql = Arc::clone(&self.sql);
        let owner = processor_id.to_string();
        let changed = self
            .conn
            .call(move |conn| Ok(conn.execute(&sql.try_claim, rusqlite::params![owner, id])?))
            .await?;
        if changed == 0 {
            debug!(task = %id, processor = %processor_id, "claim lost");
            return Ok(false);
        }
        task.set_processor_id(Some(processor_id.to_string()));
        task.set_status(TaskStatus::Processing);
        Ok(true)
    }
}
