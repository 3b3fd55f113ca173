//! Database schema management.

use rusqlite::Connection;

/// DDL for the task table `table` (already validated as an identifier).
pub(crate) fn schema_sql(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER DEFAULT NULL,
    queue_group VARCHAR(32) DEFAULT NULL,
    status VARCHAR(16) NOT NULL,
    processor_id VARCHAR(64) DEFAULT NULL,
    created DATETIME NOT NULL,
    first_processed DATETIME DEFAULT NULL,
    last_processed DATETIME DEFAULT NULL,
    times_executed SMALLINT NOT NULL DEFAULT 0,
    max_executions SMALLINT NOT NULL DEFAULT 0,
    timeout DATETIME DEFAULT NULL,
    executed TINYINT(1) NOT NULL DEFAULT 0,
    child_failed TINYINT(1) NOT NULL DEFAULT 0,
    break_on_child_fail TINYINT(1) NOT NULL DEFAULT 0,
    task_worker_class VARCHAR(64) NOT NULL,
    meta_data MEDIUMTEXT
);

CREATE INDEX IF NOT EXISTS idx_{table}_claim ON {table}(queue_group, status, id);
CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table}(parent_id, id);
CREATE INDEX IF NOT EXISTS idx_{table}_expiry ON {table}(parent_id, status, created);
"#
    )
}

pub(crate) fn init_schema(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&schema_sql(table))
}
