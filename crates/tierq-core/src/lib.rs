//! tierq-core
//!
//! Persistent hierarchical task queue: tasks are stored durably, claimed by
//! named processors, executed by pluggable workers, and may spawn child tasks
//! whose completion gates the parent.
//!
//! # モジュール構成
//! - **domain**: Task エンティティ、状態、ID、時刻式、エラー
//! - **ports**: TaskStore / Clock / 検索フィルタ
//! - **app**: 設定、Worker レジストリ、Processor（実行エンジン）、Queue ファサード
//! - **impls**: SQLite 実装

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{DatabaseConfig, Processor, Queue, QueueConfig, TaskWorker, WorkerRegistry};
pub use domain::{MetaScope, ProcessorId, QueueError, Task, TaskId, TaskStatus};
pub use impls::SqliteTaskStore;
pub use ports::{Pagination, TaskFilter, TaskStore};
