//! Domain model (ids, status, task entity, records, time expressions).
//!
//! - ids / state: 値オブジェクト
//! - task: 親子関係とメタデータを持つ Task エンティティ
//! - record: 永続化用のフラットな行表現
//! - timexpr: timeout / cleanup に使う自由形式の時刻式

pub mod errors;
pub mod ids;
pub mod record;
pub mod state;
pub mod task;
pub mod timexpr;

pub use errors::{QueueError, StorageError};
pub use ids::{ProcessorId, TaskId};
pub use record::TaskRecord;
pub use state::TaskStatus;
pub use task::{DEFAULT_QUEUE_GROUP, MetaData, MetaScope, ParentLink, Task, TaskDefaults};
