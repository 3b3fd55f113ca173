//! App - アプリケーション層
//!
//! - **config**: QueueConfig / DatabaseConfig
//! - **registry**: TaskWorker trait と WorkerRegistry
//! - **processor**: 1 ステップ実行エンジン
//! - **queue**: enqueue / next_task / cleanup のファサード

pub mod config;
pub mod processor;
pub mod queue;
pub mod registry;

pub use self::config::{DatabaseConfig, QueueConfig};
pub use self::processor::Processor;
pub use self::queue::Queue;
pub use self::registry::{RegistryError, TaskWorker, WorkerRegistry};
