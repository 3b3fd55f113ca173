//! Impls - ports の実装
//!
//! - **SqliteTaskStore**: rusqlite + tokio-rusqlite による TaskStore
//!   (`:memory:` はテストと一時利用向け)

pub mod sqlite;

pub use self::sqlite::SqliteTaskStore;
