//! Ports - 抽象化レイヤー
//!
//! Storage backends implement [`TaskStore`]; the engine and facade only see
//! this trait, the [`Clock`] and the filter types.

pub mod clock;
pub mod filter;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::filter::{CompareOp, Field, FilterValue, Pagination, Predicate, TaskFilter};
pub use self::task_store::{PageInfo, PurgeReport, TaskPage, TaskStore};
