//! Durable search task records and storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::{SqliteTaskStore, DEFAULT_LOG_CAP};
pub use store::{update_progress_with_retry, TaskFilter, TaskStore};
pub use types::{
    CreateTaskRequest, SearchMode, SearchQuery, SearchTask, TaskCounters, TaskError, TaskLogEntry,
    TaskStatus, TaskUpdate,
};
