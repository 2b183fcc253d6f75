//! Task store trait and the tiered persistence helper.

use std::time::Duration;

use tracing::warn;

use super::{CreateTaskRequest, SearchTask, TaskCounters, TaskError, TaskStatus, TaskUpdate};
use crate::provider::PersonRecord;

/// Filter for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Filter by owner account.
    pub owner_id: Option<String>,
    /// Filter by status string.
    pub status: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self {
            owner_id: None,
            status: None,
            limit: 50,
            offset: 0,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for task storage backends.
pub trait TaskStore: Send + Sync {
    /// Create a new task in pending status.
    fn create(&self, request: CreateTaskRequest) -> Result<SearchTask, TaskError>;

    /// Get a task by ID.
    fn get(&self, id: &str) -> Result<Option<SearchTask>, TaskError>;

    /// List tasks matching the filter, newest first.
    fn list(&self, filter: &TaskFilter) -> Result<Vec<SearchTask>, TaskError>;

    /// Count tasks matching the filter.
    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError>;

    /// Merge the set fields of `update` into the stored task.
    ///
    /// Unset fields are left untouched. The log is truncated to the store's
    /// cap, keeping the most recent entries.
    fn update_progress(&self, id: &str, update: &TaskUpdate) -> Result<(), TaskError>;

    /// Move the task to a new status, enforcing forward-only transitions.
    ///
    /// Sets `started_at` on the transition to running and `completed_at` on
    /// any transition to a terminal status.
    fn set_status(&self, id: &str, status: TaskStatus) -> Result<SearchTask, TaskError>;

    /// Persist final counters and mark the task completed.
    fn complete(&self, id: &str, counters: &TaskCounters) -> Result<SearchTask, TaskError>;

    /// Mark the task failed with an error message.
    fn fail(&self, id: &str, error_message: &str) -> Result<SearchTask, TaskError>;

    /// Attach an annotation (e.g. a billing shortfall note) without changing
    /// status.
    fn annotate(&self, id: &str, message: &str) -> Result<(), TaskError>;

    /// Replace the task's result set, preserving the given order.
    fn put_results(&self, id: &str, records: &[PersonRecord]) -> Result<(), TaskError>;

    /// Read a page of the task's results in stored order.
    fn results(
        &self,
        id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PersonRecord>, TaskError>;
}

/// Write a progress update with bounded retry, degrading to a log-free write
/// when retries exhaust.
///
/// Losing the log is acceptable; losing status or counters is not, so the
/// reduced write gets the same retry budget. Only when that also fails does
/// the error propagate.
pub async fn update_progress_with_retry(
    store: &dyn TaskStore,
    id: &str,
    update: &TaskUpdate,
    max_attempts: u32,
    backoff: Duration,
) -> Result<(), TaskError> {
    match write_with_retry(store, id, update, max_attempts, backoff).await {
        Ok(()) => Ok(()),
        Err(e) if update.log.is_some() => {
            warn!(task_id = %id, error = %e, "progress write failed, retrying without log");
            write_with_retry(store, id, &update.without_log(), max_attempts, backoff).await
        }
        Err(e) => Err(e),
    }
}

async fn write_with_retry(
    store: &dyn TaskStore,
    id: &str,
    update: &TaskUpdate,
    max_attempts: u32,
    backoff: Duration,
) -> Result<(), TaskError> {
    let mut delay = backoff;
    let mut last_error = None;

    for attempt in 1..=max_attempts.max(1) {
        match store.update_progress(id, update) {
            Ok(()) => return Ok(()),
            // Not-found and invalid-transition never resolve by retrying.
            Err(e @ TaskError::NotFound(_)) | Err(e @ TaskError::InvalidTransition { .. }) => {
                return Err(e)
            }
            Err(e) => {
                if attempt < max_attempts {
                    warn!(task_id = %id, attempt, error = %e, "progress write failed, backing off");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| TaskError::Database("no attempts made".to_string())))
}
