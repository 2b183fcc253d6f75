//! Core search task data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::FilterConfig;
use crate::ledger::{BillingPolicy, CreditCents};

/// How queries in a batch are interpreted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Each query is a bare name.
    #[default]
    NameOnly,
    /// Each query is a name plus a location.
    NameLocation,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::NameOnly => "name_only",
            SearchMode::NameLocation => "name_location",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name_only" => Some(SearchMode::NameOnly),
            "name_location" => Some(SearchMode::NameLocation),
            _ => None,
        }
    }
}

/// One (name, optional location) query within a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchQuery {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl SearchQuery {
    pub fn name_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }

    pub fn with_location(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: Some(location.into()),
        }
    }
}

/// Current status of a search task.
///
/// Status flow:
/// ```text
/// pending -> running -> {completed | failed | cancelled}
/// pending -> insufficient_credits   (admission rejected, never scheduled)
/// ```
/// Once a task leaves pending it only moves forward; all states other than
/// pending and running are terminal and final.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    InsufficientCredits,
}

impl TaskStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed
                | TaskStatus::Failed
                | TaskStatus::Cancelled
                | TaskStatus::InsufficientCredits
        )
    }

    /// Returns true if the task can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether moving from this status to `next` is a forward transition.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match self {
            TaskStatus::Pending => next != TaskStatus::Pending,
            TaskStatus::Running => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::InsufficientCredits => "insufficient_credits",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "running" => Some(TaskStatus::Running),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            "cancelled" => Some(TaskStatus::Cancelled),
            "insufficient_credits" => Some(TaskStatus::InsufficientCredits),
            _ => None,
        }
    }
}

/// One timestamped entry in a task's bounded log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskLogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl TaskLogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

/// Usage counters accumulated over a task's lifetime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TaskCounters {
    /// Provider search pages consumed.
    pub search_requests_used: u32,
    /// Provider detail fetches performed (cache hits excluded).
    pub detail_requests_used: u32,
    /// Distinct detail links served from the cache.
    pub cache_hits: u32,
    /// Records in the final filtered result set.
    pub total_results: u32,
    /// Metered cost charged to the owner.
    pub credits_used: CreditCents,
}

/// A batch search task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchTask {
    /// Externally shareable identifier (UUID), distinct from row ordering.
    pub id: String,

    /// Account that submitted the batch.
    pub owner_id: String,

    /// How the queries are interpreted.
    pub mode: SearchMode,

    /// Ordered query batch.
    pub queries: Vec<SearchQuery>,

    /// Filter criteria captured at submission time.
    pub filters: FilterConfig,

    /// Billing policy under which the task was admitted.
    pub billing: BillingPolicy,

    /// Current status.
    pub status: TaskStatus,

    /// Progress in percent, non-decreasing while running.
    pub progress_percent: u8,

    /// Usage counters.
    pub counters: TaskCounters,

    /// Bounded execution log, most recent entries kept.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<TaskLogEntry>,

    /// Error or billing-shortfall annotation, set on failed tasks and on
    /// completed tasks whose postpaid deduction fell short.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request to create a new task.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTaskRequest {
    pub owner_id: String,
    pub mode: SearchMode,
    pub queries: Vec<SearchQuery>,
    pub filters: FilterConfig,
    pub billing: BillingPolicy,
}

/// Partial update applied to a running task.
///
/// Only set fields are written; unset fields keep their stored values. The
/// log, when set, replaces the stored log wholesale (the caller owns the
/// authoritative copy while the task runs) and is truncated to the store's
/// cap before persisting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub progress_percent: Option<u8>,
    pub search_requests_used: Option<u32>,
    pub detail_requests_used: Option<u32>,
    pub cache_hits: Option<u32>,
    pub total_results: Option<u32>,
    pub credits_used: Option<CreditCents>,
    pub log: Option<Vec<TaskLogEntry>>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, percent: u8) -> Self {
        self.progress_percent = Some(percent);
        self
    }

    pub fn with_search_requests(mut self, used: u32) -> Self {
        self.search_requests_used = Some(used);
        self
    }

    pub fn with_cache_hits(mut self, hits: u32) -> Self {
        self.cache_hits = Some(hits);
        self
    }

    pub fn with_log(mut self, log: Vec<TaskLogEntry>) -> Self {
        self.log = Some(log);
        self
    }

    /// A copy of this update with the log dropped, for the degraded write
    /// tier when the full write keeps failing.
    pub fn without_log(&self) -> Self {
        Self {
            log: None,
            ..self.clone()
        }
    }

    /// True if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Errors from task store operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task not found.
    #[error("task not found: {0}")]
    NotFound(String),

    /// Attempted a backward status transition.
    #[error("task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}
