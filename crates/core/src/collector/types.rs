//! Collector request and error types.

use thiserror::Error;

use crate::cache::CacheError;
use crate::filter::FilterConfig;
use crate::ledger::{CreditCents, LedgerError};
use crate::provider::ProviderError;
use crate::task::{SearchMode, SearchQuery, TaskError};

/// A batch submission handed to the collector.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Account that owns the task and pays for it.
    pub owner_id: String,
    /// How the queries are interpreted.
    pub mode: SearchMode,
    /// Ordered query batch.
    pub queries: Vec<SearchQuery>,
    /// Filter criteria; unset fields get product defaults.
    pub filters: Option<FilterConfig>,
}

/// Cost bounds computed at admission time from the batch size and price table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostEstimate {
    /// Cost if every subtask consumes one search page and nothing else.
    pub minimum: CreditCents,
    /// Cost if every subtask consumes the full page and candidate budget.
    pub maximum: CreditCents,
}

/// Errors surfaced synchronously at submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The query batch was empty.
    #[error("batch contains no queries")]
    EmptyBatch,

    /// No lookup provider is configured.
    #[error("lookup provider unavailable")]
    ProviderUnavailable,

    /// Task store failure.
    #[error(transparent)]
    Store(#[from] TaskError),

    /// Ledger failure other than an admission rejection.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors inside a running task's phases.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error(transparent)]
    Store(#[from] TaskError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
