//! Batch collection engine.
//!
//! Turns an admitted query batch into filtered person records: search
//! fan-out in bounded waves, cache-backed detail resolution, the filter
//! pipeline and credit settlement, with progress persisted for pollers.

mod runner;
mod types;

pub use runner::TaskCollector;
pub use types::{CollectorError, CostEstimate, SubmitError, SubmitRequest};
