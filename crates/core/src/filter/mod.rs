//! Post-fetch record filtering.

mod pipeline;
mod types;

pub use pipeline::FilterPipeline;
pub use types::{FilterConfig, StageReport};
