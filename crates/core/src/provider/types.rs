//! Types for the public-record lookup provider boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A candidate returned by a provider search, pointing at a full record.
///
/// The `detail_link` is an opaque provider-assigned identifier; it is the
/// only handle needed to fetch the full record and doubles as the detail
/// cache key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    /// Opaque provider identifier for the full record.
    pub detail_link: String,
    /// Index of the subtask (query) that produced this candidate.
    pub subtask_index: usize,
    /// Name that was searched.
    pub search_name: String,
    /// Location that was searched, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_location: Option<String>,
}

/// A phone number attached to a person record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhoneInfo {
    /// The number itself, provider-formatted.
    pub number: String,
    /// Line type as reported (e.g. "mobile", "landline"). Unknown if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<String>,
    /// Carrier name as reported. Unknown if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
}

/// A resolved person record.
///
/// Flat by design: every list-valued field can be rendered as a single
/// delimited sub-string, so the record is exportable to CSV without nesting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonRecord {
    /// Full name as reported by the provider.
    pub name: String,
    /// Age in years, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    /// Current location, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Primary phone number with type and carrier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<PhoneInfo>,
    /// Marital status as reported (free text, e.g. "Married").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<String>,
    /// Whether the person is reported deceased. `None` = unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deceased: Option<bool>,
    /// Names of known relatives.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relatives: Vec<String>,
    /// Known email addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    /// Year of the underlying report, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_year: Option<u16>,
    /// Whether this record was served from the detail cache.
    #[serde(default)]
    pub from_cache: bool,
}

impl PersonRecord {
    /// Join a list-valued field into a single delimited sub-string for export.
    pub fn join_for_export(values: &[String]) -> String {
        values.join("; ")
    }
}

/// One page of search results from the provider.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Candidates found on this page, in provider order.
    pub candidates: Vec<Candidate>,
    /// Metered pages consumed by this call (usually 1).
    pub pages_used: u32,
    /// Whether the provider reports more pages after this one.
    pub has_more: bool,
}

/// A fetched detail record with its metering info.
#[derive(Debug, Clone)]
pub struct DetailFetch {
    pub record: PersonRecord,
    /// Metered detail requests consumed by this call (usually 1).
    pub requests_used: u32,
}

/// Errors from the lookup provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider connection failed: {0}")]
    ConnectionFailed(String),

    #[error("provider API error: {0}")]
    ApiError(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("provider request timeout")]
    Timeout,

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Trait for public-record lookup providers.
///
/// The collector treats this as an opaque metered remote call; timeouts and
/// retries against the remote service are the implementation's concern.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Search one (name, optional location) query, one page at a time.
    ///
    /// `subtask_index` is threaded through so returned candidates carry the
    /// index of the query that produced them.
    async fn search(
        &self,
        name: &str,
        location: Option<&str>,
        page: u32,
        subtask_index: usize,
    ) -> Result<SearchPage, ProviderError>;

    /// Fetch the full record behind a detail link.
    async fn fetch_detail(&self, link: &str) -> Result<DetailFetch, ProviderError>;
}
