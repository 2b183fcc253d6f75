//! Mock lookup provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::provider::{Candidate, DetailFetch, PersonRecord, ProviderClient, ProviderError, SearchPage};

/// A recorded search call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSearch {
    pub name: String,
    pub location: Option<String>,
    pub page: u32,
    pub subtask_index: usize,
}

/// Mock implementation of the ProviderClient trait.
///
/// Provides controllable behavior for testing:
/// - Script candidates per searched name and records per detail link
/// - Track search and detail calls for assertions
/// - Inject one-shot errors per name or link
///
/// # Example
///
/// ```rust,ignore
/// use dossier_core::testing::{fixtures, MockProvider};
///
/// let provider = MockProvider::new();
/// provider.set_candidates("Jane Doe", vec![
///     fixtures::candidate("link-1", "Jane Doe"),
/// ]).await;
/// provider.set_record("link-1", fixtures::person_record("Jane Doe", 52)).await;
///
/// let page = provider.search("Jane Doe", None, 1, 0).await?;
/// assert_eq!(page.candidates.len(), 1);
/// ```
pub struct MockProvider {
    /// Scripted candidates keyed by searched name.
    candidates: Arc<RwLock<HashMap<String, Vec<Candidate>>>>,
    /// Scripted records keyed by detail link.
    records: Arc<RwLock<HashMap<String, PersonRecord>>>,
    /// One-shot search errors keyed by name, consumed on use.
    search_errors: Arc<RwLock<HashMap<String, ProviderError>>>,
    /// One-shot detail errors keyed by link, consumed on use.
    detail_errors: Arc<RwLock<HashMap<String, ProviderError>>>,
    /// Recorded search calls.
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    /// Recorded detail fetch links.
    detail_fetches: Arc<RwLock<Vec<String>>>,
    /// Simulated latency per search call.
    search_delay: Arc<RwLock<Option<Duration>>>,
    /// Pages claimed by each search response.
    reported_pages: Arc<RwLock<u32>>,
    /// Requests claimed by each detail response.
    reported_detail_requests: Arc<RwLock<u32>>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider").finish_non_exhaustive()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider with nothing scripted.
    pub fn new() -> Self {
        Self {
            candidates: Arc::new(RwLock::new(HashMap::new())),
            records: Arc::new(RwLock::new(HashMap::new())),
            search_errors: Arc::new(RwLock::new(HashMap::new())),
            detail_errors: Arc::new(RwLock::new(HashMap::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            detail_fetches: Arc::new(RwLock::new(Vec::new())),
            search_delay: Arc::new(RwLock::new(None)),
            reported_pages: Arc::new(RwLock::new(1)),
            reported_detail_requests: Arc::new(RwLock::new(1)),
        }
    }

    /// Make every search call take at least `delay`.
    pub async fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.write().await = Some(delay);
    }

    /// Make every search response claim `pages` metered pages.
    pub async fn set_reported_pages(&self, pages: u32) {
        *self.reported_pages.write().await = pages;
    }

    /// Make every detail response claim `requests` metered requests.
    pub async fn set_reported_detail_requests(&self, requests: u32) {
        *self.reported_detail_requests.write().await = requests;
    }

    /// Script the candidates returned when `name` is searched.
    pub async fn set_candidates(&self, name: &str, candidates: Vec<Candidate>) {
        self.candidates
            .write()
            .await
            .insert(name.to_string(), candidates);
    }

    /// Script the record behind a detail link.
    pub async fn set_record(&self, link: &str, record: PersonRecord) {
        self.records.write().await.insert(link.to_string(), record);
    }

    /// Make the next search for `name` fail with the given error.
    pub async fn set_search_error(&self, name: &str, error: ProviderError) {
        self.search_errors
            .write()
            .await
            .insert(name.to_string(), error);
    }

    /// Make the next detail fetch for `link` fail with the given error.
    pub async fn set_detail_error(&self, link: &str, error: ProviderError) {
        self.detail_errors
            .write()
            .await
            .insert(link.to_string(), error);
    }

    /// Get recorded search calls.
    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    /// Get the number of search calls performed.
    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }

    /// Get the links of recorded detail fetches.
    pub async fn recorded_detail_fetches(&self) -> Vec<String> {
        self.detail_fetches.read().await.clone()
    }

    /// Get the number of detail fetches performed.
    pub async fn detail_fetch_count(&self) -> usize {
        self.detail_fetches.read().await.len()
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(
        &self,
        name: &str,
        location: Option<&str>,
        page: u32,
        subtask_index: usize,
    ) -> Result<SearchPage, ProviderError> {
        if let Some(delay) = *self.search_delay.read().await {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.search_errors.write().await.remove(name) {
            return Err(err);
        }

        self.searches.write().await.push(RecordedSearch {
            name: name.to_string(),
            location: location.map(|l| l.to_string()),
            page,
            subtask_index,
        });

        // Everything scripted for a name is served on its first page.
        let mut candidates = if page <= 1 {
            self.candidates
                .read()
                .await
                .get(name)
                .cloned()
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        for candidate in &mut candidates {
            candidate.subtask_index = subtask_index;
            candidate.search_location = location.map(|l| l.to_string());
        }

        Ok(SearchPage {
            candidates,
            pages_used: *self.reported_pages.read().await,
            has_more: false,
        })
    }

    async fn fetch_detail(&self, link: &str) -> Result<DetailFetch, ProviderError> {
        if let Some(err) = self.detail_errors.write().await.remove(link) {
            return Err(err);
        }

        self.detail_fetches.write().await.push(link.to_string());

        match self.records.read().await.get(link) {
            Some(record) => Ok(DetailFetch {
                record: record.clone(),
                requests_used: *self.reported_detail_requests.read().await,
            }),
            None => Err(ProviderError::NotFound(link.to_string())),
        }
    }
}
