//! Task collector implementation.
//!
//! Owns the batch task lifecycle: admission against the credit ledger,
//! wave-based search fan-out, cache-backed detail resolution, filtering,
//! cost settlement and progress persistence. Each admitted task runs as one
//! detached asynchronous job; pollers observe it only through the task store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::cache::DetailCache;
use crate::config::{CollectorConfig, PricingConfig};
use crate::filter::FilterPipeline;
use crate::ledger::{BillingPolicy, CreditCents, CreditLedger, LedgerError};
use crate::metrics;
use crate::provider::{Candidate, DetailFetch, PersonRecord, ProviderClient, ProviderError};
use crate::task::{
    update_progress_with_retry, CreateTaskRequest, SearchMode, SearchQuery, SearchTask,
    TaskCounters, TaskLogEntry, TaskStatus, TaskStore, TaskUpdate,
};

use super::types::{CollectorError, CostEstimate, SubmitError, SubmitRequest};

/// The task collector - runs batch lookups against the provider under
/// bounded concurrency and settles their cost.
///
/// Cheap to clone; all state is shared behind `Arc`.
#[derive(Clone)]
pub struct TaskCollector {
    config: CollectorConfig,
    pricing: PricingConfig,
    task_store: Arc<dyn TaskStore>,
    ledger: Arc<dyn CreditLedger>,
    cache: Arc<dyn DetailCache>,
    provider: Arc<dyn ProviderClient>,

    // Cooperative cancellation flags, checked at wave boundaries.
    cancellations: Arc<RwLock<HashSet<String>>>,
}

impl TaskCollector {
    /// Create a new collector.
    pub fn new(
        config: CollectorConfig,
        pricing: PricingConfig,
        task_store: Arc<dyn TaskStore>,
        ledger: Arc<dyn CreditLedger>,
        cache: Arc<dyn DetailCache>,
        provider: Arc<dyn ProviderClient>,
    ) -> Self {
        Self {
            config,
            pricing,
            task_store,
            ledger,
            cache,
            provider,
            cancellations: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Cost bounds for a batch of `subtask_count` queries.
    ///
    /// The maximum assumes every subtask consumes its full page budget and
    /// its full candidate budget as fresh detail fetches; the collector
    /// enforces both budgets, so actual metered cost never exceeds it.
    pub fn estimate(&self, subtask_count: usize) -> CostEstimate {
        let n = subtask_count as CreditCents;
        CostEstimate {
            minimum: n * self.pricing.search_page_cost,
            maximum: n * self.config.max_pages_per_subtask as CreditCents
                * self.pricing.search_page_cost
                + n * self.config.max_candidates_per_subtask as CreditCents
                    * self.pricing.detail_cost,
        }
    }

    /// Submit a batch for execution.
    ///
    /// Runs admission synchronously; the returned task is either `running`
    /// (execution has been scheduled) or `insufficient_credits` (admission
    /// rejected, nothing scheduled and no provider call made).
    pub async fn submit(&self, request: SubmitRequest) -> Result<SearchTask, SubmitError> {
        let SubmitRequest {
            owner_id,
            mode,
            queries,
            filters,
        } = request;

        if queries.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }

        let filters = filters.unwrap_or_default().with_defaults(
            self.config.default_min_age,
            self.config.default_max_age,
            self.config.default_min_report_year,
        );

        let estimate = self.estimate(queries.len());
        let task = self.task_store.create(CreateTaskRequest {
            owner_id: owner_id.clone(),
            mode,
            queries,
            filters,
            billing: self.pricing.billing,
        })?;

        if let Some((required, available)) = self.admit(&owner_id, &task.id, estimate)? {
            info!(
                task_id = %task.id,
                owner_id = %owner_id,
                required,
                available,
                "task rejected at admission"
            );
            metrics::TASKS_SUBMITTED
                .with_label_values(&["insufficient_credits"])
                .inc();
            return Ok(self
                .task_store
                .set_status(&task.id, TaskStatus::InsufficientCredits)?);
        }

        let task = self.task_store.set_status(&task.id, TaskStatus::Running)?;
        metrics::TASKS_SUBMITTED.with_label_values(&["admitted"]).inc();
        info!(
            task_id = %task.id,
            owner_id = %owner_id,
            subtasks = task.queries.len(),
            billing = task.billing.as_str(),
            "task admitted"
        );

        let collector = self.clone();
        let spawned = task.clone();
        tokio::spawn(async move {
            collector.run(spawned).await;
        });

        Ok(task)
    }

    /// Request cancellation of a task.
    ///
    /// Cooperative: the flag is observed at the next wave boundary, so the
    /// returned task usually still reads as running.
    pub async fn cancel(&self, task_id: &str) -> Result<SearchTask, SubmitError> {
        // Flag first, then check the status. A run observed as non-terminal
        // after the flag is set either sees the flag at its next wave
        // boundary or removes it when it finishes; checking first would let
        // a flag outlive a task that finalized in between.
        self.cancellations.write().await.insert(task_id.to_string());

        match self.cancellable(task_id) {
            Ok(task) => {
                info!(task_id = %task_id, "cancellation requested");
                Ok(task)
            }
            Err(e) => {
                self.cancellations.write().await.remove(task_id);
                Err(e)
            }
        }
    }

    fn cancellable(&self, task_id: &str) -> Result<SearchTask, SubmitError> {
        let task = self
            .task_store
            .get(task_id)?
            .ok_or_else(|| crate::task::TaskError::NotFound(task_id.to_string()))?;

        if task.status.is_terminal() {
            return Err(crate::task::TaskError::InvalidTransition {
                task_id: task_id.to_string(),
                from: task.status.as_str().to_string(),
                to: TaskStatus::Cancelled.as_str().to_string(),
            }
            .into());
        }
        Ok(task)
    }

    /// Admission check for the configured billing policy.
    ///
    /// Returns `Some((required, available))` when the account cannot afford
    /// the task; `None` when admitted. Under prepaid billing an admitted
    /// task has its worst-case cost frozen as a side effect.
    fn admit(
        &self,
        owner_id: &str,
        task_id: &str,
        estimate: CostEstimate,
    ) -> Result<Option<(CreditCents, CreditCents)>, SubmitError> {
        match self.pricing.billing {
            BillingPolicy::PostpaidDeduct => {
                let account = self.ledger.account(owner_id)?;
                if account.available < estimate.minimum {
                    return Ok(Some((estimate.minimum, account.available)));
                }
                Ok(None)
            }
            BillingPolicy::PrepaidFreezeSettle => {
                match self.ledger.freeze(owner_id, estimate.maximum, task_id) {
                    Ok(_) => Ok(None),
                    Err(LedgerError::InsufficientCredits {
                        required,
                        available,
                    }) => Ok(Some((required, available))),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    async fn run(&self, task: SearchTask) {
        let started = Instant::now();

        let status = match self.execute(&task).await {
            Ok(status) => status,
            Err(e) => {
                error!(task_id = %task.id, error = %e, "task failed");
                if let Err(store_err) = self.task_store.fail(&task.id, &e.to_string()) {
                    error!(
                        task_id = %task.id,
                        error = %store_err,
                        "could not record task failure"
                    );
                }
                TaskStatus::Failed
            }
        };

        self.cancellations.write().await.remove(&task.id);

        metrics::TASKS_FINISHED
            .with_label_values(&[status.as_str()])
            .inc();
        metrics::TASK_DURATION
            .with_label_values(&[status.as_str()])
            .observe(started.elapsed().as_secs_f64());
        info!(
            task_id = %task.id,
            status = status.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "task finished"
        );
    }

    /// Execute all phases of an admitted task.
    ///
    /// Per-unit provider failures are logged and contribute nothing; an
    /// error escaping this function marks the task failed without further
    /// settlement.
    async fn execute(&self, task: &SearchTask) -> Result<TaskStatus, CollectorError> {
        let wave_size = self.config.wave_size.max(1);
        let mut counters = TaskCounters::default();
        let mut log: Vec<TaskLogEntry> = Vec::new();

        // Search phase: bounded waves, progress 0 -> 50.
        let subtasks: Vec<(usize, &SearchQuery)> = task.queries.iter().enumerate().collect();
        let total_search_waves = subtasks.chunks(wave_size).count().max(1);
        let mut all_candidates: Vec<Candidate> = Vec::new();

        for (wave_index, wave) in subtasks.chunks(wave_size).enumerate() {
            if self.is_cancelled(&task.id).await {
                log.push(TaskLogEntry::now(format!(
                    "cancelled before search wave {}",
                    wave_index + 1
                )));
                return self.finalize_cancelled(task, counters, log).await;
            }

            let futures = wave
                .iter()
                .map(|(index, query)| self.search_subtask(*index, query, task.mode));
            let results = join_all(futures).await;

            for ((_, query), result) in wave.iter().zip(results) {
                match result {
                    Ok((candidates, pages_used)) => {
                        counters.search_requests_used += pages_used;
                        all_candidates.extend(candidates);
                    }
                    Err(e) => {
                        warn!(task_id = %task.id, name = %query.name, error = %e, "subtask search failed");
                        log.push(TaskLogEntry::now(format!(
                            "search failed for \"{}\": {}",
                            query.name, e
                        )));
                    }
                }
            }

            let progress = ((wave_index + 1) * 50 / total_search_waves) as u8;
            self.persist_progress(&task.id, &counters, progress, &log)
                .await;
        }

        // Distinct detail links, first occurrence wins, submission order kept.
        let mut seen = HashSet::new();
        let candidates: Vec<Candidate> = all_candidates
            .into_iter()
            .filter(|c| seen.insert(c.detail_link.clone()))
            .collect();
        metrics::CANDIDATES_FOUND.observe(candidates.len() as f64);
        debug!(task_id = %task.id, candidates = candidates.len(), "search phase done");

        // Cache resolution.
        let links: Vec<String> = candidates.iter().map(|c| c.detail_link.clone()).collect();
        let cached = self.cache.get_many(&links)?;
        counters.cache_hits = cached.len() as u32;
        metrics::CACHE_HITS.inc_by(cached.len() as u64);

        let misses: Vec<String> = links
            .iter()
            .filter(|link| !cached.contains_key(*link))
            .cloned()
            .collect();
        metrics::CACHE_MISSES.inc_by(misses.len() as u64);

        if !cached.is_empty() {
            log.push(TaskLogEntry::now(format!(
                "{} of {} records served from cache",
                cached.len(),
                links.len()
            )));
        }

        // Detail phase: bounded waves, progress 50 -> 95.
        let total_detail_waves = misses.chunks(wave_size).count().max(1);
        let mut fetched: HashMap<String, PersonRecord> = HashMap::new();

        for (wave_index, wave) in misses.chunks(wave_size).enumerate() {
            if self.is_cancelled(&task.id).await {
                log.push(TaskLogEntry::now(format!(
                    "cancelled before detail wave {}",
                    wave_index + 1
                )));
                return self.finalize_cancelled(task, counters, log).await;
            }

            let futures = wave.iter().map(|link| self.fetch_one(link));
            let results = join_all(futures).await;

            let mut write_back = Vec::new();
            for (link, result) in wave.iter().zip(results) {
                match result {
                    Ok(fetch) => {
                        // One metered request per authorized candidate.
                        counters.detail_requests_used += fetch.requests_used.min(1);
                        let mut record = fetch.record;
                        record.from_cache = false;
                        write_back.push((link.clone(), record.clone()));
                        fetched.insert(link.clone(), record);
                    }
                    Err(e) => {
                        warn!(task_id = %task.id, link = %link, error = %e, "detail fetch failed");
                        log.push(TaskLogEntry::now(format!(
                            "detail fetch failed for {}: {}",
                            link, e
                        )));
                    }
                }
            }

            // Best-effort write-back; a cache failure never fails the task.
            if !write_back.is_empty() {
                if let Err(e) = self.cache.put_many(&write_back, self.config.cache_ttl_days) {
                    warn!(task_id = %task.id, error = %e, "cache write-back failed");
                }
            }

            let progress = 50 + ((wave_index + 1) * 45 / total_detail_waves) as u8;
            self.persist_progress(&task.id, &counters, progress, &log)
                .await;
        }

        // Merge resolved records in candidate order.
        let resolved: Vec<PersonRecord> = links
            .iter()
            .filter_map(|link| cached.get(link).cloned().or_else(|| fetched.get(link).cloned()))
            .collect();

        // Filter.
        let pipeline = FilterPipeline::new(task.filters.clone());
        let (records, reports) = pipeline.apply(resolved);
        for report in &reports {
            if report.removed() > 0 {
                metrics::FILTERED_RECORDS
                    .with_label_values(&[report.stage.as_str()])
                    .inc_by(report.removed() as u64);
                log.push(TaskLogEntry::now(format!(
                    "filter {} removed {} of {} records",
                    report.stage,
                    report.removed(),
                    report.before
                )));
            }
        }
        counters.total_results = records.len() as u32;

        // Cost and settlement, attempted exactly once.
        let actual_cost = self.metered_cost(&counters);
        self.settle(task, actual_cost, &mut counters, &mut log)?;

        // Finalize.
        self.task_store.put_results(&task.id, &records)?;
        self.persist_progress(&task.id, &counters, 95, &log).await;
        self.task_store.complete(&task.id, &counters)?;
        Ok(TaskStatus::Completed)
    }

    /// Search every page of one subtask, within the page and candidate
    /// budgets.
    async fn search_subtask(
        &self,
        index: usize,
        query: &SearchQuery,
        mode: SearchMode,
    ) -> Result<(Vec<Candidate>, u32), ProviderError> {
        let location = match mode {
            SearchMode::NameLocation => query.location.as_deref(),
            SearchMode::NameOnly => None,
        };

        let mut candidates = Vec::new();
        let mut pages_used = 0u32;
        let mut page = 1u32;

        loop {
            let timer = metrics::PROVIDER_DURATION
                .with_label_values(&["search"])
                .start_timer();
            let result = self.provider.search(&query.name, location, page, index).await;
            timer.observe_duration();

            match result {
                Ok(result_page) => {
                    metrics::PROVIDER_REQUESTS
                        .with_label_values(&["search", "success"])
                        .inc();
                    // Metered pages never exceed the authorized per-subtask
                    // budget, whatever the provider reports for one call.
                    pages_used = (pages_used + result_page.pages_used)
                        .min(self.config.max_pages_per_subtask);
                    candidates.extend(result_page.candidates);

                    if !result_page.has_more
                        || page >= self.config.max_pages_per_subtask
                        || pages_used >= self.config.max_pages_per_subtask
                        || candidates.len() >= self.config.max_candidates_per_subtask
                    {
                        break;
                    }
                    page += 1;
                }
                Err(e) => {
                    metrics::PROVIDER_REQUESTS
                        .with_label_values(&["search", "error"])
                        .inc();
                    return Err(e);
                }
            }
        }

        candidates.truncate(self.config.max_candidates_per_subtask);
        Ok((candidates, pages_used))
    }

    async fn fetch_one(&self, link: &str) -> Result<DetailFetch, ProviderError> {
        let timer = metrics::PROVIDER_DURATION
            .with_label_values(&["detail"])
            .start_timer();
        let result = self.provider.fetch_detail(link).await;
        timer.observe_duration();

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::PROVIDER_REQUESTS
            .with_label_values(&["detail", status])
            .inc();
        result
    }

    fn metered_cost(&self, counters: &TaskCounters) -> CreditCents {
        counters.search_requests_used as CreditCents * self.pricing.search_page_cost
            + counters.detail_requests_used as CreditCents * self.pricing.detail_cost
    }

    /// Settle the metered cost under the task's billing policy.
    ///
    /// A postpaid deduction shortfall is reported on the task and never
    /// discards collected results.
    fn settle(
        &self,
        task: &SearchTask,
        actual_cost: CreditCents,
        counters: &mut TaskCounters,
        log: &mut Vec<TaskLogEntry>,
    ) -> Result<(), CollectorError> {
        match task.billing {
            BillingPolicy::PostpaidDeduct => {
                let description = format!("metered usage for task {}", task.id);
                match self
                    .ledger
                    .deduct(&task.owner_id, actual_cost, &description, &task.id)
                {
                    Ok(_) => {
                        counters.credits_used = actual_cost;
                        metrics::CREDITS_CHARGED
                            .with_label_values(&[task.billing.as_str()])
                            .inc_by(actual_cost as u64);
                    }
                    Err(LedgerError::InsufficientBalance {
                        required,
                        available,
                    }) => {
                        metrics::BILLING_SHORTFALLS.inc();
                        let message = format!(
                            "billing shortfall: required {} credit cents, available {}",
                            required, available
                        );
                        warn!(task_id = %task.id, required, available, "postpaid deduction failed");
                        log.push(TaskLogEntry::now(message.clone()));
                        self.task_store.annotate(&task.id, &message)?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            BillingPolicy::PrepaidFreezeSettle => {
                let frozen = self.estimate(task.queries.len()).maximum;
                // The frozen amount is the hard ceiling the owner authorized;
                // the billed amount never exceeds it.
                let billable = actual_cost.min(frozen);
                if billable < actual_cost {
                    warn!(
                        task_id = %task.id,
                        actual_cost,
                        frozen,
                        "metered cost exceeds frozen amount, billing the frozen amount"
                    );
                    log.push(TaskLogEntry::now(format!(
                        "metered cost {} exceeded the frozen {}, billed {}",
                        actual_cost, frozen, billable
                    )));
                }
                let settlement =
                    self.ledger
                        .settle(&task.owner_id, frozen, billable, &task.id)?;
                counters.credits_used = settlement.spent;
                metrics::CREDITS_CHARGED
                    .with_label_values(&[task.billing.as_str()])
                    .inc_by(settlement.spent as u64);
                log.push(TaskLogEntry::now(format!(
                    "settled {} credit cents, refunded {}",
                    settlement.spent, settlement.refunded
                )));
            }
        }
        Ok(())
    }

    /// Finalize a task observed as cancelled at a wave boundary.
    ///
    /// Work already metered is settled; unstarted waves are never billed.
    async fn finalize_cancelled(
        &self,
        task: &SearchTask,
        mut counters: TaskCounters,
        mut log: Vec<TaskLogEntry>,
    ) -> Result<TaskStatus, CollectorError> {
        let actual_cost = self.metered_cost(&counters);
        self.settle(task, actual_cost, &mut counters, &mut log)?;

        let update = TaskUpdate {
            search_requests_used: Some(counters.search_requests_used),
            detail_requests_used: Some(counters.detail_requests_used),
            cache_hits: Some(counters.cache_hits),
            total_results: Some(counters.total_results),
            credits_used: Some(counters.credits_used),
            log: Some(log),
            progress_percent: None,
        };
        if let Err(e) = update_progress_with_retry(
            self.task_store.as_ref(),
            &task.id,
            &update,
            self.config.persist_retry_attempts,
            Duration::from_millis(self.config.persist_retry_backoff_ms),
        )
        .await
        {
            warn!(task_id = %task.id, error = %e, "final counters lost on cancellation");
        }

        self.task_store.set_status(&task.id, TaskStatus::Cancelled)?;
        Ok(TaskStatus::Cancelled)
    }

    async fn persist_progress(
        &self,
        task_id: &str,
        counters: &TaskCounters,
        progress: u8,
        log: &[TaskLogEntry],
    ) {
        let update = TaskUpdate {
            progress_percent: Some(progress),
            search_requests_used: Some(counters.search_requests_used),
            detail_requests_used: Some(counters.detail_requests_used),
            cache_hits: Some(counters.cache_hits),
            total_results: Some(counters.total_results),
            credits_used: Some(counters.credits_used),
            log: Some(log.to_vec()),
        };

        if let Err(e) = update_progress_with_retry(
            self.task_store.as_ref(),
            task_id,
            &update,
            self.config.persist_retry_attempts,
            Duration::from_millis(self.config.persist_retry_backoff_ms),
        )
        .await
        {
            warn!(task_id = %task_id, error = %e, "progress update lost");
        }
    }

    async fn is_cancelled(&self, task_id: &str) -> bool {
        self.cancellations.read().await.contains(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SqliteDetailCache;
    use crate::filter::FilterConfig;
    use crate::ledger::SqliteLedger;
    use crate::task::SqliteTaskStore;
    use crate::testing::MockProvider;

    fn collector_with(
        pricing: PricingConfig,
        config: CollectorConfig,
        provider: Arc<MockProvider>,
    ) -> (TaskCollector, Arc<SqliteLedger>, Arc<SqliteTaskStore>) {
        let task_store = Arc::new(SqliteTaskStore::in_memory().unwrap());
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let cache = Arc::new(SqliteDetailCache::in_memory().unwrap());
        let collector = TaskCollector::new(
            config,
            pricing,
            task_store.clone(),
            ledger.clone(),
            cache,
            provider,
        );
        (collector, ledger, task_store)
    }

    fn request(names: &[&str]) -> SubmitRequest {
        SubmitRequest {
            owner_id: "user-1".to_string(),
            mode: SearchMode::NameOnly,
            queries: names.iter().map(|n| SearchQuery::name_only(*n)).collect(),
            filters: None,
        }
    }

    #[test]
    fn test_estimate_bounds() {
        let pricing = PricingConfig {
            search_page_cost: 10,
            detail_cost: 100,
            billing: BillingPolicy::PostpaidDeduct,
        };
        let config = CollectorConfig {
            max_pages_per_subtask: 2,
            max_candidates_per_subtask: 5,
            ..Default::default()
        };
        let (collector, _, _) = collector_with(pricing, config, Arc::new(MockProvider::new()));

        let estimate = collector.estimate(3);
        assert_eq!(estimate.minimum, 30);
        assert_eq!(estimate.maximum, 3 * 2 * 10 + 3 * 5 * 100);
    }

    #[tokio::test]
    async fn test_submit_empty_batch_rejected() {
        let (collector, _, _) = collector_with(
            PricingConfig::default(),
            CollectorConfig::default(),
            Arc::new(MockProvider::new()),
        );

        let result = collector.submit(request(&[])).await;
        assert!(matches!(result, Err(SubmitError::EmptyBatch)));
    }

    #[tokio::test]
    async fn test_postpaid_admission_rejects_broke_account() {
        let provider = Arc::new(MockProvider::new());
        let (collector, _, store) = collector_with(
            PricingConfig::default(),
            CollectorConfig::default(),
            provider.clone(),
        );

        let task = collector.submit(request(&["Jane Doe"])).await.unwrap();
        assert_eq!(task.status, TaskStatus::InsufficientCredits);

        // Never scheduled; no provider call made.
        assert_eq!(provider.search_count().await, 0);
        let stored = store.get(&task.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::InsufficientCredits);
    }

    #[tokio::test]
    async fn test_prepaid_admission_freezes_worst_case() {
        let pricing = PricingConfig {
            search_page_cost: 10,
            detail_cost: 100,
            billing: BillingPolicy::PrepaidFreezeSettle,
        };
        let config = CollectorConfig {
            max_pages_per_subtask: 1,
            max_candidates_per_subtask: 2,
            ..Default::default()
        };
        let provider = Arc::new(MockProvider::new());
        let (collector, ledger, _) = collector_with(pricing, config, provider);
        ledger.deposit("user-1", 10_000, "seed").unwrap();

        let task = collector.submit(request(&["Jane Doe"])).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);

        // Worst case: 1 page * 10 + 2 candidates * 100 = 210.
        let account = ledger.account("user-1").unwrap();
        assert_eq!(account.frozen + account.available, 10_000);
        assert_eq!(account.frozen, 210);
    }

    #[tokio::test]
    async fn test_cancel_terminal_task_rejected() {
        let provider = Arc::new(MockProvider::new());
        let (collector, _, store) = collector_with(
            PricingConfig::default(),
            CollectorConfig::default(),
            provider,
        );

        let task = collector.submit(request(&["Jane Doe"])).await.unwrap();
        assert_eq!(task.status, TaskStatus::InsufficientCredits);
        let result = collector.cancel(&task.id).await;
        assert!(result.is_err());

        // A rejected cancel must not leave a flag behind.
        assert!(collector.cancellations.read().await.is_empty());

        let stored = store.get(&task.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::InsufficientCredits);
    }

    #[tokio::test]
    async fn test_cancel_after_finish_leaves_no_flag() {
        let pricing = PricingConfig {
            search_page_cost: 10,
            detail_cost: 100,
            billing: BillingPolicy::PostpaidDeduct,
        };
        let provider = Arc::new(MockProvider::new());
        let (collector, ledger, store) =
            collector_with(pricing, CollectorConfig::default(), provider);
        ledger.deposit("user-1", 1_000, "seed").unwrap();

        let task = collector.submit(request(&["Jane Doe"])).await.unwrap();
        for _ in 0..250 {
            if store.get(&task.id).unwrap().unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let stored = store.get(&task.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);

        // Cancel arriving after finalization errors and clears its own flag,
        // even though the run has already swept the flag set.
        let result = collector.cancel(&task.id).await;
        assert!(result.is_err());
        assert!(collector.cancellations.read().await.is_empty());
    }

    #[test]
    fn test_settlement_clamped_to_frozen_amount() {
        let pricing = PricingConfig {
            search_page_cost: 10,
            detail_cost: 100,
            billing: BillingPolicy::PrepaidFreezeSettle,
        };
        let config = CollectorConfig {
            max_pages_per_subtask: 1,
            max_candidates_per_subtask: 1,
            ..Default::default()
        };
        let (collector, ledger, store) =
            collector_with(pricing, config, Arc::new(MockProvider::new()));
        ledger.deposit("user-1", 1_000, "seed").unwrap();

        let task = store
            .create(CreateTaskRequest {
                owner_id: "user-1".to_string(),
                mode: SearchMode::NameOnly,
                queries: vec![SearchQuery::name_only("Jane Doe")],
                filters: FilterConfig::default(),
                billing: BillingPolicy::PrepaidFreezeSettle,
            })
            .unwrap();
        // Frozen maximum: 1 page * 10 + 1 candidate * 100.
        ledger.freeze("user-1", 110, &task.id).unwrap();

        let mut counters = TaskCounters::default();
        let mut log = Vec::new();
        collector.settle(&task, 130, &mut counters, &mut log).unwrap();

        assert_eq!(counters.credits_used, 110);
        let account = ledger.account("user-1").unwrap();
        assert_eq!(account.frozen, 0);
        assert_eq!(account.available, 1_000 - 110);
    }
}
