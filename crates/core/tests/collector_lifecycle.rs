//! Collector lifecycle integration tests.
//!
//! These tests run full tasks through the collector against a mock lookup
//! provider and real SQLite-backed stores: admission, search and detail
//! waves, filtering, settlement and terminal status.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use dossier_core::{
    testing::{fixtures, MockProvider},
    BillingPolicy, CollectorConfig, CreditLedger, DetailCache, EntryType, FilterConfig,
    PricingConfig, SearchMode, SearchQuery, SqliteDetailCache, SqliteLedger, SqliteTaskStore,
    SubmitRequest, TaskCollector, TaskStatus, TaskStore,
};

/// Test helper wiring a collector to in-file SQLite stores and a mock
/// provider.
struct TestHarness {
    task_store: Arc<SqliteTaskStore>,
    ledger: Arc<SqliteLedger>,
    cache: Arc<SqliteDetailCache>,
    provider: Arc<MockProvider>,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        Self {
            task_store: Arc::new(
                SqliteTaskStore::new(&db_path).expect("Failed to create task store"),
            ),
            ledger: Arc::new(SqliteLedger::new(&db_path).expect("Failed to create ledger")),
            cache: Arc::new(SqliteDetailCache::new(&db_path).expect("Failed to create cache")),
            provider: Arc::new(MockProvider::new()),
            _temp_dir: temp_dir,
        }
    }

    fn create_collector(&self, pricing: PricingConfig, config: CollectorConfig) -> TaskCollector {
        TaskCollector::new(
            config,
            pricing,
            Arc::clone(&self.task_store) as Arc<dyn TaskStore>,
            Arc::clone(&self.ledger) as Arc<dyn CreditLedger>,
            Arc::clone(&self.cache) as Arc<dyn DetailCache>,
            Arc::clone(&self.provider) as Arc<dyn dossier_core::ProviderClient>,
        )
    }

    fn request(&self, names: &[&str], filters: Option<FilterConfig>) -> SubmitRequest {
        SubmitRequest {
            owner_id: "user-1".to_string(),
            mode: SearchMode::NameOnly,
            queries: names.iter().map(|n| SearchQuery::name_only(*n)).collect(),
            filters,
        }
    }

    async fn wait_for_terminal(&self, task_id: &str, timeout: Duration) -> TaskStatus {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(20);

        loop {
            let task = self
                .task_store
                .get(task_id)
                .expect("Failed to read task")
                .expect("Task disappeared");
            if task.status.is_terminal() {
                return task.status;
            }
            if start.elapsed() > timeout {
                panic!("task {} still {:?} after {:?}", task_id, task.status, timeout);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

fn fast_config() -> CollectorConfig {
    CollectorConfig {
        wave_size: 2,
        max_pages_per_subtask: 1,
        max_candidates_per_subtask: 5,
        persist_retry_backoff_ms: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_happy_path_with_cache_hits_and_filtering() {
    let harness = TestHarness::new();
    harness
        .ledger
        .deposit("user-1", 10_000, "initial purchase")
        .expect("deposit failed");

    // Three subtasks, one candidate each. Two records are already cached;
    // the third comes fresh from the provider and is too old for the filter.
    harness
        .provider
        .set_candidates("Alice Smith", vec![fixtures::candidate("link-a", "Alice Smith")])
        .await;
    harness
        .provider
        .set_candidates("Bob Jones", vec![fixtures::candidate("link-b", "Bob Jones")])
        .await;
    harness
        .provider
        .set_candidates("Carol White", vec![fixtures::candidate("link-c", "Carol White")])
        .await;
    harness
        .cache
        .put_many(
            &[
                ("link-a".to_string(), fixtures::person_record("Alice Smith", 40)),
                ("link-b".to_string(), fixtures::person_record("Bob Jones", 55)),
            ],
            30,
        )
        .expect("cache seed failed");
    harness
        .provider
        .set_record("link-c", fixtures::person_record("Carol White", 85))
        .await;

    let collector = harness.create_collector(PricingConfig::default(), fast_config());
    let filters = FilterConfig {
        max_age: Some(80),
        ..Default::default()
    };
    let task = collector
        .submit(harness.request(&["Alice Smith", "Bob Jones", "Carol White"], Some(filters)))
        .await
        .expect("submit failed");
    assert_eq!(task.status, TaskStatus::Running);

    let status = harness
        .wait_for_terminal(&task.id, Duration::from_secs(5))
        .await;
    assert_eq!(status, TaskStatus::Completed);

    let task = harness.task_store.get(&task.id).unwrap().unwrap();
    assert_eq!(task.progress_percent, 100);
    assert_eq!(task.counters.search_requests_used, 3);
    assert_eq!(task.counters.detail_requests_used, 1);
    assert_eq!(task.counters.cache_hits, 2);
    assert_eq!(task.counters.total_results, 2);
    // 3 search pages * 10 + 1 detail fetch * 100.
    assert_eq!(task.counters.credits_used, 130);

    // Only the cached links were fetched from the provider.
    assert_eq!(harness.provider.detail_fetch_count().await, 1);
    assert_eq!(
        harness.provider.recorded_detail_fetches().await,
        vec!["link-c".to_string()]
    );

    let results = harness.task_store.results(&task.id, 100, 0).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.from_cache));
    assert!(results.iter().all(|r| r.age.unwrap() <= 80));

    // Exactly one deduction for the task; no second settlement.
    let entries = harness.ledger.entries_for_task(&task.id).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, EntryType::Deduct);
    assert_eq!(entries[0].amount, -130);
    assert_eq!(harness.ledger.account("user-1").unwrap().available, 9_870);
}

#[tokio::test]
async fn test_insufficient_credits_never_touches_provider() {
    let harness = TestHarness::new();
    // No deposit: available balance is zero.

    let collector = harness.create_collector(PricingConfig::default(), fast_config());
    let task = collector
        .submit(harness.request(&["Jane Doe"], None))
        .await
        .expect("submit failed");

    assert_eq!(task.status, TaskStatus::InsufficientCredits);
    assert_eq!(harness.provider.search_count().await, 0);
    assert_eq!(harness.provider.detail_fetch_count().await, 0);

    let stored = harness.task_store.get(&task.id).unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::InsufficientCredits);
    assert!(harness.ledger.entries_for_task(&task.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_cancellation_settles_partial_work() {
    let harness = TestHarness::new();
    harness
        .ledger
        .deposit("user-1", 10_000, "initial purchase")
        .expect("deposit failed");

    let names = ["A", "B", "C", "D", "E", "F"];
    for name in names {
        harness.provider.set_candidates(name, vec![]).await;
    }
    harness
        .provider
        .set_search_delay(Duration::from_millis(100))
        .await;

    let config = CollectorConfig {
        wave_size: 1,
        persist_retry_backoff_ms: 10,
        ..Default::default()
    };
    let collector = harness.create_collector(PricingConfig::default(), config);
    let task = collector
        .submit(harness.request(&names, None))
        .await
        .expect("submit failed");

    // Let a couple of waves run, then request cancellation.
    tokio::time::sleep(Duration::from_millis(150)).await;
    collector.cancel(&task.id).await.expect("cancel failed");

    let status = harness
        .wait_for_terminal(&task.id, Duration::from_secs(5))
        .await;
    assert_eq!(status, TaskStatus::Cancelled);

    let task = harness.task_store.get(&task.id).unwrap().unwrap();
    // Some searches ran, the rest were abandoned at a wave boundary.
    assert!(task.counters.search_requests_used >= 1);
    assert!((task.counters.search_requests_used as usize) < names.len());
    // The metered portion was still billed.
    assert_eq!(
        task.counters.credits_used,
        task.counters.search_requests_used as i64 * 10
    );
}

#[tokio::test]
async fn test_prepaid_freeze_and_settle_refund() {
    let harness = TestHarness::new();
    harness
        .ledger
        .deposit("user-1", 10_000, "initial purchase")
        .expect("deposit failed");

    harness
        .provider
        .set_candidates(
            "Jane Doe",
            vec![
                fixtures::candidate("link-1", "Jane Doe"),
                fixtures::candidate("link-2", "Jane Doe"),
                fixtures::candidate("link-3", "Jane Doe"),
            ],
        )
        .await;
    for link in ["link-1", "link-2", "link-3"] {
        harness
            .provider
            .set_record(link, fixtures::person_record("Jane Doe", 40))
            .await;
    }

    let pricing = PricingConfig {
        search_page_cost: 10,
        detail_cost: 100,
        billing: BillingPolicy::PrepaidFreezeSettle,
    };
    let collector = harness.create_collector(pricing, fast_config());
    let task = collector
        .submit(harness.request(&["Jane Doe"], None))
        .await
        .expect("submit failed");
    assert_eq!(task.status, TaskStatus::Running);

    let status = harness
        .wait_for_terminal(&task.id, Duration::from_secs(5))
        .await;
    assert_eq!(status, TaskStatus::Completed);

    // Worst case frozen at admission: 1 page * 10 + 5 candidates * 100.
    // Actual: 1 page * 10 + 3 fetches * 100. Refund is the difference.
    let entries = harness.ledger.entries_for_task(&task.id).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entry_type, EntryType::Freeze);
    assert_eq!(entries[0].amount, -510);
    assert_eq!(entries[1].entry_type, EntryType::SettleRefund);
    assert_eq!(entries[1].amount, 200);

    let task = harness.task_store.get(&task.id).unwrap().unwrap();
    assert_eq!(task.counters.credits_used, 310);

    let account = harness.ledger.account("user-1").unwrap();
    assert_eq!(account.available, 10_000 - 310);
    assert_eq!(account.frozen, 0);
}

#[tokio::test]
async fn test_overreported_metering_stays_within_frozen_budget() {
    let harness = TestHarness::new();
    harness
        .ledger
        .deposit("user-1", 10_000, "initial purchase")
        .expect("deposit failed");

    harness
        .provider
        .set_candidates("Jane Doe", vec![fixtures::candidate("link-1", "Jane Doe")])
        .await;
    harness
        .provider
        .set_record("link-1", fixtures::person_record("Jane Doe", 40))
        .await;
    // The provider claims three pages for the single authorized search call
    // and two requests for the single detail fetch.
    harness.provider.set_reported_pages(3).await;
    harness.provider.set_reported_detail_requests(2).await;

    let pricing = PricingConfig {
        search_page_cost: 10,
        detail_cost: 100,
        billing: BillingPolicy::PrepaidFreezeSettle,
    };
    let config = CollectorConfig {
        wave_size: 2,
        max_pages_per_subtask: 1,
        max_candidates_per_subtask: 1,
        persist_retry_backoff_ms: 10,
        ..Default::default()
    };
    let collector = harness.create_collector(pricing, config);
    let task = collector
        .submit(harness.request(&["Jane Doe"], None))
        .await
        .expect("submit failed");

    let status = harness
        .wait_for_terminal(&task.id, Duration::from_secs(5))
        .await;
    assert_eq!(status, TaskStatus::Completed);

    // Metered usage is capped at the authorized budgets regardless of what
    // the provider claims: 1 page * 10 + 1 fetch * 100 = the frozen 110.
    let task = harness.task_store.get(&task.id).unwrap().unwrap();
    assert_eq!(task.counters.search_requests_used, 1);
    assert_eq!(task.counters.detail_requests_used, 1);
    assert_eq!(task.counters.credits_used, 110);
    assert_eq!(task.counters.total_results, 1);

    let entries = harness.ledger.entries_for_task(&task.id).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].entry_type, EntryType::Freeze);
    assert_eq!(entries[0].amount, -110);
    assert_eq!(entries[1].entry_type, EntryType::SettleRefund);
    assert_eq!(entries[1].amount, 0);

    let account = harness.ledger.account("user-1").unwrap();
    assert_eq!(account.frozen, 0);
    assert_eq!(account.available, 10_000 - 110);
}

#[tokio::test]
async fn test_partial_search_failure_still_completes() {
    let harness = TestHarness::new();
    harness
        .ledger
        .deposit("user-1", 10_000, "initial purchase")
        .expect("deposit failed");

    harness
        .provider
        .set_candidates("Alice Smith", vec![fixtures::candidate("link-a", "Alice Smith")])
        .await;
    harness
        .provider
        .set_record("link-a", fixtures::person_record("Alice Smith", 40))
        .await;
    harness
        .provider
        .set_search_error("Bob Jones", dossier_core::ProviderError::Timeout)
        .await;

    let collector = harness.create_collector(PricingConfig::default(), fast_config());
    let task = collector
        .submit(harness.request(&["Alice Smith", "Bob Jones"], None))
        .await
        .expect("submit failed");

    let status = harness
        .wait_for_terminal(&task.id, Duration::from_secs(5))
        .await;
    assert_eq!(status, TaskStatus::Completed);

    let task = harness.task_store.get(&task.id).unwrap().unwrap();
    // The failed subtask contributed nothing and was not billed.
    assert_eq!(task.counters.search_requests_used, 1);
    assert_eq!(task.counters.total_results, 1);
    assert!(task
        .log
        .iter()
        .any(|entry| entry.message.contains("search failed for \"Bob Jones\"")));
}

#[tokio::test]
async fn test_progress_is_monotonic() {
    let harness = TestHarness::new();
    harness
        .ledger
        .deposit("user-1", 10_000, "initial purchase")
        .expect("deposit failed");

    let names = ["A", "B", "C", "D"];
    for name in names {
        harness.provider.set_candidates(name, vec![]).await;
    }
    harness
        .provider
        .set_search_delay(Duration::from_millis(40))
        .await;

    let config = CollectorConfig {
        wave_size: 1,
        persist_retry_backoff_ms: 10,
        ..Default::default()
    };
    let collector = harness.create_collector(PricingConfig::default(), config);
    let task = collector
        .submit(harness.request(&names, None))
        .await
        .expect("submit failed");

    let mut observed = Vec::new();
    loop {
        let current = harness.task_store.get(&task.id).unwrap().unwrap();
        observed.push(current.progress_percent);
        if current.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(15)).await;
    }

    assert!(observed.windows(2).all(|w| w[0] <= w[1]), "{:?}", observed);
    assert_eq!(*observed.last().unwrap(), 100);
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let harness = TestHarness::new();
    harness
        .ledger
        .deposit("user-1", 10_000, "initial purchase")
        .expect("deposit failed");

    harness
        .provider
        .set_candidates("Jane Doe", vec![fixtures::candidate("link-1", "Jane Doe")])
        .await;
    harness
        .provider
        .set_record("link-1", fixtures::person_record("Jane Doe", 40))
        .await;

    let collector = harness.create_collector(PricingConfig::default(), fast_config());

    let first = collector
        .submit(harness.request(&["Jane Doe"], None))
        .await
        .expect("submit failed");
    harness
        .wait_for_terminal(&first.id, Duration::from_secs(5))
        .await;
    assert_eq!(harness.provider.detail_fetch_count().await, 1);

    let second = collector
        .submit(harness.request(&["Jane Doe"], None))
        .await
        .expect("submit failed");
    harness
        .wait_for_terminal(&second.id, Duration::from_secs(5))
        .await;

    // The write-back from the first run satisfies the second without a new
    // provider fetch, and the cache hit is free.
    assert_eq!(harness.provider.detail_fetch_count().await, 1);
    let second = harness.task_store.get(&second.id).unwrap().unwrap();
    assert_eq!(second.counters.cache_hits, 1);
    assert_eq!(second.counters.credits_used, 10);
}
