//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock lookup provider injected, enabling full task lifecycle tests
//! without external infrastructure.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use dossier_core::{
    testing::MockProvider, CollectorConfig, Config, CreditLedger, DatabaseConfig, DetailCache,
    PricingConfig, SqliteDetailCache, SqliteLedger, SqliteTaskStore, TaskCollector, TaskStore,
};

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use dossier_core::testing::fixtures;

/// Test fixture for E2E testing with a mock lookup provider.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock provider - script candidates and records
    pub provider: Arc<MockProvider>,
    /// Shared ledger - seed credit balances
    pub ledger: Arc<SqliteLedger>,
    /// Shared task store
    pub task_store: Arc<SqliteTaskStore>,
    /// Temporary directory holding the test database
    pub _temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture with a collector wired to the mock provider.
    pub async fn new() -> Self {
        Self::build(true).await
    }

    /// Create a fixture without a collector, as when no provider is
    /// configured.
    #[allow(dead_code)]
    pub async fn without_collector() -> Self {
        Self::build(false).await
    }

    async fn build(with_collector: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            collector: CollectorConfig {
                wave_size: 2,
                persist_retry_backoff_ms: 10,
                ..Default::default()
            },
            ..Default::default()
        };

        let task_store =
            Arc::new(SqliteTaskStore::new(&db_path).expect("Failed to create task store"));
        let ledger = Arc::new(SqliteLedger::new(&db_path).expect("Failed to create ledger"));
        let cache = Arc::new(SqliteDetailCache::new(&db_path).expect("Failed to create cache"));
        let provider = Arc::new(MockProvider::new());

        let collector = with_collector.then(|| {
            TaskCollector::new(
                config.collector.clone(),
                PricingConfig::default(),
                Arc::clone(&task_store) as Arc<dyn TaskStore>,
                Arc::clone(&ledger) as Arc<dyn CreditLedger>,
                Arc::clone(&cache) as Arc<dyn DetailCache>,
                Arc::clone(&provider) as Arc<dyn dossier_core::ProviderClient>,
            )
        });

        let state = Arc::new(dossier_server::state::AppState::new(
            config,
            Arc::clone(&task_store) as Arc<dyn TaskStore>,
            Arc::clone(&ledger) as Arc<dyn CreditLedger>,
            Arc::clone(&cache) as Arc<dyn DetailCache>,
            collector,
        ));
        let router = dossier_server::api::create_router(state);

        Self {
            router,
            provider,
            ledger,
            task_store,
            _temp_dir: temp_dir,
        }
    }

    /// Send a GET request.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// Send a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Send a DELETE request.
    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Request::delete(path).body(Body::empty()).unwrap())
            .await
    }

    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        };

        TestResponse { status, body }
    }

    /// Poll a task until it reaches a terminal status.
    #[allow(dead_code)]
    pub async fn wait_for_terminal(&self, task_id: &str, timeout: Duration) -> Value {
        let start = std::time::Instant::now();
        loop {
            let response = self.get(&format!("/api/v1/tasks/{}", task_id)).await;
            assert_eq!(response.status, StatusCode::OK);
            let status = response.body["status"].as_str().unwrap_or("").to_string();
            if matches!(
                status.as_str(),
                "completed" | "failed" | "cancelled" | "insufficient_credits"
            ) {
                return response.body;
            }
            if start.elapsed() > timeout {
                panic!("task {} still {} after {:?}", task_id, status, timeout);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
