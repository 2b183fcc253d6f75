//! SQLite-backed task store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    CreateTaskRequest, SearchTask, TaskCounters, TaskError, TaskFilter, TaskLogEntry, TaskStatus,
    TaskStore, TaskUpdate,
};
use crate::filter::FilterConfig;
use crate::ledger::BillingPolicy;
use crate::provider::PersonRecord;
use crate::task::{SearchMode, SearchQuery};

/// Default bound on a task's stored log.
pub const DEFAULT_LOG_CAP: usize = 50;

const TASK_COLUMNS: &str = "id, owner_id, mode, queries, filters, billing, status, \
     progress_percent, search_requests_used, detail_requests_used, cache_hits, total_results, \
     credits_used, log, error_message, created_at, started_at, completed_at";

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
    log_cap: usize,
}

impl SqliteTaskStore {
    /// Create a new SQLite task store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TaskError> {
        let conn = Connection::open(path).map_err(|e| TaskError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            log_cap: DEFAULT_LOG_CAP,
        })
    }

    /// Create an in-memory SQLite task store (useful for testing).
    pub fn in_memory() -> Result<Self, TaskError> {
        let conn = Connection::open_in_memory().map_err(|e| TaskError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            log_cap: DEFAULT_LOG_CAP,
        })
    }

    /// Override the stored log cap.
    pub fn with_log_cap(mut self, cap: usize) -> Self {
        self.log_cap = cap;
        self
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TaskError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS search_tasks (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                mode TEXT NOT NULL,
                queries TEXT NOT NULL,
                filters TEXT NOT NULL,
                billing TEXT NOT NULL,
                status TEXT NOT NULL,
                progress_percent INTEGER NOT NULL DEFAULT 0,
                search_requests_used INTEGER NOT NULL DEFAULT 0,
                detail_requests_used INTEGER NOT NULL DEFAULT 0,
                cache_hits INTEGER NOT NULL DEFAULT 0,
                total_results INTEGER NOT NULL DEFAULT 0,
                credits_used INTEGER NOT NULL DEFAULT 0,
                log TEXT NOT NULL DEFAULT '[]',
                error_message TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_search_tasks_owner ON search_tasks(owner_id);
            CREATE INDEX IF NOT EXISTS idx_search_tasks_status ON search_tasks(status);
            CREATE INDEX IF NOT EXISTS idx_search_tasks_created ON search_tasks(created_at);

            CREATE TABLE IF NOT EXISTS task_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                record TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_task_results_task ON task_results(task_id, position);
            "#,
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &TaskFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref owner_id) = filter.owner_id {
            conditions.push("owner_id = ?");
            params.push(Box::new(owner_id.clone()));
        }

        if let Some(ref status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<SearchTask> {
        let id: String = row.get(0)?;
        let owner_id: String = row.get(1)?;
        let mode_str: String = row.get(2)?;
        let queries_json: String = row.get(3)?;
        let filters_json: String = row.get(4)?;
        let billing_str: String = row.get(5)?;
        let status_str: String = row.get(6)?;
        let progress_percent: u8 = row.get(7)?;
        let counters = TaskCounters {
            search_requests_used: row.get(8)?,
            detail_requests_used: row.get(9)?,
            cache_hits: row.get(10)?,
            total_results: row.get(11)?,
            credits_used: row.get(12)?,
        };
        let log_json: String = row.get(13)?;
        let error_message: Option<String> = row.get(14)?;
        let created_at_str: String = row.get(15)?;
        let started_at_str: Option<String> = row.get(16)?;
        let completed_at_str: Option<String> = row.get(17)?;

        let queries: Vec<SearchQuery> = serde_json::from_str(&queries_json).unwrap_or_default();
        let filters: FilterConfig = serde_json::from_str(&filters_json).unwrap_or_default();
        let log: Vec<TaskLogEntry> = serde_json::from_str(&log_json).unwrap_or_default();

        Ok(SearchTask {
            id,
            owner_id,
            mode: SearchMode::parse(&mode_str).unwrap_or_default(),
            queries,
            filters,
            billing: BillingPolicy::parse(&billing_str).unwrap_or_default(),
            status: TaskStatus::parse(&status_str).unwrap_or(TaskStatus::Pending),
            progress_percent,
            counters,
            log,
            error_message,
            created_at: parse_timestamp(&created_at_str),
            started_at: started_at_str.as_deref().map(parse_timestamp),
            completed_at: completed_at_str.as_deref().map(parse_timestamp),
        })
    }

    fn get_locked(conn: &Connection, id: &str) -> Result<SearchTask, TaskError> {
        let sql = format!("SELECT {} FROM search_tasks WHERE id = ?", TASK_COLUMNS);
        match conn.query_row(&sql, params![id], Self::row_to_task) {
            Ok(task) => Ok(task),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(TaskError::NotFound(id.to_string())),
            Err(e) => Err(TaskError::Database(e.to_string())),
        }
    }

    fn set_status_locked(
        conn: &Connection,
        id: &str,
        status: TaskStatus,
    ) -> Result<SearchTask, TaskError> {
        let mut task = Self::get_locked(conn, id)?;

        if !task.status.can_transition_to(status) {
            return Err(TaskError::InvalidTransition {
                task_id: id.to_string(),
                from: task.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let started_at = match status {
            TaskStatus::Running => Some(now),
            _ => task.started_at,
        };
        let completed_at = if status.is_terminal() {
            Some(now)
        } else {
            task.completed_at
        };

        conn.execute(
            "UPDATE search_tasks SET status = ?, started_at = ?, completed_at = ? WHERE id = ?",
            params![
                status.as_str(),
                started_at.map(|t| t.to_rfc3339()),
                completed_at.map(|t| t.to_rfc3339()),
                id,
            ],
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        task.status = status;
        task.started_at = started_at;
        task.completed_at = completed_at;
        Ok(task)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl TaskStore for SqliteTaskStore {
    fn create(&self, request: CreateTaskRequest) -> Result<SearchTask, TaskError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let queries_json = serde_json::to_string(&request.queries)
            .map_err(|e| TaskError::Database(e.to_string()))?;
        let filters_json = serde_json::to_string(&request.filters)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO search_tasks (id, owner_id, mode, queries, filters, billing, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                request.owner_id,
                request.mode.as_str(),
                queries_json,
                filters_json,
                request.billing.as_str(),
                TaskStatus::Pending.as_str(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Ok(SearchTask {
            id,
            owner_id: request.owner_id,
            mode: request.mode,
            queries: request.queries,
            filters: request.filters,
            billing: request.billing,
            status: TaskStatus::Pending,
            progress_percent: 0,
            counters: TaskCounters::default(),
            log: Vec::new(),
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        })
    }

    fn get(&self, id: &str) -> Result<Option<SearchTask>, TaskError> {
        let conn = self.conn.lock().unwrap();
        match Self::get_locked(&conn, id) {
            Ok(task) => Ok(Some(task)),
            Err(TaskError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<SearchTask>, TaskError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM search_tasks {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            TASK_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_task)
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.map_err(|e| TaskError::Database(e.to_string()))?);
        }
        Ok(tasks)
    }

    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM search_tasks {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| TaskError::Database(e.to_string()))
    }

    fn update_progress(&self, id: &str, update: &TaskUpdate) -> Result<(), TaskError> {
        if update.is_empty() {
            return Ok(());
        }

        let conn = self.conn.lock().unwrap();

        let mut sets = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(percent) = update.progress_percent {
            sets.push("progress_percent = ?");
            params.push(Box::new(percent));
        }
        if let Some(used) = update.search_requests_used {
            sets.push("search_requests_used = ?");
            params.push(Box::new(used));
        }
        if let Some(used) = update.detail_requests_used {
            sets.push("detail_requests_used = ?");
            params.push(Box::new(used));
        }
        if let Some(hits) = update.cache_hits {
            sets.push("cache_hits = ?");
            params.push(Box::new(hits));
        }
        if let Some(total) = update.total_results {
            sets.push("total_results = ?");
            params.push(Box::new(total));
        }
        if let Some(credits) = update.credits_used {
            sets.push("credits_used = ?");
            params.push(Box::new(credits));
        }
        if let Some(ref log) = update.log {
            // Keep the most recent entries within the cap.
            let start = log.len().saturating_sub(self.log_cap);
            let capped = serde_json::to_string(&log[start..])
                .map_err(|e| TaskError::Database(e.to_string()))?;
            sets.push("log = ?");
            params.push(Box::new(capped));
        }

        let sql = format!("UPDATE search_tasks SET {} WHERE id = ?", sets.join(", "));
        params.push(Box::new(id.to_string()));
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let changed = conn
            .execute(&sql, param_refs.as_slice())
            .map_err(|e| TaskError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(TaskError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn set_status(&self, id: &str, status: TaskStatus) -> Result<SearchTask, TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::set_status_locked(&conn, id, status)
    }

    fn complete(&self, id: &str, counters: &TaskCounters) -> Result<SearchTask, TaskError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE search_tasks SET progress_percent = 100, search_requests_used = ?,
                 detail_requests_used = ?, cache_hits = ?, total_results = ?, credits_used = ?
             WHERE id = ?",
            params![
                counters.search_requests_used,
                counters.detail_requests_used,
                counters.cache_hits,
                counters.total_results,
                counters.credits_used,
                id,
            ],
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Self::set_status_locked(&conn, id, TaskStatus::Completed)
    }

    fn fail(&self, id: &str, error_message: &str) -> Result<SearchTask, TaskError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE search_tasks SET error_message = ? WHERE id = ?",
            params![error_message, id],
        )
        .map_err(|e| TaskError::Database(e.to_string()))?;

        Self::set_status_locked(&conn, id, TaskStatus::Failed)
    }

    fn annotate(&self, id: &str, message: &str) -> Result<(), TaskError> {
        let conn = self.conn.lock().unwrap();

        let changed = conn
            .execute(
                "UPDATE search_tasks SET error_message = ? WHERE id = ?",
                params![message, id],
            )
            .map_err(|e| TaskError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(TaskError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn put_results(&self, id: &str, records: &[PersonRecord]) -> Result<(), TaskError> {
        let mut conn = self.conn.lock().unwrap();

        let tx = conn
            .transaction()
            .map_err(|e| TaskError::Database(e.to_string()))?;

        tx.execute("DELETE FROM task_results WHERE task_id = ?", params![id])
            .map_err(|e| TaskError::Database(e.to_string()))?;

        for (position, record) in records.iter().enumerate() {
            let json =
                serde_json::to_string(record).map_err(|e| TaskError::Database(e.to_string()))?;
            tx.execute(
                "INSERT INTO task_results (task_id, position, record) VALUES (?, ?, ?)",
                params![id, position as i64, json],
            )
            .map_err(|e| TaskError::Database(e.to_string()))?;
        }

        tx.commit().map_err(|e| TaskError::Database(e.to_string()))
    }

    fn results(&self, id: &str, limit: i64, offset: i64) -> Result<Vec<PersonRecord>, TaskError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT record FROM task_results WHERE task_id = ?
                 ORDER BY position ASC LIMIT ? OFFSET ?",
            )
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![id, limit, offset], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| TaskError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let json = row.map_err(|e| TaskError::Database(e.to_string()))?;
            let record: PersonRecord =
                serde_json::from_str(&json).map_err(|e| TaskError::Database(e.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::PersonRecord;

    fn create_test_store() -> SqliteTaskStore {
        SqliteTaskStore::in_memory().unwrap()
    }

    fn create_test_request() -> CreateTaskRequest {
        CreateTaskRequest {
            owner_id: "user-1".to_string(),
            mode: SearchMode::NameOnly,
            queries: vec![SearchQuery::name_only("Jane Doe")],
            filters: FilterConfig::default(),
            billing: BillingPolicy::PostpaidDeduct,
        }
    }

    fn test_record(name: &str) -> PersonRecord {
        PersonRecord {
            name: name.to_string(),
            age: Some(40),
            location: None,
            phone: None,
            marital_status: None,
            deceased: None,
            relatives: vec![],
            emails: vec![],
            report_year: None,
            from_cache: false,
        }
    }

    #[test]
    fn test_create_task() {
        let store = create_test_store();
        let task = store.create(create_test_request()).unwrap();

        assert!(!task.id.is_empty());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress_percent, 0);
        assert_eq!(task.counters, TaskCounters::default());
        assert!(task.started_at.is_none());
    }

    #[test]
    fn test_get_roundtrip() {
        let store = create_test_store();
        let created = store.create(create_test_request()).unwrap();

        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.queries, created.queries);
        assert_eq!(fetched.filters, created.filters);
        assert_eq!(fetched.billing, created.billing);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_update_progress_merges_only_set_fields() {
        let store = create_test_store();
        let task = store.create(create_test_request()).unwrap();

        store
            .update_progress(
                &task.id,
                &TaskUpdate::new().with_progress(30).with_search_requests(4),
            )
            .unwrap();
        store
            .update_progress(&task.id, &TaskUpdate::new().with_cache_hits(2))
            .unwrap();

        let fetched = store.get(&task.id).unwrap().unwrap();
        assert_eq!(fetched.progress_percent, 30);
        assert_eq!(fetched.counters.search_requests_used, 4);
        assert_eq!(fetched.counters.cache_hits, 2);
    }

    #[test]
    fn test_update_progress_nonexistent() {
        let store = create_test_store();
        let result = store.update_progress("nope", &TaskUpdate::new().with_progress(10));
        assert!(matches!(result, Err(TaskError::NotFound(_))));
    }

    #[test]
    fn test_log_truncated_to_cap_keeping_most_recent() {
        let store = SqliteTaskStore::in_memory().unwrap().with_log_cap(3);
        let task = store.create(create_test_request()).unwrap();

        let log: Vec<TaskLogEntry> = (0..5)
            .map(|i| TaskLogEntry::now(format!("entry {}", i)))
            .collect();
        store
            .update_progress(&task.id, &TaskUpdate::new().with_log(log))
            .unwrap();

        let fetched = store.get(&task.id).unwrap().unwrap();
        assert_eq!(fetched.log.len(), 3);
        assert_eq!(fetched.log[0].message, "entry 2");
        assert_eq!(fetched.log[2].message, "entry 4");
    }

    #[test]
    fn test_set_status_forward() {
        let store = create_test_store();
        let task = store.create(create_test_request()).unwrap();

        let running = store.set_status(&task.id, TaskStatus::Running).unwrap();
        assert_eq!(running.status, TaskStatus::Running);
        assert!(running.started_at.is_some());
        assert!(running.completed_at.is_none());

        let cancelled = store.set_status(&task.id, TaskStatus::Cancelled).unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());
    }

    #[test]
    fn test_set_status_rejects_backward_transition() {
        let store = create_test_store();
        let task = store.create(create_test_request()).unwrap();

        store.set_status(&task.id, TaskStatus::Running).unwrap();
        store.set_status(&task.id, TaskStatus::Completed).unwrap();

        let result = store.set_status(&task.id, TaskStatus::Running);
        assert!(matches!(result, Err(TaskError::InvalidTransition { .. })));
    }

    #[test]
    fn test_complete_persists_final_counters() {
        let store = create_test_store();
        let task = store.create(create_test_request()).unwrap();
        store.set_status(&task.id, TaskStatus::Running).unwrap();

        let counters = TaskCounters {
            search_requests_used: 3,
            detail_requests_used: 2,
            cache_hits: 1,
            total_results: 2,
            credits_used: 630,
        };
        let completed = store.complete(&task.id, &counters).unwrap();

        assert_eq!(completed.status, TaskStatus::Completed);
        let fetched = store.get(&task.id).unwrap().unwrap();
        assert_eq!(fetched.progress_percent, 100);
        assert_eq!(fetched.counters, counters);
    }

    #[test]
    fn test_fail_records_message() {
        let store = create_test_store();
        let task = store.create(create_test_request()).unwrap();
        store.set_status(&task.id, TaskStatus::Running).unwrap();

        let failed = store.fail(&task.id, "provider exploded").unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);

        let fetched = store.get(&task.id).unwrap().unwrap();
        assert_eq!(fetched.error_message.as_deref(), Some("provider exploded"));
    }

    #[test]
    fn test_annotate_keeps_status() {
        let store = create_test_store();
        let task = store.create(create_test_request()).unwrap();
        store.set_status(&task.id, TaskStatus::Running).unwrap();
        store
            .complete(&task.id, &TaskCounters::default())
            .unwrap();

        store
            .annotate(&task.id, "billing shortfall: deduction failed")
            .unwrap();

        let fetched = store.get(&task.id).unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Completed);
        assert!(fetched.error_message.is_some());
    }

    #[test]
    fn test_results_preserve_order() {
        let store = create_test_store();
        let task = store.create(create_test_request()).unwrap();

        let records = vec![test_record("A"), test_record("B"), test_record("C")];
        store.put_results(&task.id, &records).unwrap();

        let fetched = store.results(&task.id, 10, 0).unwrap();
        let names: Vec<_> = fetched.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        let page = store.results(&task.id, 2, 1).unwrap();
        let names: Vec<_> = page.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[test]
    fn test_put_results_replaces_previous_set() {
        let store = create_test_store();
        let task = store.create(create_test_request()).unwrap();

        store
            .put_results(&task.id, &[test_record("Old")])
            .unwrap();
        store
            .put_results(&task.id, &[test_record("New1"), test_record("New2")])
            .unwrap();

        let fetched = store.results(&task.id, 10, 0).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].name, "New1");
    }

    #[test]
    fn test_list_filters_and_pagination() {
        let store = create_test_store();

        for i in 0..3 {
            let mut request = create_test_request();
            request.owner_id = format!("owner-{}", i % 2);
            store.create(request).unwrap();
        }

        let all = store.list(&TaskFilter::new()).unwrap();
        assert_eq!(all.len(), 3);

        let filter = TaskFilter::new().with_owner("owner-0");
        assert_eq!(store.list(&filter).unwrap().len(), 2);
        assert_eq!(store.count(&filter).unwrap(), 2);

        let filter = TaskFilter::new().with_limit(2).with_offset(2);
        assert_eq!(store.list(&filter).unwrap().len(), 1);
    }

    #[test]
    fn test_list_with_status_filter() {
        let store = create_test_store();
        let task1 = store.create(create_test_request()).unwrap();
        store.create(create_test_request()).unwrap();

        store.set_status(&task1.id, TaskStatus::Running).unwrap();

        let filter = TaskFilter::new().with_status("running");
        let tasks = store.list(&filter).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, task1.id);
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("tasks.db");

        let store = SqliteTaskStore::new(&db_path).unwrap();
        let task = store.create(create_test_request()).unwrap();

        assert!(db_path.exists());
        assert!(store.get(&task.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_with_retry_succeeds_first_try() {
        use std::time::Duration;

        let store = create_test_store();
        let task = store.create(create_test_request()).unwrap();

        super::super::update_progress_with_retry(
            &store,
            &task.id,
            &TaskUpdate::new().with_progress(42),
            3,
            Duration::from_millis(1),
        )
        .await
        .unwrap();

        let fetched = store.get(&task.id).unwrap().unwrap();
        assert_eq!(fetched.progress_percent, 42);
    }

    #[tokio::test]
    async fn test_update_with_retry_propagates_not_found() {
        use std::time::Duration;

        let store = create_test_store();
        let result = super::super::update_progress_with_retry(
            &store,
            "nope",
            &TaskUpdate::new().with_progress(1),
            3,
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(TaskError::NotFound(_))));
    }
}
