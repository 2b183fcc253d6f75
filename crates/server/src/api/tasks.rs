//! Task API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use dossier_core::{
    BillingPolicy, FilterConfig, PersonRecord, SearchMode, SearchQuery, SearchTask, SubmitError,
    SubmitRequest, TaskCounters, TaskError, TaskFilter, TaskLogEntry, TaskStatus,
};

use crate::state::AppState;

/// Maximum allowed limit for list queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for list queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a task
#[derive(Debug, Deserialize)]
pub struct CreateTaskBody {
    /// Account that owns the task and pays for it
    pub owner_id: String,
    /// How queries are interpreted (defaults to name-only)
    pub mode: Option<SearchMode>,
    /// Query batch, one entry per subtask
    pub queries: Vec<QueryBody>,
    /// Filter criteria; unset fields get product defaults
    pub filters: Option<FilterConfig>,
}

/// One query in a submission
#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub name: String,
    pub location: Option<String>,
}

/// Query parameters for listing tasks
#[derive(Debug, Deserialize)]
pub struct ListTasksParams {
    /// Filter by owner account
    pub owner_id: Option<String>,
    /// Filter by status
    pub status: Option<String>,
    /// Maximum number of tasks to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Query parameters for reading results
#[derive(Debug, Deserialize)]
pub struct ResultsParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for task operations
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub owner_id: String,
    pub mode: SearchMode,
    pub queries: Vec<SearchQuery>,
    pub filters: FilterConfig,
    pub billing: BillingPolicy,
    pub status: TaskStatus,
    pub progress_percent: u8,
    pub counters: TaskCounters,
    pub log: Vec<TaskLogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<SearchTask> for TaskResponse {
    fn from(task: SearchTask) -> Self {
        Self {
            id: task.id,
            owner_id: task.owner_id,
            mode: task.mode,
            queries: task.queries,
            filters: task.filters,
            billing: task.billing,
            status: task.status,
            progress_percent: task.progress_percent,
            counters: task.counters,
            log: task.log,
            error_message: task.error_message,
            created_at: task.created_at.to_rfc3339(),
            started_at: task.started_at.map(|t| t.to_rfc3339()),
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response for listing tasks
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for reading results
#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub results: Vec<PersonRecord>,
    pub total: u32,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TaskErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<TaskErrorResponse>) {
    (
        status,
        Json(TaskErrorResponse {
            error: error.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a new task
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskBody>,
) -> Result<(StatusCode, Json<TaskResponse>), impl IntoResponse> {
    let Some(collector) = state.collector() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            SubmitError::ProviderUnavailable.to_string(),
        ));
    };

    let request = SubmitRequest {
        owner_id: body.owner_id,
        mode: body.mode.unwrap_or_default(),
        queries: body
            .queries
            .into_iter()
            .map(|q| SearchQuery {
                name: q.name,
                location: q.location,
            })
            .collect(),
        filters: body.filters,
    };

    match collector.submit(request).await {
        Ok(task) if task.status == TaskStatus::InsufficientCredits => Err(error_response(
            StatusCode::PAYMENT_REQUIRED,
            format!("insufficient credits for task {}", task.id),
        )),
        Ok(task) => Ok((StatusCode::ACCEPTED, Json(TaskResponse::from(task)))),
        Err(SubmitError::EmptyBatch) => Err(error_response(
            StatusCode::BAD_REQUEST,
            SubmitError::EmptyBatch.to_string(),
        )),
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Get a task by ID
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, impl IntoResponse> {
    match state.task_store().get(&id) {
        Ok(Some(task)) => Ok(Json(TaskResponse::from(task))),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Task not found: {}", id),
        )),
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// List tasks with optional filters
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<ListTasksResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TaskFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref owner_id) = params.owner_id {
        filter = filter.with_owner(owner_id);
    }

    if let Some(ref status) = params.status {
        filter = filter.with_status(status);
    }

    let tasks = match state.task_store().list(&filter) {
        Ok(tasks) => tasks,
        Err(e) => {
            return Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    // Total count without pagination
    let count_filter = TaskFilter {
        limit: i64::MAX,
        offset: 0,
        ..filter
    };

    let total = match state.task_store().count(&count_filter) {
        Ok(count) => count,
        Err(e) => {
            return Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    Ok(Json(ListTasksResponse {
        tasks: tasks.into_iter().map(TaskResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Read a page of a task's results
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ResultsParams>,
) -> Result<Json<ResultsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let task = match state.task_store().get(&id) {
        Ok(Some(task)) => task,
        Ok(None) => {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                format!("Task not found: {}", id),
            ));
        }
        Err(e) => {
            return Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    match state.task_store().results(&id, limit, offset) {
        Ok(results) => Ok(Json(ResultsResponse {
            results,
            total: task.counters.total_results,
            limit,
            offset,
        })),
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Request cancellation of a task (DELETE endpoint)
///
/// Cancellation is cooperative; the task finalizes at its next wave
/// boundary, so the response usually still shows it running.
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<TaskResponse>), impl IntoResponse> {
    let Some(collector) = state.collector() else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            SubmitError::ProviderUnavailable.to_string(),
        ));
    };

    match collector.cancel(&id).await {
        Ok(task) => Ok((StatusCode::ACCEPTED, Json(TaskResponse::from(task)))),
        Err(SubmitError::Store(TaskError::NotFound(_))) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Task not found: {}", id),
        )),
        Err(SubmitError::Store(TaskError::InvalidTransition { from, .. })) => Err(error_response(
            StatusCode::CONFLICT,
            format!("Cannot cancel task: current status is {}", from),
        )),
        Err(e) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
