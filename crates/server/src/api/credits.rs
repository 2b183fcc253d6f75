//! Credit account API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use dossier_core::{EntryType, LedgerEntry};

use crate::state::AppState;

/// Maximum allowed limit for entry queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for entry queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for listing ledger entries
#[derive(Debug, Deserialize)]
pub struct ListEntriesParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for an account balance
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account_id: String,
    pub available: i64,
    pub frozen: i64,
}

/// Response for one ledger entry
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: i64,
    pub amount: i64,
    pub balance_after: i64,
    pub entry_type: EntryType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_task_id: Option<String>,
    pub created_at: String,
}

impl From<LedgerEntry> for EntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            amount: entry.amount,
            balance_after: entry.balance_after,
            entry_type: entry.entry_type,
            description: entry.description,
            related_task_id: entry.related_task_id,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Response for listing entries
#[derive(Debug, Serialize)]
pub struct ListEntriesResponse {
    pub account_id: String,
    pub entries: Vec<EntryResponse>,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct CreditErrorResponse {
    pub error: String,
}

/// Get an account balance. Unknown accounts read as empty.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> Result<Json<AccountResponse>, impl IntoResponse> {
    match state.ledger().account(&account) {
        Ok(account) => Ok(Json(AccountResponse {
            account_id: account.account_id,
            available: account.available,
            frozen: account.frozen,
        })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CreditErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

/// List an account's ledger entries, newest first.
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
    Query(params): Query<ListEntriesParams>,
) -> Result<Json<ListEntriesResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    match state.ledger().entries_for_account(&account, limit, offset) {
        Ok(entries) => Ok(Json(ListEntriesResponse {
            account_id: account,
            entries: entries.into_iter().map(EntryResponse::from).collect(),
            limit,
            offset,
        })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CreditErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
