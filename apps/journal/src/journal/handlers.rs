//! Axum route handlers for the journal API.
//!
//! Store calls are synchronous and the runtime is single-threaded, so a load
//! and its rewrite never interleave with another request.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::journal::form::{build_entry_form, collect_submission, BlockSubmission, EntryForm};
use crate::journal::history::{build_history, HistoryView};
use crate::state::AppState;
use crate::store::Record;

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub message: String,
    pub record: Record,
}

#[derive(Debug, Serialize)]
pub struct RecordLookup {
    pub date: NaiveDate,
    /// `None` when nothing has been saved for that date yet.
    pub record: Option<Record>,
}

#[derive(Debug, Serialize)]
pub struct StatsView {
    pub title: &'static str,
    pub message: &'static str,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// GET /api/v1/entry
pub async fn handle_get_entry(State(state): State<AppState>) -> Result<Json<EntryForm>, AppError> {
    let date = today();
    let record = state.store.get(date)?;
    let form = build_entry_form(&state.config, date, record.as_ref())
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(Json(form))
}

/// POST /api/v1/entry/blocks/:block_id
pub async fn handle_save_block(
    State(state): State<AppState>,
    Path(block_id): Path<String>,
    Json(req): Json<BlockSubmission>,
) -> Result<Json<SaveResponse>, AppError> {
    let block = state
        .config
        .registry
        .block(&block_id)
        .ok_or_else(|| AppError::NotFound(format!("Block '{block_id}' not found")))?;

    let updates = collect_submission(block, &req)?;
    let record = state.store.upsert(today(), &updates)?;
    info!("Block '{}' saved ({} fields)", block.id, updates.len());

    Ok(Json(SaveResponse {
        message: format!("{} saved.", block.title),
        record,
    }))
}

/// GET /api/v1/entries/:date
pub async fn handle_get_record(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<RecordLookup>, AppError> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("'{date}' is not a YYYY-MM-DD date")))?;
    let record = state.store.get(date)?;
    Ok(Json(RecordLookup { date, record }))
}

/// GET /api/v1/history
pub async fn handle_history(State(state): State<AppState>) -> Result<Json<HistoryView>, AppError> {
    let store = state.store.load_all()?;
    Ok(Json(build_history(store)))
}

/// GET /api/v1/stats
pub async fn handle_stats() -> Json<StatsView> {
    Json(StatsView {
        title: "Stats (coming soon)",
        message: "This tab is ready for future plots / summaries from the same CSV.",
    })
}
