//! Stock lookup and history endpoints.
//!
//! - `GET /api/stocks/:symbol` - single stock, refreshed through the reconciler
//! - `GET /api/stocks/:symbol/history?start=&end=` - reconciled history range

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tickwatch_core::{DateRange, HistoryEntry, StockRecord, Symbol, TradingDay};
use tickwatch_store::{StockRow, StoredStock};

use crate::error::ApiError;
use crate::state::AppState;

/// Resolve a raw symbol to a refreshed record.
///
/// Symbols never seen before are created from their first provider fetch,
/// so a successful response always carries current quote fields.
pub(crate) async fn refreshed_stock(
    state: &AppState,
    raw: &str,
) -> Result<StoredStock, ApiError> {
    let symbol = Symbol::parse(raw)
        .map_err(|_| ApiError::BadRequest(format!("invalid symbol '{raw}'")))?;

    if let Some(mut record) = state.store.stock_record(symbol.as_str())? {
        state.reconciler.refresh_quote(&mut record).await?;
        return Ok(record);
    }

    let snapshot = state.reconciler.provider().quote(&symbol).await?;
    state.store.insert_stock(&snapshot)?;
    state
        .store
        .stock_record(symbol.as_str())?
        .ok_or_else(|| ApiError::Internal(format!("stock '{symbol}' missing after insert")))
}

/// GET /api/stocks/:symbol
async fn get_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<StockRow>, ApiError> {
    let record = refreshed_stock(&state, &symbol).await?;
    Ok(Json(record.into_row()))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start: String,
    pub end: String,
}

/// GET /api/stocks/:symbol/history?start=YYYY-MM-DD&end=YYYY-MM-DD
async fn get_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HashMap<String, Vec<HistoryEntry>>>, ApiError> {
    let start = TradingDay::parse(&query.start)
        .map_err(|_| ApiError::BadRequest(format!("invalid date '{}'", query.start)))?;
    let end = TradingDay::parse(&query.end)
        .map_err(|_| ApiError::BadRequest(format!("invalid date '{}'", query.end)))?;
    let range =
        DateRange::new(start, end).map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let mut record = refreshed_stock(&state, &symbol).await?;
    let entries = state.reconciler.refresh_history(&mut record, range).await?;

    let mut by_symbol = HashMap::new();
    by_symbol.insert(record.symbol().to_string(), entries);
    Ok(Json(by_symbol))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stocks/:symbol", get(get_stock))
        .route("/stocks/:symbol/history", get(get_history))
}
