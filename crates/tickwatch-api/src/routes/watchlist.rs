//! Per-user watchlist endpoints.
//!
//! - `POST /api/users/:id/stocks` - add a symbol to the user's watchlist
//! - `GET /api/users/:id/stocks` - the watchlist, bulk-refreshed

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tickwatch_core::StockRecord;
use tickwatch_store::{StockRow, StoredStock};
use tracing::info;

use crate::error::ApiError;
use crate::routes::stocks::refreshed_stock;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    #[serde(default)]
    pub symbol: String,
}

/// POST /api/users/:id/stocks
async fn add_stock(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<AddStockRequest>,
) -> Result<(StatusCode, Json<StockRow>), ApiError> {
    let raw = request.symbol.trim();
    if raw.is_empty() {
        return Err(ApiError::BadRequest(String::from("symbol must not be empty")));
    }
    if state.store.find_user(&user_id)?.is_none() {
        return Err(ApiError::NotFound(format!("user '{user_id}' not found")));
    }

    let record = refreshed_stock(&state, raw).await?;
    state.store.add_to_watchlist(&user_id, record.symbol())?;
    info!(user_id = %user_id, symbol = %record.symbol(), "added to watchlist");

    Ok((StatusCode::CREATED, Json(record.into_row())))
}

/// GET /api/users/:id/stocks
async fn list_stocks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<StockRow>>, ApiError> {
    if state.store.find_user(&user_id)?.is_none() {
        return Err(ApiError::NotFound(format!("user '{user_id}' not found")));
    }

    let symbols = state.store.watchlist_symbols(&user_id)?;
    let mut records = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let record = state.store.stock_record(symbol.as_str())?.ok_or_else(|| {
            ApiError::Internal(format!("watchlist references missing stock '{symbol}'"))
        })?;
        records.push(record);
    }

    state.reconciler.refresh_quotes(&mut records).await?;
    Ok(Json(
        records.into_iter().map(StoredStock::into_row).collect(),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/users/:id/stocks", post(add_stock).get(list_stocks))
}
