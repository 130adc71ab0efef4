//! Route modules and the combined `/api` router.

pub mod stocks;
pub mod users;
pub mod watchlist;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(stocks::router())
        .merge(watchlist::router())
}
