//! # Tickwatch API
//!
//! REST boundary for Tickwatch: stock lookups and history ranges served
//! through the reconciler, plus user registration and per-user watchlists.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/users` | Register a user |
//! | POST | `/api/login` | Verify credentials |
//! | POST | `/api/users/:id/stocks` | Add a symbol to the watchlist |
//! | GET | `/api/users/:id/stocks` | Watchlist, bulk-refreshed |
//! | GET | `/api/stocks/:symbol` | Single stock, refreshed |
//! | GET | `/api/stocks/:symbol/history` | Reconciled history range |
//!
//! Errors are JSON `{"message": "..."}` with the matching status code.

pub mod error;
pub mod password;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

/// Build the application router with tracing and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
