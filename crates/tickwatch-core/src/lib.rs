//! # Tickwatch Core
//!
//! Domain types and reconciliation logic for the tickwatch stock-watching
//! backend.
//!
//! ## Overview
//!
//! This crate provides the foundational components for tickwatch:
//!
//! - **Domain types** for symbols, trading days, quote snapshots, and
//!   per-day OHLC history
//! - **Provider contract** ([`QuoteProvider`]) with structured errors
//! - **Record contract** ([`StockRecord`]) abstracting persisted stocks
//! - **Reconciler** applying the freshness window to quotes and filling
//!   gaps in stored history
//! - **Circuit breaker** for resilient upstream calls
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Yahoo) |
//! | [`circuit_breaker`] | Circuit breaker for resilient calls |
//! | [`domain`] | Domain models (Symbol, TradingDay, QuoteSnapshot, HistoryEntry) |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`provider`] | Quote provider trait and provider errors |
//! | [`record`] | Stored-record capability trait |
//! | [`refresh`] | Freshness/reconciliation layer |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tickwatch_core::{Reconciler, YahooProvider};
//!
//! let reconciler = Reconciler::new(Arc::new(YahooProvider::default()));
//! let outcome = reconciler.refresh_quote(&mut record).await?;
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result` types with structured errors:
//!
//! ```rust
//! use tickwatch_core::{ProviderError, ProviderErrorKind};
//!
//! fn handle_error(error: ProviderError) {
//!     match error.kind() {
//!         ProviderErrorKind::RateLimited => {
//!             // Back off upstream
//!         }
//!         ProviderErrorKind::Unavailable => {
//!             // Surface to the caller
//!         }
//!         ProviderErrorKind::NotFound => {
//!             // Unknown ticker
//!         }
//!         _ => {}
//!     }
//! }
//! ```

pub mod adapters;
pub mod circuit_breaker;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod provider;
pub mod record;
pub mod refresh;

// Re-export commonly used types at crate root for convenience

// Adapter implementations
pub use adapters::YahooProvider;

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Domain models
pub use domain::{DateRange, HistoryEntry, QuoteSnapshot, Symbol, TradingDay, UtcDateTime};

// Error types
pub use error::ValidationError;

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};

// Provider contract
pub use provider::{ProviderError, ProviderErrorKind, QuoteProvider};

// Record contract
pub use record::{StockRecord, StoreError};

// Reconciliation
pub use refresh::{
    Reconciler, RefreshError, RefreshOutcome, DEFAULT_FRESHNESS_WINDOW,
};
