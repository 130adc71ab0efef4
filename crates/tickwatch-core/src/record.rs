//! Capability contract for stored stock records.
//!
//! The reconciler never talks to a database directly; it works against any
//! record exposing this trait. The store crate's row wrapper implements it
//! over DuckDB, and tests implement it with in-memory structs.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

use crate::{HistoryEntry, QuoteSnapshot, Symbol, UtcDateTime};

/// Persistence-layer failure surfaced through record operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stock '{0}' not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    pub fn backend(error: impl Display) -> Self {
        Self::Backend(error.to_string())
    }
}

/// A persisted stock row with the operations reconciliation needs.
///
/// `apply_quote` and `append_history` carry the persistence side effect;
/// the reconciler invokes each at most once per refresh.
pub trait StockRecord: Send {
    fn symbol(&self) -> &Symbol;

    /// `None` until the first successful quote fetch.
    fn current_price(&self) -> Option<f64>;

    fn updated_at(&self) -> UtcDateTime;

    /// Persist a fresh quote snapshot into this record.
    fn apply_quote<'a>(
        &'a mut self,
        snapshot: QuoteSnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// All history rows stored for this record, most recent first.
    fn stored_history<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send + 'a>>;

    /// Persist newly fetched history rows, returning the rows as stored.
    fn append_history<'a>(
        &'a mut self,
        entries: Vec<HistoryEntry>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send + 'a>>;
}
