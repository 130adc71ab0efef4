//! DuckDB-backed implementation of the reconciler's record contract.

use std::future::Future;
use std::pin::Pin;

use tickwatch_core::{
    HistoryEntry, QuoteSnapshot, StockRecord, StoreError, Symbol, UtcDateTime,
};

use crate::{StockRow, StockStore};

/// A stock row bound to its store, mutable through [`StockRecord`].
///
/// Quote and history writes go through the store immediately; the in-memory
/// row is kept in sync so staleness checks after a refresh see the new state.
pub struct StoredStock {
    store: StockStore,
    row: StockRow,
}

impl StoredStock {
    pub(crate) fn new(store: StockStore, row: StockRow) -> Self {
        Self { store, row }
    }

    pub fn row(&self) -> &StockRow {
        &self.row
    }

    pub fn into_row(self) -> StockRow {
        self.row
    }
}

impl StockRecord for StoredStock {
    fn symbol(&self) -> &Symbol {
        &self.row.symbol
    }

    fn current_price(&self) -> Option<f64> {
        self.row.current_price
    }

    fn updated_at(&self) -> UtcDateTime {
        self.row.updated_at
    }

    fn apply_quote<'a>(
        &'a mut self,
        snapshot: QuoteSnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.row = self.store.update_stock(&snapshot)?;
            Ok(())
        })
    }

    fn stored_history<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send + 'a>> {
        Box::pin(async move { self.store.history_for(&self.row.symbol) })
    }

    fn append_history<'a>(
        &'a mut self,
        entries: Vec<HistoryEntry>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send + 'a>> {
        Box::pin(async move { self.store.insert_history(&self.row.symbol, &entries) })
    }
}
