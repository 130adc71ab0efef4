//! Shared application state injected into every handler.

use tickwatch_core::Reconciler;
use tickwatch_store::StockStore;

/// Store plus reconciler, cloned into each handler via axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: StockStore,
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(store: StockStore, reconciler: Reconciler) -> Self {
        Self { store, reconciler }
    }
}
