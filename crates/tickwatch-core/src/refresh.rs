//! Quote and history reconciliation against a quote provider.
//!
//! The [`Reconciler`] decides when stored data is stale, fetches replacement
//! data from its [`QuoteProvider`], and applies it through each record's own
//! persistence operations. Fresh data is never re-fetched: a record inside
//! the freshness window is returned untouched, and a history range already
//! covered by stored rows triggers no upstream call at all.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use thiserror::Error;
use time::Duration;
use tracing::debug;

use crate::provider::{ProviderError, QuoteProvider};
use crate::record::{StockRecord, StoreError};
use crate::{DateRange, HistoryEntry, TradingDay};

/// Default freshness window: a quote older than this is refetched.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::hours(24);

/// Failure surfaced by a refresh operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a single quote refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The record was stale; a quote was fetched and applied.
    Refreshed,
    /// The record was within the freshness window; nothing was fetched.
    AlreadyFresh,
}

/// Freshness policy plus the provider used to fill gaps.
#[derive(Clone)]
pub struct Reconciler {
    provider: Arc<dyn QuoteProvider>,
    freshness_window: Duration,
}

impl Reconciler {
    pub fn new(provider: Arc<dyn QuoteProvider>) -> Self {
        Self {
            provider,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }

    /// Override the staleness cutoff. Mostly used by tests.
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn provider(&self) -> &Arc<dyn QuoteProvider> {
        &self.provider
    }

    fn is_stale<R>(&self, record: &R) -> bool
    where
        R: StockRecord + ?Sized,
    {
        record.current_price().is_none() || record.updated_at().elapsed() > self.freshness_window
    }

    /// Refresh one record's quote if it is stale.
    ///
    /// A record is stale when it has no price yet or its `updated_at` falls
    /// outside the freshness window. Stale records trigger exactly one
    /// provider fetch, applied via [`StockRecord::apply_quote`]; fresh
    /// records are left untouched and the provider is not called.
    pub async fn refresh_quote<R>(&self, record: &mut R) -> Result<RefreshOutcome, RefreshError>
    where
        R: StockRecord + ?Sized,
    {
        if !self.is_stale(record) {
            debug!(symbol = %record.symbol(), "quote within freshness window, skipping fetch");
            return Ok(RefreshOutcome::AlreadyFresh);
        }

        let snapshot = self.provider.quote(record.symbol()).await?;
        debug!(symbol = %snapshot.symbol, price = snapshot.current_price, "applying fetched quote");
        record.apply_quote(snapshot).await?;
        Ok(RefreshOutcome::Refreshed)
    }

    /// Refresh a batch of records concurrently.
    ///
    /// The per-record rule is the same as [`refresh_quote`](Self::refresh_quote).
    /// Outcomes come back in input order regardless of completion order, and
    /// the first failure rejects the whole batch.
    pub async fn refresh_quotes<R>(
        &self,
        records: &mut [R],
    ) -> Result<Vec<RefreshOutcome>, RefreshError>
    where
        R: StockRecord,
    {
        try_join_all(records.iter_mut().map(|record| self.refresh_quote(record))).await
    }

    /// Reconcile a record's stored history against a closed date range.
    ///
    /// Dates in the range with no stored row are fetched from the provider
    /// (one fetch spanning the first to last missing date), persisted through
    /// [`StockRecord::append_history`], and merged with the stored rows. The
    /// merged result is returned most recent first. When every date is
    /// already covered the stored rows are returned unchanged and the
    /// provider is not called.
    pub async fn refresh_history<R>(
        &self,
        record: &mut R,
        range: DateRange,
    ) -> Result<Vec<HistoryEntry>, RefreshError>
    where
        R: StockRecord + ?Sized,
    {
        let stored = record.stored_history().await?;

        let covered: HashSet<TradingDay> = stored.iter().map(|entry| entry.date).collect();
        let missing: Vec<TradingDay> = range
            .days()
            .filter(|day| !covered.contains(day))
            .collect();

        if missing.is_empty() {
            debug!(symbol = %record.symbol(), "history range fully covered, skipping fetch");
            return Ok(stored);
        }

        // days() yields ascending, so the span endpoints are first/last.
        let span = DateRange::new(missing[0], missing[missing.len() - 1])
            .expect("missing days are ascending");
        debug!(
            symbol = %record.symbol(),
            span_start = %span.start(),
            span_end = %span.end(),
            missing = missing.len(),
            "fetching history gap"
        );

        let fetched = self.provider.history(record.symbol(), span).await?;
        let missing_set: HashSet<TradingDay> = missing.into_iter().collect();
        let new_entries: Vec<HistoryEntry> = fetched
            .into_iter()
            .filter(|entry| missing_set.contains(&entry.date))
            .collect();

        let appended = record.append_history(new_entries).await?;

        let mut merged = stored;
        merged.extend(appended);
        merged.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(merged)
    }

    /// Reconcile history for a batch of records over one shared range.
    ///
    /// Records are processed independently and concurrently; results come
    /// back in input order and the first failure rejects the batch.
    pub async fn refresh_histories<R>(
        &self,
        records: &mut [R],
        range: DateRange,
    ) -> Result<Vec<Vec<HistoryEntry>>, RefreshError>
    where
        R: StockRecord,
    {
        try_join_all(
            records
                .iter_mut()
                .map(|record| self.refresh_history(record, range)),
        )
        .await
    }
}
