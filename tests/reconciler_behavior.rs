//! Behavior-driven tests for quote and history reconciliation
//!
//! These tests verify HOW the reconciler decides between serving stored data
//! and fetching from the provider, using in-memory records and a scripted
//! provider so every fetch is observable.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tickwatch_core::{
    DateRange, HistoryEntry, ProviderError, QuoteProvider, QuoteSnapshot, Reconciler,
    RefreshError, RefreshOutcome, StockRecord, StoreError, Symbol, TradingDay, UtcDateTime,
};
use time::{Duration, OffsetDateTime};

// =============================================================================
// Test doubles
// =============================================================================

/// Provider that counts calls and records the span it was asked for.
struct ScriptedProvider {
    price: f64,
    failing: HashSet<String>,
    quote_calls: AtomicUsize,
    history_calls: AtomicUsize,
    last_span: Mutex<Option<DateRange>>,
}

impl ScriptedProvider {
    fn new(price: f64) -> Self {
        Self {
            price,
            failing: HashSet::new(),
            quote_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            last_span: Mutex::new(None),
        }
    }

    fn failing_for(mut self, symbols: &[&str]) -> Self {
        self.failing = symbols.iter().map(|raw| (*raw).to_string()).collect();
        self
    }

    fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn last_span(&self) -> Option<DateRange> {
        *self.last_span.lock().expect("span lock")
    }
}

impl QuoteProvider for ScriptedProvider {
    fn quote<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<QuoteSnapshot, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(symbol.as_str()) {
                return Err(ProviderError::unavailable("scripted outage"));
            }
            QuoteSnapshot::new(
                symbol.clone(),
                format!("{symbol} Inc."),
                self.price,
                0.5,
                UtcDateTime::now(),
            )
            .map_err(|error| ProviderError::internal(error.to_string()))
        })
    }

    fn history<'a>(
        &'a self,
        symbol: &'a Symbol,
        range: DateRange,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(symbol.as_str()) {
                return Err(ProviderError::unavailable("scripted outage"));
            }
            *self.last_span.lock().expect("span lock") = Some(range);
            Ok(range
                .days()
                .map(|date| {
                    HistoryEntry::new(date, 100.0, 101.0, 102.0, 99.0).expect("valid entry")
                })
                .collect())
        })
    }
}

/// Record held entirely in memory, tracking how often quotes were applied.
struct InMemoryStock {
    symbol: Symbol,
    current_price: Option<f64>,
    updated_at: UtcDateTime,
    history: Vec<HistoryEntry>,
    quotes_applied: usize,
}

impl InMemoryStock {
    fn new(raw: &str, current_price: Option<f64>, updated_at: UtcDateTime) -> Self {
        Self {
            symbol: symbol(raw),
            current_price,
            updated_at,
            history: Vec::new(),
            quotes_applied: 0,
        }
    }

    fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }
}

impl StockRecord for InMemoryStock {
    fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    fn updated_at(&self) -> UtcDateTime {
        self.updated_at
    }

    fn apply_quote<'a>(
        &'a mut self,
        snapshot: QuoteSnapshot,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.current_price = Some(snapshot.current_price);
            self.updated_at = snapshot.as_of;
            self.quotes_applied += 1;
            Ok(())
        })
    }

    fn stored_history<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.history.clone()) })
    }

    fn append_history<'a>(
        &'a mut self,
        entries: Vec<HistoryEntry>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.history.extend(entries.iter().copied());
            Ok(entries)
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

fn day(raw: &str) -> TradingDay {
    TradingDay::parse(raw).expect("valid date")
}

fn range(start: &str, end: &str) -> DateRange {
    DateRange::new(day(start), day(end)).expect("valid range")
}

fn hours_ago(hours: i64) -> UtcDateTime {
    UtcDateTime::from_offset_datetime(OffsetDateTime::now_utc() - Duration::hours(hours))
        .expect("utc timestamp")
}

fn entry(date: &str) -> HistoryEntry {
    HistoryEntry::new(day(date), 100.0, 101.0, 102.0, 99.0).expect("valid entry")
}

// =============================================================================
// Quote refresh: staleness rule
// =============================================================================

#[tokio::test]
async fn when_price_is_null_refresh_fetches_even_if_recently_updated() {
    // Given: a record with no price yet, touched minutes ago
    let provider = Arc::new(ScriptedProvider::new(187.5));
    let reconciler = Reconciler::new(provider.clone());
    let mut stock = InMemoryStock::new("AAPL", None, hours_ago(0));

    // When: the record is refreshed
    let outcome = reconciler.refresh_quote(&mut stock).await.expect("refresh");

    // Then: a null price counts as stale regardless of updated_at
    assert_eq!(outcome, RefreshOutcome::Refreshed);
    assert_eq!(provider.quote_calls(), 1);
    assert_eq!(stock.current_price, Some(187.5));
}

#[tokio::test]
async fn when_quote_is_fresh_provider_is_not_called() {
    // Given: a record refreshed two hours ago, well inside the 24h window
    let provider = Arc::new(ScriptedProvider::new(187.5));
    let reconciler = Reconciler::new(provider.clone());
    let mut stock = InMemoryStock::new("AAPL", Some(100.0), hours_ago(2));

    // When: the record is refreshed
    let outcome = reconciler.refresh_quote(&mut stock).await.expect("refresh");

    // Then: the record is untouched and no fetch happened
    assert_eq!(outcome, RefreshOutcome::AlreadyFresh);
    assert_eq!(provider.quote_calls(), 0);
    assert_eq!(stock.current_price, Some(100.0));
    assert_eq!(stock.quotes_applied, 0);
}

#[tokio::test]
async fn when_quote_is_stale_exactly_one_fetch_is_applied() {
    // Given: a record last updated 30 hours ago
    let provider = Arc::new(ScriptedProvider::new(42.0));
    let reconciler = Reconciler::new(provider.clone());
    let mut stock = InMemoryStock::new("MSFT", Some(400.0), hours_ago(30));

    // When: the record is refreshed
    let outcome = reconciler.refresh_quote(&mut stock).await.expect("refresh");

    // Then: one fetch, one application, fields overwritten
    assert_eq!(outcome, RefreshOutcome::Refreshed);
    assert_eq!(provider.quote_calls(), 1);
    assert_eq!(stock.quotes_applied, 1);
    assert_eq!(stock.current_price, Some(42.0));
}

#[tokio::test]
async fn when_freshness_window_is_shortened_recent_quotes_become_stale() {
    // Given: a reconciler with a 5-minute window and a 10-minute-old quote
    let provider = Arc::new(ScriptedProvider::new(12.0));
    let reconciler =
        Reconciler::new(provider.clone()).with_freshness_window(Duration::minutes(5));
    let mut stock = InMemoryStock::new("GOOG", Some(150.0), {
        UtcDateTime::from_offset_datetime(OffsetDateTime::now_utc() - Duration::minutes(10))
            .expect("utc timestamp")
    });

    // When: the record is refreshed
    let outcome = reconciler.refresh_quote(&mut stock).await.expect("refresh");

    // Then: the shorter window forces a fetch
    assert_eq!(outcome, RefreshOutcome::Refreshed);
    assert_eq!(provider.quote_calls(), 1);
}

// =============================================================================
// Quote refresh: bulk semantics
// =============================================================================

#[tokio::test]
async fn when_bulk_refreshing_outcomes_preserve_input_order() {
    // Given: a stale, a fresh, and a stale record in that order
    let provider = Arc::new(ScriptedProvider::new(10.0));
    let reconciler = Reconciler::new(provider.clone());
    let mut stocks = vec![
        InMemoryStock::new("AAPL", None, hours_ago(0)),
        InMemoryStock::new("MSFT", Some(400.0), hours_ago(1)),
        InMemoryStock::new("GOOG", Some(150.0), hours_ago(48)),
    ];

    // When: the batch is refreshed concurrently
    let outcomes = reconciler.refresh_quotes(&mut stocks).await.expect("bulk");

    // Then: outcomes line up with the input, not with completion order
    assert_eq!(
        outcomes,
        vec![
            RefreshOutcome::Refreshed,
            RefreshOutcome::AlreadyFresh,
            RefreshOutcome::Refreshed,
        ]
    );
    assert_eq!(provider.quote_calls(), 2);
    assert_eq!(stocks[0].symbol.as_str(), "AAPL");
    assert_eq!(stocks[1].symbol.as_str(), "MSFT");
    assert_eq!(stocks[2].symbol.as_str(), "GOOG");
}

#[tokio::test]
async fn when_one_record_fails_the_bulk_refresh_rejects() {
    // Given: a batch where the middle symbol's provider call fails
    let provider = Arc::new(ScriptedProvider::new(10.0).failing_for(&["MSFT"]));
    let reconciler = Reconciler::new(provider);
    let mut stocks = vec![
        InMemoryStock::new("AAPL", None, hours_ago(0)),
        InMemoryStock::new("MSFT", None, hours_ago(0)),
        InMemoryStock::new("GOOG", None, hours_ago(0)),
    ];

    // When: the batch is refreshed
    let error = reconciler
        .refresh_quotes(&mut stocks)
        .await
        .expect_err("must fail fast");

    // Then: the provider failure surfaces as-is
    assert!(matches!(error, RefreshError::Provider(_)));
}

// =============================================================================
// History reconciliation
// =============================================================================

#[tokio::test]
async fn when_no_history_is_stored_the_whole_range_is_fetched() {
    // Given: a record with empty history and a five-day range
    let provider = Arc::new(ScriptedProvider::new(10.0));
    let reconciler = Reconciler::new(provider.clone());
    let mut stock = InMemoryStock::new("AAPL", Some(1.0), hours_ago(0));
    let wanted = range("2024-03-04", "2024-03-08");

    // When: history is reconciled
    let merged = reconciler
        .refresh_history(&mut stock, wanted)
        .await
        .expect("history");

    // Then: one fetch spanning the full range, returned most recent first
    assert_eq!(provider.history_calls(), 1);
    assert_eq!(provider.last_span(), Some(wanted));
    assert_eq!(merged.len(), 5);
    assert_eq!(merged[0].date, day("2024-03-08"));
    assert_eq!(merged[4].date, day("2024-03-04"));
}

#[tokio::test]
async fn when_range_is_fully_covered_stored_rows_return_unchanged() {
    // Given: stored rows for every day of the range
    let provider = Arc::new(ScriptedProvider::new(10.0));
    let reconciler = Reconciler::new(provider.clone());
    let stored = vec![entry("2024-03-06"), entry("2024-03-05"), entry("2024-03-04")];
    let mut stock = InMemoryStock::new("AAPL", Some(1.0), hours_ago(0))
        .with_history(stored.clone());

    // When: history is reconciled over the same days
    let merged = reconciler
        .refresh_history(&mut stock, range("2024-03-04", "2024-03-06"))
        .await
        .expect("history");

    // Then: the stored rows come back deep-equal and nothing was fetched
    assert_eq!(merged, stored);
    assert_eq!(provider.history_calls(), 0);
}

#[tokio::test]
async fn when_one_day_is_missing_only_that_day_is_spanned() {
    // Given: stored rows with a hole on the middle day
    let provider = Arc::new(ScriptedProvider::new(10.0));
    let reconciler = Reconciler::new(provider.clone());
    let mut stock = InMemoryStock::new("AAPL", Some(1.0), hours_ago(0)).with_history(vec![
        entry("2024-03-08"),
        entry("2024-03-07"),
        entry("2024-03-05"),
        entry("2024-03-04"),
    ]);

    // When: history is reconciled across the hole
    let merged = reconciler
        .refresh_history(&mut stock, range("2024-03-04", "2024-03-08"))
        .await
        .expect("history");

    // Then: the fetch span collapses to the single missing day
    assert_eq!(provider.history_calls(), 1);
    assert_eq!(
        provider.last_span(),
        Some(range("2024-03-06", "2024-03-06"))
    );
    assert_eq!(merged.len(), 5);
    // Merged output is strictly descending by date
    for pair in merged.windows(2) {
        assert!(pair[0].date > pair[1].date, "entries must descend by date");
    }
}

#[tokio::test]
async fn when_gaps_flank_a_stored_day_no_duplicate_is_produced() {
    // Given: only the middle day stored, gaps on both sides
    let provider = Arc::new(ScriptedProvider::new(10.0));
    let reconciler = Reconciler::new(provider.clone());
    let mut stock = InMemoryStock::new("AAPL", Some(1.0), hours_ago(0))
        .with_history(vec![entry("2024-03-06")]);
    let wanted = range("2024-03-04", "2024-03-08");

    // When: history is reconciled
    let merged = reconciler
        .refresh_history(&mut stock, wanted)
        .await
        .expect("history");

    // Then: the span covers first..last missing day, but the fetched copy of
    // the already-stored day is discarded before persisting
    assert_eq!(provider.last_span(), Some(wanted));
    assert_eq!(merged.len(), 5);
    let dates: HashSet<TradingDay> = merged.iter().map(|e| e.date).collect();
    assert_eq!(dates.len(), 5, "no duplicate dates after merge");
    assert_eq!(stock.history.len(), 5);
}

#[tokio::test]
async fn when_bulk_history_runs_results_keep_input_order() {
    // Given: two records with differing coverage over a shared range
    let provider = Arc::new(ScriptedProvider::new(10.0));
    let reconciler = Reconciler::new(provider.clone());
    let mut stocks = vec![
        InMemoryStock::new("AAPL", Some(1.0), hours_ago(0))
            .with_history(vec![entry("2024-03-05"), entry("2024-03-04")]),
        InMemoryStock::new("MSFT", Some(1.0), hours_ago(0)),
    ];
    let wanted = range("2024-03-04", "2024-03-05");

    // When: bulk history reconciliation runs
    let results = reconciler
        .refresh_histories(&mut stocks, wanted)
        .await
        .expect("bulk history");

    // Then: each record's result sits at its input index
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].len(), 2);
    assert_eq!(results[1].len(), 2);
    // Only the uncovered record triggered a fetch
    assert_eq!(provider.history_calls(), 1);
}

#[tokio::test]
async fn when_store_read_fails_the_error_propagates() {
    // Given: a record whose history read always fails
    struct BrokenStock(Symbol);

    impl StockRecord for BrokenStock {
        fn symbol(&self) -> &Symbol {
            &self.0
        }
        fn current_price(&self) -> Option<f64> {
            Some(1.0)
        }
        fn updated_at(&self) -> UtcDateTime {
            UtcDateTime::now()
        }
        fn apply_quote<'a>(
            &'a mut self,
            _snapshot: QuoteSnapshot,
        ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
            Box::pin(async move { Ok(()) })
        }
        fn stored_history<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send + 'a>>
        {
            Box::pin(async move { Err(StoreError::Backend(String::from("disk on fire"))) })
        }
        fn append_history<'a>(
            &'a mut self,
            entries: Vec<HistoryEntry>,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send + 'a>>
        {
            Box::pin(async move { Ok(entries) })
        }
    }

    let reconciler = Reconciler::new(Arc::new(ScriptedProvider::new(10.0)));
    let mut stock = BrokenStock(symbol("AAPL"));

    // When: history reconciliation hits the broken read
    let error = reconciler
        .refresh_history(&mut stock, range("2024-03-04", "2024-03-05"))
        .await
        .expect_err("must fail");

    // Then: the store error is surfaced, not swallowed
    assert!(matches!(error, RefreshError::Store(StoreError::Backend(_))));
}
