//! # Tickwatch Store
//!
//! DuckDB-based persistence layer for Tickwatch.
//!
//! ## Overview
//!
//! This crate stores watched stocks, their per-day price history, users, and
//! the user/stock watchlist association, and exposes the lookups the
//! reconciliation layer and the API handlers build on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickwatch_store::StockStore;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = StockStore::open_default()?;
//!
//!     if let Some(stock) = store.lookup_stock("AAPL")? {
//!         println!("{} last updated {}", stock.symbol, stock.updated_at);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Security
//!
//! User-provided values are passed through parameterized queries. The one
//! interpolated fragment, [`quoted_list`], only ever receives validated
//! [`Symbol`] values, whose grammar excludes quoting characters.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `stocks` | One row per watched symbol with the latest quote |
//! | `stock_history` | Daily OHLC rows keyed by (symbol, date) |
//! | `users` | Registered users |
//! | `watchlist` | User-to-stock association |

pub mod duckdb;
pub mod migrations;
pub mod record;

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::ToSql;
use tickwatch_core::{
    DateRange, HistoryEntry, QuoteSnapshot, StoreError, Symbol, UtcDateTime,
};
use uuid::Uuid;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};
pub use record::StoredStock;

/// Configuration for the store database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of connections in the pool.
    pub max_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: resolve_tickwatch_home().join("tickwatch.duckdb"),
            max_pool_size: 4,
        }
    }
}

/// A persisted stock row with its latest quote fields.
///
/// `current_price` is `NULL` until the first successful provider fetch;
/// the reconciler treats such rows as stale.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StockRow {
    pub symbol: Symbol,
    pub name: String,
    pub current_price: Option<f64>,
    pub change: f64,
    pub is_positive_change: bool,
    pub updated_at: UtcDateTime,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: UtcDateTime,
}

/// Render symbols as a single-quoted, comma-joined SQL literal list.
///
/// `['AAPL']` becomes `'AAPL'` and `['AAPL', 'GOOG']` becomes
/// `'AAPL','GOOG'`. Pure formatting; callers validate first. The symbol
/// grammar admits only letters, `.` and `-`, so no escaping is needed.
pub fn quoted_list(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(|symbol| format!("'{symbol}'"))
        .collect::<Vec<_>>()
        .join(",")
}

/// The main store interface for stock, history, user, and watchlist data.
#[derive(Clone)]
pub struct StockStore {
    manager: DuckDbConnectionManager,
}

impl StockStore {
    /// Open a store with default configuration.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(StoreConfig::default())
    }

    /// Open a store with the specified configuration.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::backend)?;
        }

        let manager = DuckDbConnectionManager::new(config.db_path, config.max_pool_size);
        let store = Self { manager };
        store.initialize()?;
        Ok(store)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        migrations::apply_migrations(&connection).map_err(StoreError::backend)
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Look up a single stock by raw symbol input.
    ///
    /// Invalid input short-circuits to `Ok(None)` without touching the
    /// database; a valid but absent symbol is also `Ok(None)`.
    pub fn lookup_stock(&self, raw: &str) -> Result<Option<StockRow>, StoreError> {
        let Ok(symbol) = Symbol::parse(raw) else {
            return Ok(None);
        };

        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        let mut statement = connection
            .prepare(
                "SELECT symbol, name, current_price, price_change, is_positive_change, updated_at \
                 FROM stocks WHERE symbol = ?",
            )
            .map_err(StoreError::backend)?;
        let params: [&dyn ToSql; 1] = [&symbol.as_str()];
        let mut rows = statement
            .query(params.as_slice())
            .map_err(StoreError::backend)?;

        match rows.next().map_err(StoreError::backend)? {
            Some(row) => read_stock_row(row).map(Some),
            None => Ok(None),
        }
    }

    /// Look up several stocks at once.
    ///
    /// Invalid entries are filtered before the query. Results preserve the
    /// input order; symbols absent from the store are omitted.
    pub fn lookup_stocks(&self, raws: &[&str]) -> Result<Vec<StockRow>, StoreError> {
        let symbols: Vec<Symbol> = raws
            .iter()
            .filter_map(|raw| Symbol::parse(raw).ok())
            .collect();
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        let sql = format!(
            "SELECT symbol, name, current_price, price_change, is_positive_change, updated_at \
             FROM stocks WHERE symbol IN ({})",
            quoted_list(&symbols)
        );
        let mut statement = connection.prepare(sql.as_str()).map_err(StoreError::backend)?;
        let mut rows = statement
            .query([] as [&dyn ToSql; 0])
            .map_err(StoreError::backend)?;

        let mut by_symbol = HashMap::new();
        while let Some(row) = rows.next().map_err(StoreError::backend)? {
            let stock = read_stock_row(row)?;
            by_symbol.insert(stock.symbol.to_string(), stock);
        }

        Ok(symbols
            .iter()
            .filter_map(|symbol| by_symbol.remove(symbol.as_str()))
            .collect())
    }

    /// Insert a stock row from its first fetched quote.
    pub fn insert_stock(&self, snapshot: &QuoteSnapshot) -> Result<StockRow, StoreError> {
        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        let updated_at = snapshot.as_of.format_rfc3339();
        let params: [&dyn ToSql; 6] = [
            &snapshot.symbol.as_str(),
            &snapshot.name,
            &snapshot.current_price,
            &snapshot.change,
            &snapshot.is_positive_change,
            &updated_at,
        ];
        connection
            .execute(
                "INSERT INTO stocks \
                 (symbol, name, current_price, price_change, is_positive_change, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                params.as_slice(),
            )
            .map_err(StoreError::backend)?;

        Ok(StockRow {
            symbol: snapshot.symbol.clone(),
            name: snapshot.name.clone(),
            current_price: Some(snapshot.current_price),
            change: snapshot.change,
            is_positive_change: snapshot.is_positive_change,
            updated_at: snapshot.as_of,
        })
    }

    /// Overwrite a stock's quote fields from a fresh snapshot.
    pub fn update_stock(&self, snapshot: &QuoteSnapshot) -> Result<StockRow, StoreError> {
        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        let updated_at = snapshot.as_of.format_rfc3339();
        let params: [&dyn ToSql; 6] = [
            &snapshot.name,
            &snapshot.current_price,
            &snapshot.change,
            &snapshot.is_positive_change,
            &updated_at,
            &snapshot.symbol.as_str(),
        ];
        let changed = connection
            .execute(
                "UPDATE stocks SET name = ?, current_price = ?, price_change = ?, \
                 is_positive_change = ?, updated_at = ? WHERE symbol = ?",
                params.as_slice(),
            )
            .map_err(StoreError::backend)?;

        if changed == 0 {
            return Err(StoreError::NotFound(snapshot.symbol.to_string()));
        }

        Ok(StockRow {
            symbol: snapshot.symbol.clone(),
            name: snapshot.name.clone(),
            current_price: Some(snapshot.current_price),
            change: snapshot.change,
            is_positive_change: snapshot.is_positive_change,
            updated_at: snapshot.as_of,
        })
    }

    /// All stored history for a symbol, most recent day first.
    pub fn history_for(&self, symbol: &Symbol) -> Result<Vec<HistoryEntry>, StoreError> {
        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        let mut statement = connection
            .prepare(
                "SELECT date, open, close, high, low FROM stock_history \
                 WHERE symbol = ? ORDER BY date DESC",
            )
            .map_err(StoreError::backend)?;
        let params: [&dyn ToSql; 1] = [&symbol.as_str()];
        collect_history(statement.query(params.as_slice()).map_err(StoreError::backend)?)
    }

    /// Stored history within the closed range, most recent day first.
    pub fn history_between(
        &self,
        symbol: &Symbol,
        range: DateRange,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        let mut statement = connection
            .prepare(
                "SELECT date, open, close, high, low FROM stock_history \
                 WHERE symbol = ? AND date >= ? AND date <= ? ORDER BY date DESC",
            )
            .map_err(StoreError::backend)?;
        let start = range.start().to_string();
        let end = range.end().to_string();
        let params: [&dyn ToSql; 3] = [&symbol.as_str(), &start, &end];
        collect_history(statement.query(params.as_slice()).map_err(StoreError::backend)?)
    }

    /// Persist history rows, ignoring days already stored for the symbol.
    ///
    /// Returns the entries as passed; duplicates by (symbol, date) are
    /// silently dropped by the primary key.
    pub fn insert_history(
        &self,
        symbol: &Symbol,
        entries: &[HistoryEntry],
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        connection
            .execute_batch("BEGIN TRANSACTION")
            .map_err(StoreError::backend)?;
        let result = (|| -> Result<(), StoreError> {
            for entry in entries {
                let date = entry.date.to_string();
                let params: [&dyn ToSql; 6] = [
                    &symbol.as_str(),
                    &date,
                    &entry.open,
                    &entry.close,
                    &entry.high,
                    &entry.low,
                ];
                connection
                    .execute(
                        "INSERT OR IGNORE INTO stock_history \
                         (symbol, date, open, close, high, low) VALUES (?, ?, ?, ?, ?, ?)",
                        params.as_slice(),
                    )
                    .map_err(StoreError::backend)?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                connection
                    .execute_batch("COMMIT")
                    .map_err(StoreError::backend)?;
                Ok(entries.to_vec())
            }
            Err(error) => {
                let _ = connection.execute_batch("ROLLBACK");
                Err(error)
            }
        }
    }

    /// Stored history for a raw symbol within a range, keyed by the symbol.
    ///
    /// Invalid input or a symbol not present in the store yields `Ok(None)`.
    /// Entries are descending by date, so the first entry is the most recent.
    pub fn history_by_date(
        &self,
        raw: &str,
        range: DateRange,
    ) -> Result<Option<HashMap<String, Vec<HistoryEntry>>>, StoreError> {
        let Some(stock) = self.lookup_stock(raw)? else {
            return Ok(None);
        };

        let entries = self.history_between(&stock.symbol, range)?;
        let mut by_symbol = HashMap::new();
        by_symbol.insert(stock.symbol.to_string(), entries);
        Ok(Some(by_symbol))
    }

    /// Register a user. Fails with [`StoreError::Conflict`] on a known email.
    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<UserRow, StoreError> {
        if self.find_user_by_email(email)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "email '{email}' is already registered"
            )));
        }

        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        let id = Uuid::new_v4().to_string();
        let created_at = UtcDateTime::now();
        let created_at_text = created_at.format_rfc3339();
        let params: [&dyn ToSql; 4] = [&id, &email, &password_hash, &created_at_text];
        connection
            .execute(
                "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
                params.as_slice(),
            )
            .map_err(StoreError::backend)?;

        Ok(UserRow {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        self.query_user("SELECT id, email, password_hash, created_at FROM users WHERE email = ?", email)
    }

    pub fn find_user(&self, id: &str) -> Result<Option<UserRow>, StoreError> {
        self.query_user("SELECT id, email, password_hash, created_at FROM users WHERE id = ?", id)
    }

    fn query_user(&self, sql: &str, key: &str) -> Result<Option<UserRow>, StoreError> {
        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        let mut statement = connection.prepare(sql).map_err(StoreError::backend)?;
        let params: [&dyn ToSql; 1] = [&key];
        let mut rows = statement
            .query(params.as_slice())
            .map_err(StoreError::backend)?;

        let Some(row) = rows.next().map_err(StoreError::backend)? else {
            return Ok(None);
        };

        let id: String = row.get(0).map_err(StoreError::backend)?;
        let email: String = row.get(1).map_err(StoreError::backend)?;
        let password_hash: String = row.get(2).map_err(StoreError::backend)?;
        let created_at_text: String = row.get(3).map_err(StoreError::backend)?;
        let created_at = UtcDateTime::parse(&created_at_text).map_err(StoreError::backend)?;

        Ok(Some(UserRow {
            id,
            email,
            password_hash,
            created_at,
        }))
    }

    /// Link a stock to a user's watchlist. Idempotent.
    ///
    /// The user must exist; the stock row must already exist (first-fetch
    /// creation happens before linking).
    pub fn add_to_watchlist(&self, user_id: &str, symbol: &Symbol) -> Result<(), StoreError> {
        if self.find_user(user_id)?.is_none() {
            return Err(StoreError::NotFound(format!("user '{user_id}'")));
        }

        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        let added_at = UtcDateTime::now().format_rfc3339();
        let params: [&dyn ToSql; 3] = [&user_id, &symbol.as_str(), &added_at];
        connection
            .execute(
                "INSERT OR IGNORE INTO watchlist (user_id, symbol, added_at) VALUES (?, ?, ?)",
                params.as_slice(),
            )
            .map_err(StoreError::backend)?;
        Ok(())
    }

    /// The symbols on a user's watchlist, oldest addition first.
    pub fn watchlist_symbols(&self, user_id: &str) -> Result<Vec<Symbol>, StoreError> {
        let connection = self
            .manager
            .acquire()
            .map_err(StoreError::backend)?;
        let mut statement = connection
            .prepare(
                "SELECT symbol FROM watchlist WHERE user_id = ? ORDER BY added_at, symbol",
            )
            .map_err(StoreError::backend)?;
        let params: [&dyn ToSql; 1] = [&user_id];
        let mut rows = statement
            .query(params.as_slice())
            .map_err(StoreError::backend)?;

        let mut symbols = Vec::new();
        while let Some(row) = rows.next().map_err(StoreError::backend)? {
            let raw: String = row.get(0).map_err(StoreError::backend)?;
            symbols.push(Symbol::parse(&raw).map_err(StoreError::backend)?);
        }
        Ok(symbols)
    }

    /// Wrap a stored stock as a mutable record for the reconciler.
    ///
    /// Invalid or absent symbols yield `Ok(None)`, mirroring `lookup_stock`.
    pub fn stock_record(&self, raw: &str) -> Result<Option<StoredStock>, StoreError> {
        let Some(row) = self.lookup_stock(raw)? else {
            return Ok(None);
        };
        Ok(Some(StoredStock::new(self.clone(), row)))
    }
}

fn read_stock_row(row: &::duckdb::Row<'_>) -> Result<StockRow, StoreError> {
    let raw_symbol: String = row.get(0).map_err(StoreError::backend)?;
    let name: String = row.get(1).map_err(StoreError::backend)?;
    let current_price: Option<f64> = row.get(2).map_err(StoreError::backend)?;
    let change: f64 = row.get(3).map_err(StoreError::backend)?;
    let is_positive_change: bool = row.get(4).map_err(StoreError::backend)?;
    let updated_at_text: String = row.get(5).map_err(StoreError::backend)?;

    Ok(StockRow {
        symbol: Symbol::parse(&raw_symbol).map_err(StoreError::backend)?,
        name,
        current_price,
        change,
        is_positive_change,
        updated_at: UtcDateTime::parse(&updated_at_text).map_err(StoreError::backend)?,
    })
}

fn collect_history(mut rows: ::duckdb::Rows<'_>) -> Result<Vec<HistoryEntry>, StoreError> {
    let mut entries = Vec::new();
    while let Some(row) = rows.next().map_err(StoreError::backend)? {
        let date_text: String = row.get(0).map_err(StoreError::backend)?;
        let open: f64 = row.get(1).map_err(StoreError::backend)?;
        let close: f64 = row.get(2).map_err(StoreError::backend)?;
        let high: f64 = row.get(3).map_err(StoreError::backend)?;
        let low: f64 = row.get(4).map_err(StoreError::backend)?;

        let date = tickwatch_core::TradingDay::parse(&date_text).map_err(StoreError::backend)?;
        entries.push(
            HistoryEntry::new(date, open, close, high, low).map_err(StoreError::backend)?,
        );
    }
    Ok(entries)
}

/// Resolve the tickwatch home directory from environment or default.
fn resolve_tickwatch_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKWATCH_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickwatch");
    }

    PathBuf::from(".tickwatch")
}
