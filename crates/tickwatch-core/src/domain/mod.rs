//! Domain types shared across the workspace.

pub mod models;
pub mod symbol;
pub mod timestamp;
pub mod trading_day;

pub use models::{HistoryEntry, QuoteSnapshot};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
pub use trading_day::{DateRange, Days, TradingDay};
