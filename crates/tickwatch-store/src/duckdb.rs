//! `DuckDB` connection pooling for the stock store.
//!
//! Every store operation runs on a read-write handle, so the pool keeps a
//! single idle list. Connections are opened lazily and handed back on drop.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

struct PoolInner {
    db_path: PathBuf,
    max_idle: usize,
    idle: Mutex<Vec<Connection>>,
}

/// Hands out pooled connections to the store's database file.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Create a pool for the given database file, keeping at most
    /// `max_idle` idle connections around.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                db_path: path.into(),
                max_idle: max_idle.max(1),
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Acquire a connection, opening a new one when no idle handle exists.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned.
    pub fn acquire(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = self
            .inner
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned")
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => open_connection(self.inner.db_path.as_path())?,
        };

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Path of the backing database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }
}

/// A connection that returns to the pool when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self
            .pool
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned");
        if idle.len() < self.pool.max_idle {
            idle.push(connection);
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection, ::duckdb::Error> {
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_count(manager: &DuckDbConnectionManager) -> usize {
        manager
            .inner
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned")
            .len()
    }

    #[test]
    fn when_connection_dropped_then_it_returns_to_the_idle_pool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = DuckDbConnectionManager::new(dir.path().join("pool.duckdb"), 2);

        let connection = manager.acquire().expect("acquire");
        assert_eq!(idle_count(&manager), 0);
        drop(connection);
        assert_eq!(idle_count(&manager), 1);
    }

    #[test]
    fn when_idle_pool_is_full_then_extra_connections_are_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = DuckDbConnectionManager::new(dir.path().join("pool.duckdb"), 1);

        let first = manager.acquire().expect("acquire");
        let second = manager.acquire().expect("acquire");
        drop(first);
        drop(second);
        assert_eq!(idle_count(&manager), 1);
    }
}
