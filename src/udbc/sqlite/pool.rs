use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::debug;
use r2d2::{ManageConnection, PooledConnection};
use rusqlite::OpenFlags;

use crate::Result;
use crate::config::DbConfig;
use crate::error::DbError;
use crate::udbc::dialect::{Dialect, SQLITE_DIALECT};
use crate::udbc::driver::Driver;
use crate::udbc::pool::Pool;
use crate::udbc::PoolOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    Memory,
    Path(String),
}

impl SqliteTarget {
    /// Accepts a bare path, `:memory:`, a `file:` URI, or any of those behind a
    /// `sqlite:` / `sqlite://` prefix.
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim();
        let stripped = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed)
            .trim();

        if stripped.is_empty() {
            return Err(DbError::InvalidDsn(format!(
                "empty sqlite database path '{}'",
                url
            )));
        }

        if stripped == ":memory:" {
            return Ok(SqliteTarget::Memory);
        }

        Ok(SqliteTarget::Path(stripped.to_string()))
    }
}

/// r2d2 connection manager for rusqlite.
#[derive(Debug)]
pub struct SqliteManager {
    target: SqliteTarget,
}

impl SqliteManager {
    pub fn new(target: SqliteTarget) -> Self {
        Self { target }
    }
}

impl ManageConnection for SqliteManager {
    type Connection = rusqlite::Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> std::result::Result<rusqlite::Connection, rusqlite::Error> {
        let conn = match &self.target {
            SqliteTarget::Memory => rusqlite::Connection::open_in_memory()?,
            // Default flags include SQLITE_OPEN_URI, so `file:` URIs work too.
            SqliteTarget::Path(p) => rusqlite::Connection::open_with_flags(p, OpenFlags::default())?,
        };
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut rusqlite::Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch("")
    }

    fn has_broken(&self, _conn: &mut rusqlite::Connection) -> bool {
        false
    }
}

/// `SqliteDriver` builds r2d2 pools over a database file or `:memory:`.
///
/// The connection string is the database path, passed through unchanged from
/// `DbConfig::connection_string`.
pub struct SqliteDriver {
    dialect: Dialect,
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteDriver {
    pub fn new() -> Self {
        Self {
            dialect: SQLITE_DIALECT,
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        self.dialect.name
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn open(&self, dsn: &str, cfg: &DbConfig) -> Result<Arc<dyn Pool>> {
        let target = SqliteTarget::parse(dsn)?;
        let options = cfg.pool_options();
        debug!("[{}] pool options: {:?}", self.name(), options);
        Ok(Arc::new(SqlitePool::new(target, &options)))
    }
}

type R2d2Pool = r2d2::Pool<SqliteManager>;

/// An r2d2 pool of rusqlite connections.
///
/// `PoolOptions::max_idle` maps to r2d2's `min_idle`: r2d2 has no idle
/// ceiling, so that many connections are opened in the background and kept
/// warm, and `idle_timeout` only reaps connections above that floor.
pub struct SqlitePool {
    target: SqliteTarget,
    pool: Mutex<Option<R2d2Pool>>,
}

impl SqlitePool {
    pub fn new(target: SqliteTarget, options: &PoolOptions) -> Self {
        let max_size = options.max_open_or_default();
        // r2d2 keeps `min_idle` connections warm; it must not exceed `max_size`.
        let pool = r2d2::Pool::builder()
            .max_size(max_size)
            .min_idle(Some(options.max_idle.min(max_size)))
            .idle_timeout(options.max_idle_time)
            .max_lifetime(options.max_lifetime)
            .build_unchecked(SqliteManager::new(target.clone()));
        Self {
            target,
            pool: Mutex::new(Some(pool)),
        }
    }

    fn inner(&self) -> Result<R2d2Pool> {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| DbError::Pool("sqlite pool is closed".to_string()))
    }

    /// Checks out a connection, blocking until one is available.
    ///
    /// Call from a blocking context such as `tokio::task::spawn_blocking`.
    pub fn get(&self) -> Result<PooledConnection<SqliteManager>> {
        Ok(self.inner()?.get()?)
    }

    pub fn state(&self) -> Option<r2d2::State> {
        self.inner().ok().map(|p| p.state())
    }
}

#[async_trait]
impl Pool for SqlitePool {
    async fn query_version(&self, sql: &str) -> Result<String> {
        self.inner()?;
        // A fresh connection reports open failures at once; r2d2's `get` would
        // keep retrying until its connection timeout.
        let manager = SqliteManager::new(self.target.clone());
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = manager.connect()?;
            let version = conn.query_row(&sql, [], |row| row.get::<_, String>(0))?;
            Ok::<_, DbError>(version)
        })
        .await?
    }

    async fn close(&self) -> Result<()> {
        // Dropping the last handle closes every pooled connection.
        let pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(pool) = pool {
            tokio::task::spawn_blocking(move || drop(pool)).await?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(SqliteTarget::parse(":memory:").unwrap(), SqliteTarget::Memory);
        assert_eq!(SqliteTarget::parse("sqlite::memory:").unwrap(), SqliteTarget::Memory);
        assert_eq!(
            SqliteTarget::parse("sqlite://data/app.db").unwrap(),
            SqliteTarget::Path("data/app.db".into())
        );
        assert_eq!(
            SqliteTarget::parse("file:app.db?mode=ro").unwrap(),
            SqliteTarget::Path("file:app.db?mode=ro".into())
        );
        assert!(matches!(
            SqliteTarget::parse("  "),
            Err(DbError::InvalidDsn(_))
        ));
    }

    #[tokio::test]
    async fn test_sqlite_pool_in_memory() {
        let cfg = DbConfig::new("sqlite3").pool(60, 3600, 1, 4);
        let pool = SqliteDriver::new().open(":memory:", &cfg).await.unwrap();

        let version = pool.query_version("SELECT sqlite_version()").await.unwrap();
        assert!(version.starts_with('3'), "{version}");

        let sqlite = pool.as_any().downcast_ref::<SqlitePool>().unwrap();
        let state = sqlite.state().unwrap();
        assert!(state.connections <= 4);

        pool.close().await.unwrap();
        assert!(sqlite.state().is_none());
        assert!(matches!(
            pool.query_version("SELECT 1").await,
            Err(DbError::Pool(_))
        ));
        pool.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unopenable_path_fails_fast() {
        let pool = SqliteDriver::new()
            .open("/nonexistent_dir_for_udatasource/app.db", &DbConfig::new("sqlite3"))
            .await
            .unwrap();
        let started = std::time::Instant::now();
        let err = pool.query_version("SELECT sqlite_version()").await.unwrap_err();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert!(matches!(err, DbError::Driver(_)), "{err}");
        pool.close().await.unwrap();
    }

    #[test]
    fn test_idle_floor_clamped_to_default_ceiling() {
        let options = DbConfig::new("sqlite3").pool(0, 0, 200, 0).pool_options();
        let pool = SqlitePool::new(SqliteTarget::Memory, &options);
        let inner = pool.inner().unwrap();
        assert_eq!(inner.max_size(), crate::udbc::DEFAULT_MAX_OPEN);
        assert_eq!(inner.min_idle(), Some(crate::udbc::DEFAULT_MAX_OPEN));
    }

    #[tokio::test]
    async fn test_bad_probe_is_driver_error() {
        let pool = SqliteDriver::new()
            .open(":memory:", &DbConfig::new("sqlite3"))
            .await
            .unwrap();
        let err = pool
            .query_version("SELECT version FROM missing_table")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Driver(_)), "{err}");
    }
}
