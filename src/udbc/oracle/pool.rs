use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::debug;
use oracle::pool::{CloseMode, PoolBuilder};

use crate::Result;
use crate::config::DbConfig;
use crate::error::DbError;
use crate::udbc::dialect::{Dialect, ORACLE_DIALECT};
use crate::udbc::driver::Driver;
use crate::udbc::pool::Pool;
use crate::udbc::PoolOptions;

/// Credentials and connect string split out of `user/password@connect_string`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleDsn {
    pub username: String,
    pub password: String,
    pub connect_string: String,
}

impl OracleDsn {
    pub fn parse(dsn: &str) -> Result<Self> {
        let (username, rest) = dsn
            .split_once('/')
            .ok_or_else(|| DbError::InvalidDsn("missing '/' in oracle dsn".to_string()))?;
        // Passwords may contain '@'; connect strings do not.
        let (password, connect_string) = rest
            .rsplit_once('@')
            .ok_or_else(|| DbError::InvalidDsn("missing '@' in oracle dsn".to_string()))?;
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
            connect_string: connect_string.to_string(),
        })
    }
}

/// `OracleDriver` builds session pools through the Oracle client libraries.
pub struct OracleDriver {
    dialect: Dialect,
}

impl Default for OracleDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl OracleDriver {
    pub fn new() -> Self {
        Self {
            dialect: ORACLE_DIALECT,
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

#[async_trait]
impl Driver for OracleDriver {
    fn name(&self) -> &str {
        self.dialect.name
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn open(&self, dsn: &str, cfg: &DbConfig) -> Result<Arc<dyn Pool>> {
        let dsn = OracleDsn::parse(dsn)?;
        let options = cfg.pool_options();
        debug!("[{}] pool options: {:?}", self.name(), options);
        let pool = tokio::task::spawn_blocking(move || OraclePool::build(&dsn, &options)).await??;
        Ok(Arc::new(pool))
    }
}

/// An Oracle session pool.
pub struct OraclePool {
    pool: oracle::pool::Pool,
    closed: AtomicBool,
}

impl OraclePool {
    /// Creates the session pool. Blocks on the Oracle client.
    pub fn build(dsn: &OracleDsn, options: &PoolOptions) -> Result<Self> {
        let max_open = options.max_open_or_default();
        let pool = PoolBuilder::new(&dsn.username, &dsn.password, &dsn.connect_string)
            .min_connections(options.max_idle.min(max_open))
            .max_connections(max_open)
            .build()?;
        if let Some(idle) = options.max_idle_time {
            pool.set_timeout(idle)?;
        }
        if let Some(lifetime) = options.max_lifetime {
            pool.set_max_lifetime_connection(lifetime)?;
        }
        Ok(Self {
            pool,
            closed: AtomicBool::new(false),
        })
    }

    pub fn pool(&self) -> &oracle::pool::Pool {
        &self.pool
    }
}

#[async_trait]
impl Pool for OraclePool {
    async fn query_version(&self, sql: &str) -> Result<String> {
        let pool = self.pool.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let banner = conn.query_row_as::<String>(&sql, &[])?;
            Ok::<_, DbError>(banner)
        })
        .await?
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.close(&CloseMode::Default)).await??;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
