use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::{debug, warn};
use mysql_async::prelude::Queryable;
use mysql_async::{OptsBuilder, PoolConstraints, PoolOpts};

use crate::Result;
use crate::config::DbConfig;
use crate::error::DbError;
use crate::udbc::dialect::{Dialect, MYSQL_DIALECT};
use crate::udbc::driver::Driver;
use crate::udbc::mysql::dsn::{Address, MysqlDsn};
use crate::udbc::pool::Pool;
use crate::udbc::PoolOptions;

/// `MysqlDriver` builds `mysql_async` pools from `user:password@tcp(host:port)/schema`
/// connection strings.
pub struct MysqlDriver {
    dialect: Dialect,
}

impl Default for MysqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MysqlDriver {
    pub fn new() -> Self {
        Self {
            dialect: MYSQL_DIALECT,
        }
    }

    /// Replaces the dialect, e.g. to register the driver under another name.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    fn build_opts(dsn: &MysqlDsn, options: &PoolOptions) -> Result<OptsBuilder> {
        let max_open = options.max_open_or_default() as usize;
        // mysql_async requires: min <= max and max > 0
        let min_idle = (options.max_idle as usize).min(max_open);
        let constraints = PoolConstraints::new(min_idle, max_open).ok_or_else(|| {
            DbError::Config(format!(
                "Invalid pool constraints: max_idle ({}) > max_open ({})",
                min_idle, max_open
            ))
        })?;

        let mut pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_abs_conn_ttl(options.max_lifetime);
        if let Some(idle) = options.max_idle_time {
            pool_opts = pool_opts.with_inactive_connection_ttl(idle);
        }

        let mut builder = OptsBuilder::default()
            .user(Some(dsn.user.clone()))
            .pass(Some(dsn.password.clone()))
            .db_name((!dsn.schema.is_empty()).then(|| dsn.schema.clone()))
            .pool_opts(pool_opts);
        builder = match &dsn.address {
            Address::Tcp { host, port } => builder.ip_or_hostname(host.clone()).tcp_port(*port),
            Address::Socket(path) => builder.socket(Some(path.clone())),
        };
        Ok(builder)
    }
}

#[async_trait]
impl Driver for MysqlDriver {
    fn name(&self) -> &str {
        self.dialect.name
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn open(&self, dsn: &str, cfg: &DbConfig) -> Result<Arc<dyn Pool>> {
        let dsn = MysqlDsn::parse(dsn)?;
        let options = cfg.pool_options();
        if cfg.ssl_enabled {
            warn!("[{}] SslEnabled is not applied to mysql connections", self.name());
        }
        debug!("[{}] pool options: {:?}", self.name(), options);

        let opts = Self::build_opts(&dsn, &options)?;
        Ok(Arc::new(MysqlPool::new(mysql_async::Pool::new(opts))))
    }
}

/// A `mysql_async` pool.
pub struct MysqlPool {
    pool: mysql_async::Pool,
    closed: AtomicBool,
}

impl MysqlPool {
    pub fn new(pool: mysql_async::Pool) -> Self {
        Self {
            pool,
            closed: AtomicBool::new(false),
        }
    }

    /// The underlying pool; clones share the same connections.
    pub fn pool(&self) -> &mysql_async::Pool {
        &self.pool
    }
}

#[async_trait]
impl Pool for MysqlPool {
    async fn query_version(&self, sql: &str) -> Result<String> {
        let mut conn = self.pool.get_conn().await?;
        let version: Option<String> = conn.query_first(sql).await?;
        version.ok_or_else(|| DbError::Probe(format!("'{}' returned no rows", sql)))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // disconnect() consumes the handle; the clone signals the shared pool.
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(|e| DbError::Pool(format!("Failed to close pool: {}", e)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_opts_applies_limits() {
        let cfg = DbConfig::new("mysql").pool(30, 600, 2, 8);
        let dsn = MysqlDsn::parse("u:p@tcp(db:3306)/app").unwrap();
        let opts: mysql_async::Opts = MysqlDriver::build_opts(&dsn, &cfg.pool_options())
            .unwrap()
            .into();

        assert_eq!(opts.user(), Some("u"));
        assert_eq!(opts.pass(), Some("p"));
        assert_eq!(opts.db_name(), Some("app"));
        assert_eq!(opts.ip_or_hostname(), "db");
        assert_eq!(opts.tcp_port(), 3306);

        let pool_opts = opts.pool_opts();
        assert_eq!(pool_opts.constraints().min(), 2);
        assert_eq!(pool_opts.constraints().max(), 8);
        assert_eq!(pool_opts.abs_conn_ttl(), Some(std::time::Duration::from_secs(600)));
        assert_eq!(
            pool_opts.inactive_connection_ttl(),
            std::time::Duration::from_secs(30)
        );
    }

    #[test]
    fn test_unbounded_open_uses_default_ceiling() {
        let cfg = DbConfig::new("mysql").pool(0, 0, 0, 0);
        let dsn = MysqlDsn::parse("u:p@tcp(db:3306)/").unwrap();
        let opts: mysql_async::Opts = MysqlDriver::build_opts(&dsn, &cfg.pool_options())
            .unwrap()
            .into();
        assert_eq!(
            opts.pool_opts().constraints().max(),
            crate::udbc::DEFAULT_MAX_OPEN as usize
        );
        assert_eq!(opts.db_name(), None);
    }

    #[test]
    fn test_idle_clamped_to_default_ceiling() {
        let cfg = DbConfig::new("mysql").pool(0, 0, 200, 0);
        let dsn = MysqlDsn::parse("u:p@tcp(db:3306)/app").unwrap();
        let opts: mysql_async::Opts = MysqlDriver::build_opts(&dsn, &cfg.pool_options())
            .unwrap()
            .into();
        let constraints = opts.pool_opts().constraints();
        assert_eq!(constraints.min(), crate::udbc::DEFAULT_MAX_OPEN as usize);
        assert_eq!(constraints.max(), crate::udbc::DEFAULT_MAX_OPEN as usize);
    }

    #[tokio::test]
    async fn test_open_does_not_connect() {
        let driver = MysqlDriver::new();
        let cfg = DbConfig::new("mysql");
        let pool = driver
            .open("u:p@tcp(127.0.0.1:1)/app", &cfg)
            .await
            .unwrap();
        assert!(pool.as_any().downcast_ref::<MysqlPool>().is_some());
        pool.close().await.unwrap();
        pool.close().await.unwrap();
    }
}
