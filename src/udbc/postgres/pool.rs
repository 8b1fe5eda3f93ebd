//! PostgreSQL pools: `tokio-postgres` clients managed by `deadpool`.

use std::any::Any;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use log::{debug, error};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::config::SslMode;
use tokio_postgres::{Client, NoTls};

use crate::Result;
use crate::config::DbConfig;
use crate::error::DbError;
use crate::udbc::dialect::{Dialect, POSTGRES_DIALECT};
use crate::udbc::driver::Driver;
use crate::udbc::pool::Pool;
use crate::udbc::PoolOptions;

/// Rewrites a translated `key=value` string into one libpq-style parsers
/// read as intended: `sslmode=enable` becomes `sslmode=require`, and empty
/// values (`password=`) are quoted so the next pair is not taken as the value.
pub fn normalize_dsn(dsn: &str) -> String {
    dsn.split_whitespace()
        .map(|kv| match kv {
            "sslmode=enable" => "sslmode=require".to_string(),
            kv if kv.ends_with('=') => format!("{}''", kv),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// TLS connector for a given `sslmode`.
///
/// `prefer` and `require` only ask for encryption, like libpq, so
/// certificate and hostname checks are off for them.
pub fn tls_connector(mode: SslMode) -> Result<TlsConnector> {
    let encrypt_only = matches!(mode, SslMode::Prefer | SslMode::Require);
    TlsConnector::builder()
        .danger_accept_invalid_certs(encrypt_only)
        .danger_accept_invalid_hostnames(encrypt_only)
        .build()
        .map_err(|e| DbError::Driver(format!("Failed to build TLS connector: {}", e)))
}

/// `PostgresDriver` builds pools from `key=value` connection strings.
pub struct PostgresDriver {
    dialect: Dialect,
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresDriver {
    pub fn new() -> Self {
        Self {
            dialect: POSTGRES_DIALECT,
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn name(&self) -> &str {
        self.dialect.name
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn open(&self, dsn: &str, cfg: &DbConfig) -> Result<Arc<dyn Pool>> {
        let config = tokio_postgres::Config::from_str(&normalize_dsn(dsn))
            .map_err(|e| DbError::InvalidDsn(e.to_string()))?;
        let options = cfg.pool_options();
        debug!("[{}] pool options: {:?}", self.name(), options);
        Ok(Arc::new(PostgresPool::new(config, options)?))
    }
}

/// Creates and recycles clients, enforcing idle time and lifetime on recycle.
///
/// `deadpool` has no idle-count limit, so `PoolOptions::max_idle` does not
/// apply to postgres pools.
pub struct PgManager {
    config: tokio_postgres::Config,
    options: PoolOptions,
}

impl PgManager {
    fn expired(&self, age: Duration, idle: Duration) -> Option<&'static str> {
        if self.options.max_lifetime.is_some_and(|ttl| age >= ttl) {
            return Some("connection exceeded max lifetime");
        }
        if self.options.max_idle_time.is_some_and(|ttl| idle >= ttl) {
            return Some("connection exceeded max idle time");
        }
        None
    }
}

fn spawn_connection<F>(connection: F)
where
    F: Future<Output = std::result::Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("postgres connection error: {}", e);
        }
    });
}

impl managed::Manager for PgManager {
    type Type = Client;
    type Error = DbError;

    async fn create(&self) -> Result<Client> {
        if self.config.get_ssl_mode() == SslMode::Disable {
            let (client, connection) = self.config.connect(NoTls).await?;
            spawn_connection(connection);
            return Ok(client);
        }

        let connector = tls_connector(self.config.get_ssl_mode())?;
        let (client, connection) = self
            .config
            .connect(MakeTlsConnector::new(connector))
            .await?;
        spawn_connection(connection);
        Ok(client)
    }

    async fn recycle(&self, client: &mut Client, metrics: &Metrics) -> RecycleResult<DbError> {
        if client.is_closed() {
            return Err(RecycleError::Message("connection closed".into()));
        }
        if let Some(why) = self.expired(metrics.age(), metrics.last_used()) {
            return Err(RecycleError::Message(why.into()));
        }
        Ok(())
    }
}

/// A `deadpool` pool of `tokio-postgres` clients.
pub struct PostgresPool {
    pool: managed::Pool<PgManager>,
}

impl PostgresPool {
    pub fn new(config: tokio_postgres::Config, options: PoolOptions) -> Result<Self> {
        let pool = managed::Pool::builder(PgManager { config, options })
            .max_size(options.max_open_or_default() as usize)
            .build()
            .map_err(|e| DbError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    /// The underlying `deadpool` pool.
    pub fn pool(&self) -> &managed::Pool<PgManager> {
        &self.pool
    }
}

#[async_trait]
impl Pool for PostgresPool {
    async fn query_version(&self, sql: &str) -> Result<String> {
        let client = self.pool.get().await.map_err(|e| match e {
            managed::PoolError::Backend(e) => e,
            other => DbError::Pool(other.to_string()),
        })?;
        let row = client.query_one(sql, &[]).await?;
        Ok(row.try_get::<_, String>(0)?)
    }

    async fn close(&self) -> Result<()> {
        // Idempotent: closing a closed pool only drops what is left.
        self.pool.close();
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
    fn test_normalize_sslmode() {
        assert_eq!(
            normalize_dsn("host=h port=5432 user=u password=p dbname=d sslmode=enable"),
            "host=h port=5432 user=u password=p dbname=d sslmode=require"
        );
        assert_eq!(normalize_dsn("host=h sslmode=disable"), "host=h sslmode=disable");
    }

    #[test]
    fn test_empty_values_do_not_swallow_next_pair() {
        let cfg = DbConfig::new("postgres")
            .username("u")
            .host("", 5432)
            .default_schema("app");
        let t = crate::udbc::dialect::translate(&cfg);
        assert_eq!(
            t.dsn,
            "host= port=5432 user=u password= dbname=app sslmode=disable"
        );

        let normalized = normalize_dsn(&t.dsn);
        assert_eq!(
            normalized,
            "host='' port=5432 user=u password='' dbname=app sslmode=disable"
        );
        let config = tokio_postgres::Config::from_str(&normalized).unwrap();
        assert_eq!(config.get_password(), Some(&b""[..]));
        assert_eq!(config.get_dbname(), Some("app"));
        assert_eq!(config.get_user(), Some("u"));
        assert_eq!(config.get_ssl_mode(), SslMode::Disable);
    }

    #[test]
    fn test_tls_connector_builds_for_encrypting_modes() {
        for mode in [SslMode::Prefer, SslMode::Require] {
            assert!(tls_connector(mode).is_ok());
        }
    }

    #[test]
    fn test_translated_dsn_parses() {
        let cfg = DbConfig::new("postgres")
            .username("u")
            .password("p")
            .host("db.local", 5433)
            .default_schema("app")
            .ssl_enabled(true);
        let t = crate::udbc::dialect::translate(&cfg);
        let config = tokio_postgres::Config::from_str(&normalize_dsn(&t.dsn)).unwrap();
        assert_eq!(config.get_user(), Some("u"));
        assert_eq!(config.get_dbname(), Some("app"));
        assert_eq!(config.get_ports(), &[5433]);
        assert_eq!(config.get_ssl_mode(), SslMode::Require);
    }

    #[tokio::test]
    async fn test_pool_size_and_close() {
        let cfg = DbConfig::new("postgres").pool(0, 0, 1, 3);
        let pool = PostgresDriver::new()
            .open("host=127.0.0.1 port=1 user=u dbname=d sslmode=disable", &cfg)
            .await
            .unwrap();
        let pg = pool.as_any().downcast_ref::<PostgresPool>().unwrap();
        assert_eq!(pg.pool().status().max_size, 3);
        pool.close().await.unwrap();
        pool.close().await.unwrap();
        assert!(pg.pool().is_closed());
    }

    #[test]
    fn test_expiry_rules() {
        let manager = PgManager {
            config: tokio_postgres::Config::new(),
            options: DbConfig::new("postgres").pool(30, 60, 0, 0).pool_options(),
        };
        let secs = Duration::from_secs;
        assert!(manager.expired(secs(10), secs(5)).is_none());
        assert_eq!(
            manager.expired(secs(60), secs(0)),
            Some("connection exceeded max lifetime")
        );
        assert_eq!(
            manager.expired(secs(40), secs(31)),
            Some("connection exceeded max idle time")
        );

        let unlimited = PgManager {
            config: tokio_postgres::Config::new(),
            options: PoolOptions::default(),
        };
        assert!(unlimited.expired(secs(86_400), secs(86_400)).is_none());
    }
}
