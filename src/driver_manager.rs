use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use log::{error, info};

use crate::Result;
use crate::config::DbConfig;
use crate::error::DbError;
use crate::handle::DbHandle;
use crate::udbc::driver::Driver;

/// The process-wide driver registry, pre-loaded with every driver enabled by
/// Cargo features.
pub static DRIVERS: LazyLock<DriverManager> = LazyLock::new(DriverManager::with_builtin);

/// Opens a data source through the global [`DRIVERS`] registry.
pub async fn open(cfg: &DbConfig) -> Result<DbHandle> {
    DRIVERS.open(cfg).await
}

/// A registry of database drivers keyed by identifier.
///
/// `DriverManager` maps the `driver` field of a [`DbConfig`] to the [`Driver`]
/// that knows how to build its pool.
pub struct DriverManager {
    /// A thread-safe map storing registered drivers by their identifiers.
    drivers: DashMap<String, Arc<dyn Driver>>,
}

impl Default for DriverManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverManager {
    /// Creates a new, empty `DriverManager`.
    pub fn new() -> Self {
        Self {
            drivers: DashMap::new(),
        }
    }

    /// Creates a `DriverManager` holding the built-in drivers enabled at compile time.
    pub fn with_builtin() -> Self {
        let manager = Self::new();
        #[cfg(feature = "mysql")]
        manager.register(crate::udbc::mysql::pool::MysqlDriver::new());
        #[cfg(feature = "postgres")]
        manager.register(crate::udbc::postgres::pool::PostgresDriver::new());
        #[cfg(feature = "oracle")]
        manager.register(crate::udbc::oracle::pool::OracleDriver::new());
        #[cfg(feature = "sqlite")]
        manager.register(crate::udbc::sqlite::pool::SqliteDriver::new());
        manager
    }

    /// Registers a driver under its name, replacing any driver already
    /// registered with that name.
    pub fn register(&self, driver: impl Driver + 'static) {
        let name = driver.name().to_string();
        self.drivers.insert(name, Arc::new(driver));
    }

    pub fn driver(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).map(|d| d.value().clone())
    }

    /// Registered driver identifiers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Opens a data source.
    ///
    /// Translates the config into a connection string, builds the driver's
    /// pool with the configured limits, then runs the version probe.
    ///
    /// The handle's lock comes from the registered driver's dialect. For the
    /// built-in drivers that matches [`select_lock`](crate::select_lock); a
    /// driver registered under another name decides its own lock.
    ///
    /// # Errors
    /// - [`DbError::Open`] if the driver is not registered or cannot build its pool.
    /// - [`DbError::Probe`] if the probe query fails; the pool is closed first.
    pub async fn open(&self, cfg: &DbConfig) -> Result<DbHandle> {
        info!(
            "Connecting to {}:{}, use driver: {}",
            cfg.ip, cfg.port, cfg.driver
        );

        // Unregistered identifiers have no dialect and nothing to open with.
        let Some(driver) = self.driver(&cfg.driver) else {
            let e = DbError::Open(format!("driver '{}' is not registered", cfg.driver));
            error!("{}", e);
            return Err(e);
        };
        let dialect = driver.dialect();
        let translation = dialect.translate(cfg);

        let pool = driver
            .open(&translation.dsn, cfg)
            .await
            .map_err(|e| {
                let e = DbError::Open(format!("[{}] {}", cfg.driver, e));
                error!("{}", e);
                e
            })?;

        let version = match pool.query_version(&translation.probe).await {
            Ok(v) => v,
            Err(e) => {
                let e = DbError::Probe(format!("[{}] {}", cfg.driver, e));
                error!("{}", e);
                if let Err(close_err) = pool.close().await {
                    error!("[{}] failed to close pool after probe error: {}", cfg.driver, close_err);
                }
                return Err(e);
            }
        };

        info!(
            "Connected! Use driver {}. Database version: {}",
            cfg.driver, version
        );
        Ok(DbHandle::new(cfg.driver.clone(), version, pool, (dialect.lock)()))
    }
}
