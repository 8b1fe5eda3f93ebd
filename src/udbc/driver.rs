use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::config::DbConfig;
use crate::udbc::dialect::Dialect;
use crate::udbc::pool::Pool;

/// `Driver` defines a common interface for database drivers.
///
/// A driver is responsible for:
/// - Naming itself (the identifier matched against `DbConfig::driver`)
/// - Describing its dialect (connection string, version probe, advisory lock)
/// - Building a pool from a translated connection string
#[async_trait]
pub trait Driver: Send + Sync {
    /// Returns the identifier of the driver.
    ///
    /// Example: "postgres", "mysql", "sqlite3"
    fn name(&self) -> &str;

    /// Returns the dialect used to translate configs for this driver.
    fn dialect(&self) -> Dialect;

    /// Builds the pool for a translated connection string.
    ///
    /// Building must not require the server to be reachable; the version probe
    /// run afterwards is what proves connectivity.
    ///
    /// # Arguments
    /// * `dsn` - The connection string produced by [`Dialect::dsn`]
    /// * `cfg` - The originating config, for pool limits and options
    async fn open(&self, dsn: &str, cfg: &DbConfig) -> Result<Arc<dyn Pool>>;
}
