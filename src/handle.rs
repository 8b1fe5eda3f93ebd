use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::Result;
use crate::udbc::lock::DbLock;
use crate::udbc::pool::Pool;

/// An opened data source: one pool, its advisory lock and the version the
/// server reported when it was probed.
///
/// The pool is shared through an `Arc` and is safe for concurrent use;
/// `DbHandle` itself can be wrapped in an `Arc` and shared between tasks.
pub struct DbHandle<P: Pool + ?Sized = dyn Pool> {
    driver: String,
    version: String,
    pool: Arc<P>,
    lock: DbLock,
    closed: AtomicBool,
}

impl<P: Pool + ?Sized> DbHandle<P> {
    pub fn new(driver: impl Into<String>, version: impl Into<String>, pool: Arc<P>, lock: DbLock) -> Self {
        Self {
            driver: driver.into(),
            version: version.into(),
            pool,
            lock,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the pool. Never fails and does not consume the handle.
    pub fn get_connection(&self) -> Arc<P> {
        self.pool.clone()
    }

    /// Releases the pool. Only the first call does any work; later calls return `Ok(())`.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Closing {} connection pool", self.driver);
        self.pool.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Server version reported by the probe query.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Advisory lock for callers to coordinate access; never taken by the handle.
    pub fn lock(&self) -> &DbLock {
        &self.lock
    }
}

impl DbHandle {
    /// Borrows the concrete pool behind a dynamically opened handle.
    ///
    /// ```ignore
    /// let handle = udatasource::open(&cfg).await?;
    /// let sqlite = handle.downcast::<SqlitePool>().unwrap();
    /// ```
    pub fn downcast<T: Pool>(&self) -> Option<&T> {
        self.pool.as_any().downcast_ref::<T>()
    }
}
