use std::any::Any;

use async_trait::async_trait;

use crate::Result;

/// A pooled connection object: a set of reusable connections to one database.
///
/// Implementations must be safe for concurrent use; the handle shares them
/// through an `Arc`.
#[async_trait]
pub trait Pool: Send + Sync + 'static {
    /// Runs a single-row, single-column query and returns the value as text.
    ///
    /// Used as the version probe right after the pool is built.
    async fn query_version(&self, sql: &str) -> Result<String>;

    /// Releases every connection held by the pool.
    ///
    /// Calling it again must not fail.
    async fn close(&self) -> Result<()>;

    /// Gives access to the concrete pool type behind a `dyn Pool`.
    fn as_any(&self) -> &dyn Any;
}
