pub mod config;
pub mod driver_manager;
pub mod error;
pub mod handle;
pub mod udbc;

pub use config::DbConfig;
pub use driver_manager::{DRIVERS, DriverManager, open};
pub use error::DbError;
pub use handle::DbHandle;
pub use udbc::dialect::{Translation, translate};
pub use udbc::lock::{DbLock, LockGuard, select_lock};

pub type Result<T> = std::result::Result<T, DbError>;
