use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::udbc::dialect;

/// Advisory lock handed out with every [`DbHandle`](crate::handle::DbHandle).
///
/// Nothing in this crate acquires it. Callers that issue writes against an
/// embedded database take the exclusive side; readers take the shared side.
/// Networked databases get the [`DbLock::Noop`] variant, whose acquisitions
/// always succeed immediately.
///
/// Cloning shares the underlying lock.
#[derive(Debug, Clone)]
pub enum DbLock {
    ReadWrite(Arc<RwLock<()>>),
    Noop,
}

/// Held while the lock is acquired; dropping it releases the lock.
#[derive(Debug)]
pub enum LockGuard<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
    Noop,
}

impl DbLock {
    pub fn read_write() -> Self {
        DbLock::ReadWrite(Arc::new(RwLock::new(())))
    }

    pub fn noop() -> Self {
        DbLock::Noop
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, DbLock::Noop)
    }

    /// Waits for exclusive access.
    pub async fn lock(&self) -> LockGuard<'_> {
        match self {
            DbLock::ReadWrite(l) => LockGuard::Exclusive(l.write().await),
            DbLock::Noop => LockGuard::Noop,
        }
    }

    /// Waits for shared access.
    pub async fn read(&self) -> LockGuard<'_> {
        match self {
            DbLock::ReadWrite(l) => LockGuard::Shared(l.read().await),
            DbLock::Noop => LockGuard::Noop,
        }
    }

    /// Returns `None` when a reader or writer already holds the lock.
    pub fn try_lock(&self) -> Option<LockGuard<'_>> {
        match self {
            DbLock::ReadWrite(l) => l.try_write().ok().map(LockGuard::Exclusive),
            DbLock::Noop => Some(LockGuard::Noop),
        }
    }

    /// Returns `None` when a writer holds the lock.
    pub fn try_read(&self) -> Option<LockGuard<'_>> {
        match self {
            DbLock::ReadWrite(l) => l.try_read().ok().map(LockGuard::Shared),
            DbLock::Noop => Some(LockGuard::Noop),
        }
    }

    /// Blocking form of [`DbLock::lock`] for use inside `spawn_blocking`.
    ///
    /// # Panics
    /// Panics when called from an async context, like `RwLock::blocking_write`.
    pub fn blocking_lock(&self) -> LockGuard<'_> {
        match self {
            DbLock::ReadWrite(l) => LockGuard::Exclusive(l.blocking_write()),
            DbLock::Noop => LockGuard::Noop,
        }
    }

    /// Blocking form of [`DbLock::read`].
    pub fn blocking_read(&self) -> LockGuard<'_> {
        match self {
            DbLock::ReadWrite(l) => LockGuard::Shared(l.blocking_read()),
            DbLock::Noop => LockGuard::Noop,
        }
    }
}

impl LockGuard<'_> {
    pub fn is_exclusive(&self) -> bool {
        matches!(self, LockGuard::Exclusive(_))
    }

    /// Explicit release; equivalent to dropping the guard.
    pub fn release(self) {}
}

/// Picks the advisory lock for a driver identifier.
///
/// Networked drivers (`mysql`, `postgres`, `oracle`) get [`DbLock::Noop`].
/// `sqlite3` and every unrecognized identifier get a real reader/writer lock.
pub fn select_lock(driver: &str) -> DbLock {
    match dialect::lookup(driver) {
        Some(d) => (d.lock)(),
        None => DbLock::read_write(),
    }
}
