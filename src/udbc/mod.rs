use std::time::Duration;

use crate::config::DbConfig;

pub mod dialect;
pub mod driver;
pub mod lock;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "oracle")]
pub mod oracle;
pub mod pool;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Upper bound used by pools that cannot run without one when `max_open` is unset.
pub const DEFAULT_MAX_OPEN: u32 = 100;

/// Pool limits derived from a [`DbConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolOptions {
    pub max_idle_time: Option<Duration>, // 连接最大空闲时间
    pub max_lifetime: Option<Duration>,  // 连接最大生命周期
    pub max_idle: u32,                   // 池最大空闲数
    pub max_open: Option<u32>,           // 池最大连接数，None 表示不限
}

impl PoolOptions {
    /// `max_open`, or [`DEFAULT_MAX_OPEN`] when unbounded.
    pub fn max_open_or_default(&self) -> u32 {
        self.max_open.unwrap_or(DEFAULT_MAX_OPEN)
    }
}

impl From<&DbConfig> for PoolOptions {
    fn from(cfg: &DbConfig) -> Self {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        let max_open = (cfg.max_open > 0).then_some(cfg.max_open);
        // Idle connections can never exceed the open ceiling.
        let max_idle = match max_open {
            Some(open) => cfg.max_idle.min(open),
            None => cfg.max_idle,
        };
        Self {
            max_idle_time: secs(cfg.max_idle_time),
            max_lifetime: secs(cfg.max_life_time),
            max_idle,
            max_open,
        }
    }
}
