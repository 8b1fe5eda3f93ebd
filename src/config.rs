use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::udbc::PoolOptions;

/// Connection settings for a single data source.
///
/// Every field is optional and falls back to its zero value. Keys are accepted
/// both in snake_case and in the PascalCase form used by existing JSON/YAML
/// config files (`Driver`, `UserName`, `IP`, `MaxIdleTime`, ...).
///
/// Build one with [`DbConfig::new`] and the chained setters, or deserialize it
/// with any serde format.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    #[serde(alias = "Driver")]
    pub driver: String,
    #[serde(alias = "UserName")]
    pub username: String,
    #[serde(alias = "Password")]
    pub password: String,
    #[serde(alias = "IP", alias = "host")]
    pub ip: String,
    #[serde(alias = "Port")]
    pub port: u16,
    #[serde(alias = "DefaultSchema")]
    pub default_schema: String,
    /// Seconds a connection may sit idle before it is closed; `0` disables the limit.
    #[serde(alias = "MaxIdleTime")]
    pub max_idle_time: u64,
    /// Seconds a connection may live in total; `0` disables the limit.
    #[serde(alias = "MaxLifeTime")]
    pub max_life_time: u64,
    #[serde(alias = "MaxIdle")]
    pub max_idle: u32,
    /// `0` means no upper bound.
    #[serde(alias = "MaxOpen")]
    pub max_open: u32,
    /// Opaque override: the Oracle connect descriptor or the SQLite database path.
    #[serde(alias = "ConnectionString")]
    pub connection_string: String,
    #[serde(alias = "SslEnabled")]
    pub ssl_enabled: bool,
    #[serde(alias = "Options")]
    pub options: BTreeMap<String, String>,
}

impl DbConfig {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            ..Default::default()
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn host(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.ip = ip.into();
        self.port = port;
        self
    }

    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = connection_string.into();
        self
    }

    pub fn ssl_enabled(mut self, enabled: bool) -> Self {
        self.ssl_enabled = enabled;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Sets the four pool limits at once: idle time and lifetime in seconds,
    /// then the idle and open connection counts.
    pub fn pool(mut self, max_idle_time: u64, max_life_time: u64, max_idle: u32, max_open: u32) -> Self {
        self.max_idle_time = max_idle_time;
        self.max_life_time = max_life_time;
        self.max_idle = max_idle;
        self.max_open = max_open;
        self
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions::from(self)
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("driver", &self.driver)
            .field("username", &self.username)
            .field("password", &"***")
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("default_schema", &self.default_schema)
            .field("max_idle_time", &self.max_idle_time)
            .field("max_life_time", &self.max_life_time)
            .field("max_idle", &self.max_idle)
            .field("max_open", &self.max_open)
            .field("connection_string", &self.connection_string)
            .field("ssl_enabled", &self.ssl_enabled)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_pascal_case_keys() {
        let json = r#"{
            "Driver": "mysql",
            "UserName": "root",
            "Password": "secret",
            "IP": "10.0.0.1",
            "Port": 3306,
            "DefaultSchema": "app",
            "MaxIdleTime": 60,
            "MaxLifeTime": 3600,
            "MaxIdle": 2,
            "MaxOpen": 10,
            "SslEnabled": true,
            "Options": {"TIMEOUT": "5"}
        }"#;
        let cfg: DbConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.driver, "mysql");
        assert_eq!(cfg.username, "root");
        assert_eq!(cfg.ip, "10.0.0.1");
        assert_eq!(cfg.port, 3306);
        assert_eq!(cfg.max_life_time, 3600);
        assert!(cfg.ssl_enabled);
        assert_eq!(cfg.options.get("TIMEOUT").map(String::as_str), Some("5"));
    }

    #[test]
    fn test_missing_fields_take_zero_values() {
        let cfg: DbConfig = serde_json::from_str(r#"{"driver": "sqlite3"}"#).unwrap();
        assert_eq!(cfg, DbConfig::new("sqlite3"));
        assert_eq!(cfg.port, 0);
        assert!(cfg.options.is_empty());
    }

    #[test]
    fn test_debug_hides_password() {
        let cfg = DbConfig::new("postgres").password("hunter2");
        let out = format!("{:?}", cfg);
        assert!(!out.contains("hunter2"));
    }
}
