use crate::config::DbConfig;
use crate::udbc::lock::DbLock;

pub const MYSQL: &str = "mysql";
pub const POSTGRES: &str = "postgres";
pub const ORACLE: &str = "oracle";
pub const SQLITE: &str = "sqlite3";

/// The driver-specific half of opening a data source: how to render the
/// connection string, which query proves the server is alive, and which
/// advisory lock callers should share.
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    pub name: &'static str,
    pub dsn: fn(&DbConfig) -> String,
    pub probe: &'static str,
    pub lock: fn() -> DbLock,
}

impl Dialect {
    pub fn translate(&self, cfg: &DbConfig) -> Translation {
        Translation {
            dsn: (self.dsn)(cfg),
            probe: self.probe.to_string(),
        }
    }
}

/// Output of the config translator. Both fields are empty for an
/// unrecognized driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translation {
    pub dsn: String,
    pub probe: String,
}

pub const MYSQL_DIALECT: Dialect = Dialect {
    name: MYSQL,
    dsn: mysql_dsn,
    probe: "SELECT VERSION()",
    lock: DbLock::noop,
};

pub const POSTGRES_DIALECT: Dialect = Dialect {
    name: POSTGRES,
    dsn: postgres_dsn,
    probe: "SELECT VERSION()",
    lock: DbLock::noop,
};

pub const ORACLE_DIALECT: Dialect = Dialect {
    name: ORACLE,
    dsn: oracle_dsn,
    probe: "SELECT banner FROM v$version",
    lock: DbLock::noop,
};

pub const SQLITE_DIALECT: Dialect = Dialect {
    name: SQLITE,
    dsn: sqlite_dsn,
    probe: "SELECT sqlite_version()",
    lock: DbLock::read_write,
};

static BUILTIN: [Dialect; 4] = [MYSQL_DIALECT, POSTGRES_DIALECT, ORACLE_DIALECT, SQLITE_DIALECT];

/// Finds the built-in dialect for a driver identifier.
pub fn lookup(driver: &str) -> Option<&'static Dialect> {
    BUILTIN.iter().find(|d| d.name == driver)
}

/// Translates a config into its connection string and version probe.
pub fn translate(cfg: &DbConfig) -> Translation {
    lookup(&cfg.driver)
        .map(|d| d.translate(cfg))
        .unwrap_or_default()
}

/// `user:password@tcp(host:port)/schema`
fn mysql_dsn(cfg: &DbConfig) -> String {
    format!(
        "{}:{}@tcp({}:{})/{}",
        cfg.username, cfg.password, cfg.ip, cfg.port, cfg.default_schema
    )
}

fn postgres_dsn(cfg: &DbConfig) -> String {
    let sslmode = if cfg.ssl_enabled { "enable" } else { "disable" };
    format!(
        "host={} port={} user={} password={} dbname={} sslmode={}",
        cfg.ip, cfg.port, cfg.username, cfg.password, cfg.default_schema, sslmode
    )
}

/// `user/password@descriptor?k=v&...`, options in key order.
fn oracle_dsn(cfg: &DbConfig) -> String {
    let mut dsn = format!(
        "{}/{}@{}",
        cfg.username, cfg.password, cfg.connection_string
    );
    if !cfg.options.is_empty() {
        let params = cfg
            .options
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        dsn.push(if cfg.connection_string.contains('?') { '&' } else { '?' });
        dsn.push_str(&params);
    }
    dsn
}

fn sqlite_dsn(cfg: &DbConfig) -> String {
    cfg.connection_string.clone()
}
