use crate::Result;
use crate::error::DbError;

/// Address part of a MySQL DSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Tcp { host: String, port: u16 },
    Socket(String),
}

/// A parsed `user:password@protocol(address)/schema` connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlDsn {
    pub user: String,
    pub password: String,
    pub address: Address,
    pub schema: String,
}

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3306;

impl MysqlDsn {
    pub fn parse(dsn: &str) -> Result<Self> {
        let invalid = |why: &str| DbError::InvalidDsn(format!("{} in mysql dsn", why));

        // The schema follows the last '/', the credentials precede the last '@'.
        let (prefix, tail) = dsn.rsplit_once('/').ok_or_else(|| invalid("missing '/'"))?;
        let schema = tail.split_once('?').map_or(tail, |(s, _)| s).to_string();

        let (creds, addr) = prefix.rsplit_once('@').unwrap_or(("", prefix));
        let (user, password) = creds.split_once(':').unwrap_or((creds, ""));

        let address = if addr.is_empty() {
            Address::Tcp {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            }
        } else if let Some(inner) = enclosed(addr, "tcp") {
            parse_host_port(inner)?
        } else if let Some(inner) = enclosed(addr, "unix") {
            Address::Socket(inner.to_string())
        } else {
            return Err(invalid("unsupported protocol"));
        };

        Ok(Self {
            user: user.to_string(),
            password: password.to_string(),
            address,
            schema,
        })
    }
}

fn enclosed<'a>(s: &'a str, protocol: &str) -> Option<&'a str> {
    s.strip_prefix(protocol)?.strip_prefix('(')?.strip_suffix(')')
}

fn parse_host_port(addr: &str) -> Result<Address> {
    let (host, port) = match addr.rsplit_once(':') {
        // A bare IPv6 literal has colons but no port.
        Some((h, _)) if h.contains(':') && !h.ends_with(']') => (addr, None),
        Some((h, p)) => (h, Some(p)),
        None => (addr, None),
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = match port {
        Some(p) => p
            .parse::<u16>()
            .map_err(|e| DbError::InvalidDsn(format!("bad port '{}': {}", p, e)))?,
        None => DEFAULT_PORT,
    };
    Ok(Address::Tcp {
        host: if host.is_empty() { DEFAULT_HOST } else { host }.to_string(),
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp() {
        let dsn = MysqlDsn::parse("u:p@tcp(10.0.0.1:3306)/app").unwrap();
        assert_eq!(dsn.user, "u");
        assert_eq!(dsn.password, "p");
        assert_eq!(
            dsn.address,
            Address::Tcp {
                host: "10.0.0.1".into(),
                port: 3306
            }
        );
        assert_eq!(dsn.schema, "app");
    }

    #[test]
    fn test_password_with_at_and_colon() {
        let dsn = MysqlDsn::parse("root:p@ss:w0rd@tcp(db:3307)/").unwrap();
        assert_eq!(dsn.user, "root");
        assert_eq!(dsn.password, "p@ss:w0rd");
        assert_eq!(dsn.schema, "");
    }

    #[test]
    fn test_ipv6_and_socket() {
        let v6 = MysqlDsn::parse("u:p@tcp([::1]:3306)/x").unwrap();
        assert_eq!(
            v6.address,
            Address::Tcp {
                host: "::1".into(),
                port: 3306
            }
        );

        let sock = MysqlDsn::parse("u@unix(/var/run/mysqld.sock)/x?parseTime=true").unwrap();
        assert_eq!(sock.address, Address::Socket("/var/run/mysqld.sock".into()));
        assert_eq!(sock.schema, "x");
    }

    #[test]
    fn test_zero_port_from_empty_config() {
        let dsn = MysqlDsn::parse(":@tcp(:0)/").unwrap();
        assert_eq!(
            dsn.address,
            Address::Tcp {
                host: DEFAULT_HOST.into(),
                port: 0
            }
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(MysqlDsn::parse(""), Err(DbError::InvalidDsn(_))));
        assert!(MysqlDsn::parse("u:p@udp(h:1)/x").is_err());
        assert!(MysqlDsn::parse("u:p@tcp(h:port)/x").is_err());
    }
}
