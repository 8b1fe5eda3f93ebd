use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Config Error: {0}")]
    Config(String),
    #[error("Invalid Connection String: {0}")]
    InvalidDsn(String),
    #[error("Open Error: {0}")]
    Open(String),
    #[error("Probe Error: {0}")]
    Probe(String),
    #[error("Pool Error: {0}")]
    Pool(String),
    #[error("Driver Error: {0}")]
    Driver(String),
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for DbError {
    fn from(e: mysql_async::Error) -> Self {
        DbError::Driver(e.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        DbError::Driver(e.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for DbError {
    fn from(e: r2d2::Error) -> Self {
        DbError::Pool(e.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DbError {
    fn from(e: tokio_postgres::Error) -> Self {
        DbError::Driver(e.to_string())
    }
}

#[cfg(feature = "oracle")]
impl From<oracle::Error> for DbError {
    fn from(e: oracle::Error) -> Self {
        DbError::Driver(e.to_string())
    }
}

impl From<tokio::task::JoinError> for DbError {
    fn from(e: tokio::task::JoinError) -> Self {
        DbError::Driver(format!("blocking task failed: {}", e))
    }
}
