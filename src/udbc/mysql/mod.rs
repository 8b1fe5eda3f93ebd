pub mod dsn;
pub mod pool;
