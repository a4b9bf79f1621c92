//! sqlx-backed collaborators for MySQL, MariaDB and PostgreSQL targets.

pub mod executor;
pub mod options;
pub mod pool;

pub use executor::{SqlxExecutor, list_databases};
pub use options::PoolOptions;
pub use pool::{DatabasePool, effective_database, mysql_connect_options, postgres_connect_options};
