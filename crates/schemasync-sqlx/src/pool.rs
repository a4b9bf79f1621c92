use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::{Database, Executor, Pool};

use schemasync_core::{Connection, Dialect, Error, Result};

use crate::options::PoolOptions;

const MYSQL_LIST_DATABASES: &str = "SELECT CAST(schema_name AS CHAR) FROM information_schema.schemata \
     WHERE schema_name NOT IN ('information_schema', 'performance_schema', 'mysql', 'sys') \
     ORDER BY schema_name";

const POSTGRES_LIST_DATABASES: &str = "SELECT datname FROM pg_database \
     WHERE datistemplate = false AND datname NOT IN ('postgres') ORDER BY datname";

/// Maintenance database used when a PostgreSQL connection is unbound.
const POSTGRES_MAINTENANCE_DB: &str = "postgres";

/// Database to open: the explicit choice wins over the bound one.
pub fn effective_database<'a>(
    connection: &'a Connection,
    explicit: Option<&'a str>,
) -> Option<&'a str> {
    explicit
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .or(connection.bound_database())
}

pub fn mysql_connect_options(connection: &Connection, database: Option<&str>) -> MySqlConnectOptions {
    let mut opts = MySqlConnectOptions::new()
        .host(&connection.host)
        .port(connection.port)
        .username(&connection.credentials.username);
    if let Some(password) = &connection.credentials.password {
        opts = opts.password(password);
    }
    if let Some(database) = effective_database(connection, database) {
        opts = opts.database(database);
    }

    if let Some(ssl) = connection.ssl.as_ref().filter(|ssl| ssl.enabled) {
        opts = opts.ssl_mode(MySqlSslMode::Required);
        if let Some(path) = &ssl.ca_cert_path {
            opts = opts.ssl_ca(path);
        }
        if let Some(path) = &ssl.client_cert_path {
            opts = opts.ssl_client_cert(path);
        }
        if let Some(path) = &ssl.client_key_path {
            opts = opts.ssl_client_key(path);
        }
    }
    opts
}

pub fn postgres_connect_options(connection: &Connection, database: Option<&str>) -> PgConnectOptions {
    let mut opts = PgConnectOptions::new()
        .host(&connection.host)
        .port(connection.port)
        .username(&connection.credentials.username)
        .database(effective_database(connection, database).unwrap_or(POSTGRES_MAINTENANCE_DB));
    if let Some(password) = &connection.credentials.password {
        opts = opts.password(password);
    }

    if let Some(ssl) = connection.ssl.as_ref().filter(|ssl| ssl.enabled) {
        opts = opts.ssl_mode(PgSslMode::Require);
        if let Some(path) = &ssl.ca_cert_path {
            opts = opts.ssl_root_cert(path);
        }
        if let Some(path) = &ssl.client_cert_path {
            opts = opts.ssl_client_cert(path);
        }
        if let Some(path) = &ssl.client_key_path {
            opts = opts.ssl_client_key(path);
        }
    }
    opts
}

/// Pool for one of the supported engines.
#[derive(Debug, Clone)]
pub enum DatabasePool {
    MySql(MySqlPool),
    Postgres(PgPool),
}

impl DatabasePool {
    /// Open a pool, mapping every failure to [`Error::Connectivity`].
    pub async fn connect(
        connection: &Connection,
        database: Option<&str>,
        options: &PoolOptions,
    ) -> Result<Self> {
        tracing::debug!(
            event = "pool_connecting",
            connection = %connection.redacted_url(database),
        );
        match connection.dialect {
            Dialect::MySql | Dialect::MariaDb => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(options.max_connections)
                    .acquire_timeout(options.acquire_timeout)
                    .connect_with(mysql_connect_options(connection, database))
                    .await
                    .map_err(|err| connectivity(connection, &err))?;
                Ok(DatabasePool::MySql(pool))
            }
            Dialect::PostgreSql => {
                let pool = PgPoolOptions::new()
                    .max_connections(options.max_connections)
                    .acquire_timeout(options.acquire_timeout)
                    .connect_with(postgres_connect_options(connection, database))
                    .await
                    .map_err(|err| connectivity(connection, &err))?;
                Ok(DatabasePool::Postgres(pool))
            }
        }
    }

    pub fn engine(&self) -> &'static str {
        match self {
            DatabasePool::MySql(_) => "mysql",
            DatabasePool::Postgres(_) => "postgres",
        }
    }

    /// User databases visible to the connection, system schemas excluded.
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let rows = match self {
            DatabasePool::MySql(pool) => {
                sqlx::query_scalar::<_, String>(MYSQL_LIST_DATABASES)
                    .fetch_all(pool)
                    .await
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query_scalar::<_, String>(POSTGRES_LIST_DATABASES)
                    .fetch_all(pool)
                    .await
            }
        };
        rows.map_err(|err| Error::Connectivity(err.to_string()))
    }

    /// Run statements in order on a single session, stopping at the first failure.
    ///
    /// Fragments may hold several statements, so they go through the simple
    /// query protocol. Statements that already ran are not rolled back.
    pub async fn execute_all(&self, statements: &[String]) -> Result<()> {
        match self {
            DatabasePool::MySql(pool) => execute_in_order(pool, statements).await,
            DatabasePool::Postgres(pool) => execute_in_order(pool, statements).await,
        }
    }

    pub async fn close(&self) {
        match self {
            DatabasePool::MySql(pool) => pool.close().await,
            DatabasePool::Postgres(pool) => pool.close().await,
        }
    }
}

async fn execute_in_order<DB>(pool: &Pool<DB>, statements: &[String]) -> Result<()>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
{
    let total = statements.len();
    let mut conn = pool
        .acquire()
        .await
        .map_err(|err| Error::Connectivity(err.to_string()))?;
    for (index, sql) in statements.iter().enumerate() {
        tracing::info!(event = "statement_started", index = index + 1, total = total);
        conn.execute(sqlx::raw_sql(sql))
            .await
            .map_err(|err| execution(sql, &err))?;
    }
    Ok(())
}

fn connectivity(connection: &Connection, err: &sqlx::Error) -> Error {
    Error::Connectivity(format!("{}: {err}", connection.name))
}

fn execution(sql: &str, err: &sqlx::Error) -> Error {
    tracing::error!(event = "statement_failed", error = %err);
    Error::Execution(format!("Failed to execute: {sql}\nError: {err}"))
}
