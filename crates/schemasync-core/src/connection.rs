use std::fmt;

use serde::{Deserialize, Serialize};

/// SQL flavor of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    PostgreSql,
    MariaDb,
}

impl Dialect {
    /// Human-readable name used in script headers.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "MySQL",
            Dialect::PostgreSql => "PostgreSQL",
            Dialect::MariaDb => "MariaDB",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Dialect::MySql | Dialect::MariaDb => 3306,
            Dialect::PostgreSql => 5432,
        }
    }

    /// MySQL and MariaDB share client syntax, including conditional comments.
    pub fn is_mysql_family(&self) -> bool {
        matches!(self, Dialect::MySql | Dialect::MariaDb)
    }

    fn url_scheme(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::MariaDb => "mariadb",
            Dialect::PostgreSql => "postgres",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Login credentials for a connection. The password is never serialized.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// TLS settings applied when opening a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslConfig {
    pub enabled: bool,
    pub ca_cert_path: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
}

/// A saved database connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub name: String,
    pub dialect: Dialect,
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    /// Database the connection is bound to. `None` means the database is
    /// chosen at comparison time.
    pub database: Option<String>,
    pub ssl: Option<SslConfig>,
}

impl Connection {
    /// Returns the bound database, treating blank names as absent.
    pub fn bound_database(&self) -> Option<&str> {
        self.database
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// True when an explicit database must be chosen before comparing.
    pub fn is_unbound(&self) -> bool {
        self.bound_database().is_none()
    }

    /// Describe the connection for script headers and logs.
    ///
    /// An explicit database choice wins over the bound one.
    pub fn descriptor(&self, explicit_database: Option<&str>) -> ConnectionDescriptor {
        let database = explicit_database
            .filter(|name| !name.trim().is_empty())
            .or(self.bound_database())
            .unwrap_or_default();
        ConnectionDescriptor {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            database: database.to_string(),
        }
    }

    /// Connection URL with the password masked, safe for logs.
    ///
    /// The password itself never enters the string.
    pub fn redacted_url(&self, explicit_database: Option<&str>) -> String {
        let database = explicit_database.or(self.bound_database()).unwrap_or_default();
        let secret = if self.credentials.password.is_some() { ":***" } else { "" };
        format!(
            "{}://{}{}@{}:{}/{}",
            self.dialect.url_scheme(),
            self.credentials.username,
            secret,
            self.host,
            self.port,
            database
        )
    }
}

/// `name (host:port/database)` summary of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}:{}/{})",
            self.name, self.host, self.port, self.database
        )
    }
}
