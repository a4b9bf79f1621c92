use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use schemasync_core::{Connection, Credentials, Dialect, SslConfig};

use super::atomic::write_bytes_atomic;
use super::{WorkspaceError, WorkspacePaths, WorkspaceResult};

/// Saved connection as stored in `connections.toml`.
///
/// Passwords are never written to disk; `password_env` names the environment
/// variable that holds one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub dialect: Dialect,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslConfig>,
}

impl ConnectionProfile {
    /// Build the runtime record, reading the password through `lookup_env`.
    pub fn to_connection<F>(&self, id: &str, lookup_env: F) -> Connection
    where
        F: Fn(&str) -> Option<String>,
    {
        let password = self
            .password_env
            .as_deref()
            .filter(|var| !var.trim().is_empty())
            .and_then(|var| lookup_env(var));
        Connection {
            id: id.to_string(),
            name: self.name.clone(),
            dialect: self.dialect,
            host: self.host.clone(),
            port: self.port.unwrap_or_else(|| self.dialect.default_port()),
            credentials: Credentials {
                username: self.username.clone(),
                password,
            },
            database: self.database.clone(),
            ssl: self.ssl.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionsConfig {
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionProfile>,
}

impl ConnectionsConfig {
    pub fn validate(&self) -> WorkspaceResult<()> {
        for (id, profile) in &self.connections {
            if id.trim().is_empty() {
                return Err(WorkspaceError::Invalid(
                    "connection id must not be blank".to_string(),
                ));
            }
            if profile.host.trim().is_empty() {
                return Err(WorkspaceError::Invalid(format!(
                    "connection '{id}' has no host"
                )));
            }
        }
        Ok(())
    }

    /// Runtime records in id order.
    pub fn to_connections<F>(&self, lookup_env: F) -> Vec<Connection>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.connections
            .iter()
            .map(|(id, profile)| profile.to_connection(id, &lookup_env))
            .collect()
    }
}

pub fn load_or_create_connections(paths: &WorkspacePaths) -> WorkspaceResult<ConnectionsConfig> {
    let path = paths.connections_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let config: ConnectionsConfig = toml::from_str(&content)?;
        config.validate()?;
        return Ok(config);
    }

    let config = ConnectionsConfig::default();
    save_connections(paths, &config)?;
    Ok(config)
}

pub fn save_connections(paths: &WorkspacePaths, config: &ConnectionsConfig) -> WorkspaceResult<()> {
    config.validate()?;
    let path = paths.connections_path();
    let encoded = toml::to_string_pretty(config)?;
    write_bytes_atomic(&path, encoded.as_bytes())
}
