use async_trait::async_trait;

use schemasync_core::{Connection, Error, Result};
use schemasync_sqlx::{PoolOptions, list_databases};
use schemasync_sync::ConnectionDirectory;

/// Connections loaded from the workspace profile file.
pub struct ProfileDirectory {
    connections: Vec<Connection>,
    pool: PoolOptions,
}

impl ProfileDirectory {
    pub fn new(connections: Vec<Connection>, pool: PoolOptions) -> Self {
        Self { connections, pool }
    }
}

#[async_trait]
impl ConnectionDirectory for ProfileDirectory {
    async fn list_connections(&self) -> Result<Vec<Connection>> {
        Ok(self.connections.clone())
    }

    async fn list_databases(&self, connection_id: &str) -> Result<Vec<String>> {
        let connection = self
            .connections
            .iter()
            .find(|connection| connection.id == connection_id)
            .ok_or_else(|| Error::NotFound(format!("connection {connection_id}")))?;
        list_databases(connection, &self.pool).await
    }
}
