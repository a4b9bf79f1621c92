use std::sync::Arc;

use async_trait::async_trait;

use schemasync_core::{Connection, Error, Result};
use schemasync_sync::{ConnectionDirectory, ExecuteRequest, ExecutionService};

use crate::options::PoolOptions;
use crate::pool::DatabasePool;

/// Execution service that runs statements through sqlx.
#[derive(Clone)]
pub struct SqlxExecutor {
    directory: Arc<dyn ConnectionDirectory>,
    options: PoolOptions,
}

impl SqlxExecutor {
    pub fn new(directory: Arc<dyn ConnectionDirectory>, options: PoolOptions) -> Self {
        Self { directory, options }
    }
}

#[async_trait]
impl ExecutionService for SqlxExecutor {
    async fn execute(&self, request: &ExecuteRequest) -> Result<()> {
        let connection = self
            .directory
            .connection(&request.target_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("target connection {}", request.target_id)))?;

        let pool = DatabasePool::connect(
            &connection,
            request.target_database.as_deref(),
            &self.options,
        )
        .await?;
        tracing::info!(
            event = "sync_execution_started",
            engine = pool.engine(),
            statements = request.statements.len()
        );

        let outcome = pool.execute_all(&request.statements).await;
        pool.close().await;
        outcome?;

        tracing::info!(event = "sync_execution_finished");
        Ok(())
    }
}

/// List the databases reachable through `connection`.
pub async fn list_databases(connection: &Connection, options: &PoolOptions) -> Result<Vec<String>> {
    let pool = DatabasePool::connect(connection, None, options).await?;
    let databases = pool.list_databases().await;
    pool.close().await;
    databases
}
