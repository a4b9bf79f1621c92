//! Contracts of the backends the orchestrator drives.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use schemasync_core::{Connection, DiffResult, Result};

/// Arguments for one schema comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRequest {
    pub source_id: String,
    pub target_id: String,
    /// Set only when the source connection is unbound.
    pub source_database: Option<String>,
    /// Set only when the target connection is unbound.
    pub target_database: Option<String>,
}

/// Statements to run against the target, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteRequest {
    pub target_id: String,
    pub statements: Vec<String>,
    pub target_database: Option<String>,
}

/// File-type filter offered by a save dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn sql() -> Self {
        Self {
            name: "SQL".to_string(),
            extensions: vec!["sql".to_string()],
        }
    }

    /// True when `path` ends with one of the filter's extensions.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

/// Computes the differences between two connections.
#[async_trait]
pub trait SchemaComparator: Send + Sync {
    async fn compare(&self, request: &CompareRequest) -> Result<DiffResult>;
}

/// Runs statements on a target connection. The call either fully resolves or
/// fails; partial application is the implementation's concern.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    async fn execute(&self, request: &ExecuteRequest) -> Result<()>;
}

/// Saved connection records and database discovery.
#[async_trait]
pub trait ConnectionDirectory: Send + Sync {
    async fn list_connections(&self) -> Result<Vec<Connection>>;

    /// Databases reachable through an unbound connection.
    async fn list_databases(&self, connection_id: &str) -> Result<Vec<String>>;

    async fn connection(&self, connection_id: &str) -> Result<Option<Connection>> {
        let connections = self.list_connections().await?;
        Ok(connections
            .into_iter()
            .find(|connection| connection.id == connection_id))
    }
}

/// Save dialog and file writer used for script export.
#[async_trait]
pub trait FileExportService: Send + Sync {
    /// Returns `None` when the user cancels.
    async fn choose_save_path(
        &self,
        default_name: &str,
        filter: &ExtensionFilter,
    ) -> Result<Option<PathBuf>>;

    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;
}
