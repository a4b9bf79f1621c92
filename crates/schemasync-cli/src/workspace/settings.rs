use std::time::Duration;

use serde::{Deserialize, Serialize};

use schemasync_sqlx::PoolOptions;

use super::atomic::write_bytes_atomic;
use super::{WorkspaceError, WorkspacePaths, WorkspaceResult};

/// External program that prints a `DiffResult` as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorSettings {
    pub command: Vec<String>,
}

impl Default for ComparatorSettings {
    fn default() -> Self {
        Self {
            command: vec!["schemasync-compare".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        let defaults = PoolOptions::default();
        Self {
            max_connections: defaults.max_connections,
            acquire_timeout_secs: defaults.acquire_timeout.as_secs(),
        }
    }
}

impl PoolSettings {
    pub fn to_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections.max(1),
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub comparator: ComparatorSettings,
    pub pool: PoolSettings,
    /// `EnvFilter` directive for terminal output when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            comparator: ComparatorSettings::default(),
            pool: PoolSettings::default(),
            log_filter: "warn".to_string(),
        }
    }
}

pub fn load_or_create_settings(paths: &WorkspacePaths) -> WorkspaceResult<WorkspaceSettings> {
    let path = paths.settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let settings: WorkspaceSettings = toml::from_str(&content)?;
        return Ok(settings);
    }

    let settings = WorkspaceSettings::default();
    save_settings(paths, &settings)?;
    Ok(settings)
}

pub fn save_settings(paths: &WorkspacePaths, settings: &WorkspaceSettings) -> WorkspaceResult<()> {
    let path = paths.settings_path();
    let encoded = toml::to_string_pretty(settings)?;
    write_bytes_atomic(&path, encoded.as_bytes()).map_err(WorkspaceError::from)
}
