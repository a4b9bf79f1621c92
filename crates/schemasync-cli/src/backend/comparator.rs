use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use schemasync_core::{DiffResult, Error, Result, redact_urls};
use schemasync_sync::{CompareRequest, SchemaComparator};

/// Environment variable pointing the comparator at the connection profiles.
pub const CONNECTIONS_ENV: &str = "SCHEMASYNC_CONNECTIONS";

/// Runs an external program that prints a `DiffResult` as JSON on stdout.
pub struct CommandComparator {
    command: Vec<String>,
    connections_path: PathBuf,
}

impl CommandComparator {
    pub fn new(command: Vec<String>, connections_path: PathBuf) -> Self {
        Self {
            command,
            connections_path,
        }
    }

    fn request_args(request: &CompareRequest) -> Vec<String> {
        let mut args = vec![
            "--source".to_string(),
            request.source_id.clone(),
            "--target".to_string(),
            request.target_id.clone(),
        ];
        if let Some(database) = &request.source_database {
            args.push("--source-database".to_string());
            args.push(database.clone());
        }
        if let Some(database) = &request.target_database {
            args.push("--target-database".to_string());
            args.push(database.clone());
        }
        args
    }
}

#[async_trait]
impl SchemaComparator for CommandComparator {
    async fn compare(&self, request: &CompareRequest) -> Result<DiffResult> {
        let Some((program, base_args)) = self.command.split_first() else {
            return Err(Error::Validation(
                "no comparator command configured".to_string(),
            ));
        };

        tracing::debug!(event = "comparator_spawned", program = %program);
        let output = Command::new(program)
            .args(base_args)
            .args(Self::request_args(request))
            .env(CONNECTIONS_ENV, &self.connections_path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| Error::Connectivity(format!("failed to run {program}: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("{program} exited with {}", output.status),
                trimmed => redact_urls(trimmed),
            };
            return Err(Error::Connectivity(message));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|err| Error::Other(format!("invalid comparator output: {err}")))
    }
}
