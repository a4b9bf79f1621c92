use std::path::{Path, PathBuf};

use async_trait::async_trait;

use schemasync_core::{Error, Result};
use schemasync_sync::{ExtensionFilter, FileExportService};

use crate::prompt::ask_stdin;
use crate::workspace::write_bytes_atomic;

/// Saves scripts to the local filesystem.
///
/// With a preset path the save dialog is skipped; otherwise the user is asked
/// on the terminal and a blank answer cancels.
pub struct FsExporter {
    preset: Option<PathBuf>,
}

impl FsExporter {
    pub fn new(preset: Option<PathBuf>) -> Self {
        Self { preset }
    }
}

/// Append the filter's first extension when `path` has none. Paths with a
/// foreign extension are kept as typed.
fn with_default_extension(path: PathBuf, filter: &ExtensionFilter) -> PathBuf {
    if filter.matches(&path) {
        return path;
    }
    if path.extension().is_some() {
        tracing::warn!(
            event = "export_extension_mismatch",
            path = %path.display(),
            expected = %filter.name
        );
        return path;
    }
    match filter.extensions.first() {
        Some(extension) => path.with_extension(extension),
        None => path,
    }
}

#[async_trait]
impl FileExportService for FsExporter {
    async fn choose_save_path(
        &self,
        default_name: &str,
        filter: &ExtensionFilter,
    ) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.preset {
            return Ok(Some(with_default_extension(path.clone(), filter)));
        }

        let question = format!(
            "Save script as ({} file, suggested {default_name}, blank to cancel): ",
            filter.name
        );
        let answer = ask_stdin(&question)
            .await
            .map_err(|err| Error::Export(format!("failed to read path: {err}")))?;
        Ok(answer.map(|path| with_default_extension(PathBuf::from(path), filter)))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let owned_path = path.to_path_buf();
        let data = content.as_bytes().to_vec();
        tokio::task::spawn_blocking(move || write_bytes_atomic(&owned_path, &data))
            .await
            .map_err(|err| Error::Export(format!("write task failed: {err}")))?
            .map_err(|err| Error::Export(format!("failed to write {}: {err}", path.display())))
    }
}
