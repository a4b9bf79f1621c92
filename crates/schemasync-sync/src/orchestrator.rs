use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use schemasync_core::{Clock, Connection, DiffResult, Result, Selection, SystemClock};

use crate::machine::{CompareOutcome, GroupView, Phase, Side, SkipReason, SyncMachine};
use crate::ports::{
    ConnectionDirectory, ExecutionService, ExtensionFilter, FileExportService, SchemaComparator,
};

/// File name proposed by the save dialog.
pub const SUGGESTED_FILE_NAME: &str = "sync.sql";

/// Backends the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn ConnectionDirectory>,
    pub comparator: Arc<dyn SchemaComparator>,
    pub executor: Arc<dyn ExecutionService>,
    pub exporter: Arc<dyn FileExportService>,
}

/// Result of [`Orchestrator::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteOutcome {
    Skipped(SkipReason),
    /// Statements ran; `refresh` reports the follow-up compare.
    Executed {
        statements: usize,
        refresh: CompareOutcome,
    },
}

/// Result of [`Orchestrator::export_script`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    NotExported,
    Exported(PathBuf),
}

/// Drives compare → select → execute → refresh against the collaborators.
///
/// All state lives in one [`SyncMachine`]; the lock is never held across an
/// await, so concurrent calls interleave only at backend calls, where the
/// machine's in-flight flags decide what runs.
pub struct Orchestrator {
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    machine: Mutex<SyncMachine>,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators) -> Self {
        Self::with_clock(collaborators, Arc::new(SystemClock))
    }

    pub fn with_clock(collaborators: Collaborators, clock: Arc<dyn Clock>) -> Self {
        Self {
            collaborators,
            clock,
            machine: Mutex::new(SyncMachine::new()),
        }
    }

    fn machine(&self) -> MutexGuard<'_, SyncMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load connection records from the directory.
    pub async fn refresh_connections(&self) -> Result<usize> {
        let connections = self.collaborators.directory.list_connections().await?;
        let count = connections.len();
        self.machine().set_connections(connections);
        tracing::debug!(event = "connections_loaded", count = count);
        Ok(count)
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.machine().connections().to_vec()
    }

    pub fn set_source_connection(&self, connection_id: &str) {
        self.machine().set_connection(Side::Source, connection_id);
    }

    pub fn set_target_connection(&self, connection_id: &str) {
        self.machine().set_connection(Side::Target, connection_id);
    }

    pub fn set_source_database(&self, database: &str) {
        self.machine().set_database(Side::Source, database);
    }

    pub fn set_target_database(&self, database: &str) {
        self.machine().set_database(Side::Target, database);
    }

    pub fn needs_database(&self, side: Side) -> bool {
        self.machine().needs_database(side)
    }

    pub fn can_compare(&self) -> bool {
        self.machine().can_compare()
    }

    pub fn phase(&self) -> Phase {
        self.machine().phase()
    }

    pub fn is_exporting(&self) -> bool {
        self.machine().is_exporting()
    }

    pub fn result(&self) -> Option<DiffResult> {
        self.machine().result().cloned()
    }

    pub fn selection(&self) -> Selection {
        self.machine().selection().clone()
    }

    pub fn groups(&self) -> Vec<GroupView> {
        self.machine().groups()
    }

    /// Databases to offer for an unbound side, fetched once per connection.
    ///
    /// Bound or unset sides have nothing to choose and return an empty list.
    pub async fn database_options(&self, side: Side) -> Result<Vec<String>> {
        let connection_id = {
            let machine = self.machine();
            if !machine.needs_database(side) {
                return Ok(Vec::new());
            }
            let Some(connection_id) = machine.side(side).connection_id.clone() else {
                return Ok(Vec::new());
            };
            if let Some(cached) = machine.cached_databases(&connection_id) {
                return Ok(cached.to_vec());
            }
            connection_id
        };

        let databases = self
            .collaborators
            .directory
            .list_databases(&connection_id)
            .await?;
        tracing::info!(
            event = "databases_listed",
            connection_id = %connection_id,
            count = databases.len()
        );
        self.machine()
            .store_databases(&connection_id, databases.clone());
        Ok(databases)
    }

    /// Compare the chosen connections. No-op unless [`Self::can_compare`].
    pub async fn compare(&self) -> Result<CompareOutcome> {
        let ticket = self.machine().begin_compare();
        let Some(ticket) = ticket else {
            tracing::debug!(event = "compare_skipped");
            return Ok(CompareOutcome::Skipped);
        };

        tracing::info!(
            event = "compare_started",
            source_id = %ticket.request.source_id,
            target_id = %ticket.request.target_id,
            source_database = ticket.request.source_database.as_deref().unwrap_or(""),
            target_database = ticket.request.target_database.as_deref().unwrap_or(""),
        );

        let outcome = self.collaborators.comparator.compare(&ticket.request).await;
        if let Err(err) = &outcome {
            tracing::error!(event = "compare_failed", error = %err);
        }

        let finished = self.machine().finish_compare(ticket.generation, outcome)?;
        match &finished {
            CompareOutcome::Completed { items } => {
                tracing::info!(event = "compare_finished", items = *items);
            }
            CompareOutcome::Superseded => {
                tracing::info!(event = "compare_result_discarded", generation = ticket.generation);
            }
            CompareOutcome::Skipped => {}
        }
        Ok(finished)
    }

    pub fn toggle_item(&self, id: &str) {
        self.machine().toggle_item(id);
    }

    pub fn toggle_group(&self, table_name: &str) {
        self.machine().toggle_group(table_name);
    }

    pub fn select_all(&self) {
        self.machine().select_all();
    }

    pub fn deselect_all(&self) {
        self.machine().deselect_all();
    }

    /// Script text for the current selection; empty when nothing is selected.
    pub fn script(&self) -> String {
        self.machine().script(self.clock.as_ref())
    }

    /// Run the selected statements on the target, then compare again.
    ///
    /// On failure the result and selection stay as they were so the user can
    /// retry without re-comparing.
    pub async fn execute(&self) -> Result<ExecuteOutcome> {
        let begun = self.machine().begin_execute();
        let request = match begun {
            Ok(request) => request,
            Err(reason) => {
                tracing::info!(event = "execute_skipped", reason = ?reason);
                return Ok(ExecuteOutcome::Skipped(reason));
            }
        };

        let target = self
            .machine()
            .connection(Side::Target)
            .map(|connection| connection.redacted_url(request.target_database.as_deref()))
            .unwrap_or_else(|| request.target_id.clone());
        tracing::info!(
            event = "execute_started",
            target = %target,
            statements = request.statements.len()
        );

        let outcome = self.collaborators.executor.execute(&request).await;
        if let Err(err) = &outcome {
            tracing::error!(event = "execute_failed", error = %err);
        }
        self.machine().finish_execute(outcome)?;
        tracing::info!(event = "execute_finished", statements = request.statements.len());

        let refresh = self.compare().await?;
        Ok(ExecuteOutcome::Executed {
            statements: request.statements.len(),
            refresh,
        })
    }

    /// Save the current script through the export service.
    pub async fn export_script(&self) -> Result<ExportOutcome> {
        let script = self.script();
        if script.is_empty() {
            return Ok(ExportOutcome::NotExported);
        }

        let _guard = ExportGuard::begin(&self.machine);
        let exporter = &self.collaborators.exporter;
        let Some(path) = exporter
            .choose_save_path(SUGGESTED_FILE_NAME, &ExtensionFilter::sql())
            .await?
        else {
            tracing::info!(event = "export_cancelled");
            return Ok(ExportOutcome::NotExported);
        };

        exporter.write_file(&path, &script).await?;
        tracing::info!(event = "export_written", path = %path.display(), bytes = script.len());
        Ok(ExportOutcome::Exported(path))
    }
}

/// Holds the exporting flag for the duration of an export, on every exit path.
struct ExportGuard<'a> {
    machine: &'a Mutex<SyncMachine>,
}

impl<'a> ExportGuard<'a> {
    fn begin(machine: &'a Mutex<SyncMachine>) -> Self {
        machine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .begin_export();
        Self { machine }
    }
}

impl Drop for ExportGuard<'_> {
    fn drop(&mut self) {
        self.machine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish_export();
    }
}
