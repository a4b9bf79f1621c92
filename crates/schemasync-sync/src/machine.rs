//! Synchronous state machine behind the orchestrator.
//!
//! Every public method is a transition over one owned record. Requests that
//! need a backend are returned as tickets; the caller performs the I/O and
//! feeds the outcome back through the matching `finish_*` method.

use std::collections::HashMap;
use std::sync::Arc;

use schemasync_core::{
    Clock, Connection, ConnectionDescriptor, Dialect, DiffItem, DiffResult, GroupState, Result,
    ScriptCache, ScriptKey, Selection, resolve_dialect,
};

use crate::ports::{CompareRequest, ExecuteRequest};

/// Which end of the comparison a setting applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

/// Coarse lifecycle of the sync workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Comparing,
    Ready,
    Executing,
}

/// Why an execute request did not reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoTarget,
    NoResult,
    NothingSelected,
    CompareInFlight,
    ExecuteInFlight,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideState {
    pub connection_id: Option<String>,
    /// Explicit database choice, used only while the connection is unbound.
    pub database: Option<String>,
}

/// Issued by [`SyncMachine::begin_compare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareTicket {
    pub generation: u64,
    pub request: CompareRequest,
}

/// What happened to a finished compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareOutcome {
    /// `can_compare` was false; nothing was cleared or sent.
    Skipped,
    /// The result was stored.
    Completed { items: usize },
    /// A newer compare started meanwhile; the result was dropped.
    Superseded,
}

/// Table group with its checkbox state, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupView {
    pub table_name: String,
    pub state: GroupState,
    pub items: Vec<DiffItem>,
}

#[derive(Debug, Default)]
pub struct SyncMachine {
    connections: Vec<Connection>,
    databases: HashMap<String, Vec<String>>,
    source: SideState,
    target: SideState,
    result: Option<Arc<DiffResult>>,
    result_revision: u64,
    selection: Selection,
    compare_generation: u64,
    pending_compare: Option<u64>,
    executing: bool,
    exporting: bool,
    script: ScriptCache,
}

impl SyncMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connections(&mut self, connections: Vec<Connection>) {
        self.connections = connections;
        self.script.clear();
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection(&self, side: Side) -> Option<&Connection> {
        let id = self.side(side).connection_id.as_deref()?;
        self.connections.iter().find(|connection| connection.id == id)
    }

    pub fn side(&self, side: Side) -> &SideState {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideState {
        match side {
            Side::Source => &mut self.source,
            Side::Target => &mut self.target,
        }
    }

    /// Choose the connection for one side. An empty id clears it.
    ///
    /// The side's explicit database is always reset, since the valid choices
    /// depend on the connection.
    pub fn set_connection(&mut self, side: Side, connection_id: &str) {
        let state = self.side_mut(side);
        state.connection_id = non_empty(connection_id);
        state.database = None;
    }

    /// Choose the explicit database for one side. An empty name clears it.
    pub fn set_database(&mut self, side: Side, database: &str) {
        self.side_mut(side).database = non_empty(database);
    }

    /// True when the side's connection record says it has no bound database.
    ///
    /// Connections missing from the loaded directory are not treated as
    /// unbound; the comparator reports them instead.
    pub fn needs_database(&self, side: Side) -> bool {
        self.connection(side).is_some_and(Connection::is_unbound)
    }

    pub fn can_compare(&self) -> bool {
        [Side::Source, Side::Target].into_iter().all(|side| {
            let state = self.side(side);
            state.connection_id.is_some() && (!self.needs_database(side) || state.database.is_some())
        })
    }

    pub fn cached_databases(&self, connection_id: &str) -> Option<&[String]> {
        self.databases.get(connection_id).map(Vec::as_slice)
    }

    pub fn store_databases(&mut self, connection_id: &str, databases: Vec<String>) {
        self.databases.insert(connection_id.to_string(), databases);
    }

    pub fn phase(&self) -> Phase {
        if self.executing {
            Phase::Executing
        } else if self.pending_compare.is_some() {
            Phase::Comparing
        } else if self.result.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }

    pub fn is_comparing(&self) -> bool {
        self.pending_compare.is_some()
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    pub fn result(&self) -> Option<&DiffResult> {
        self.result.as_deref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Start a compare. Clears the result and selection before returning the
    /// request, so no stale selection outlives the result it belonged to.
    pub fn begin_compare(&mut self) -> Option<CompareTicket> {
        if !self.can_compare() {
            return None;
        }

        let source_id = self.source.connection_id.clone()?;
        let target_id = self.target.connection_id.clone()?;
        let request = CompareRequest {
            source_id,
            target_id,
            source_database: self.explicit_database(Side::Source),
            target_database: self.explicit_database(Side::Target),
        };

        self.result = None;
        self.selection = Selection::deselect_all();
        self.compare_generation += 1;
        self.pending_compare = Some(self.compare_generation);

        Some(CompareTicket {
            generation: self.compare_generation,
            request,
        })
    }

    /// Record a compare outcome. Errors leave the result absent.
    ///
    /// A superseded compare never touches state, but its error is still
    /// returned to the caller.
    pub fn finish_compare(
        &mut self,
        generation: u64,
        outcome: Result<DiffResult>,
    ) -> Result<CompareOutcome> {
        if self.pending_compare != Some(generation) {
            return outcome.map(|_| CompareOutcome::Superseded);
        }
        self.pending_compare = None;

        let result = outcome?;
        let items = result.items.len();
        self.result = Some(Arc::new(result));
        self.result_revision += 1;
        Ok(CompareOutcome::Completed { items })
    }

    pub fn toggle_item(&mut self, id: &str) {
        if let Some(result) = &self.result {
            self.selection = self.selection.toggle_item(result, id);
        }
    }

    pub fn toggle_group(&mut self, table_name: &str) {
        if let Some(result) = &self.result {
            self.selection = self.selection.toggle_group(result, table_name);
        }
    }

    pub fn select_all(&mut self) {
        if let Some(result) = &self.result {
            self.selection = Selection::select_all(result);
        }
    }

    pub fn deselect_all(&mut self) {
        self.selection = Selection::deselect_all();
    }

    pub fn groups(&self) -> Vec<GroupView> {
        let Some(result) = &self.result else {
            return Vec::new();
        };
        result
            .groups()
            .into_iter()
            .map(|group| GroupView {
                table_name: group.table_name.to_string(),
                state: self.selection.group_state(result, group.table_name),
                items: group.items.into_iter().cloned().collect(),
            })
            .collect()
    }

    /// Selected, non-blank SQL fragments in result order.
    pub fn selected_statements(&self) -> Vec<String> {
        let Some(result) = &self.result else {
            return Vec::new();
        };
        self.selection
            .selected_items(result)
            .into_iter()
            .filter(|item| !item.sql.trim().is_empty())
            .map(|item| item.sql.clone())
            .collect()
    }

    /// Start an execute, or say why it must not run.
    pub fn begin_execute(&mut self) -> std::result::Result<ExecuteRequest, SkipReason> {
        let Some(target_id) = self.target.connection_id.clone() else {
            return Err(SkipReason::NoTarget);
        };
        if self.executing {
            return Err(SkipReason::ExecuteInFlight);
        }
        if self.pending_compare.is_some() {
            return Err(SkipReason::CompareInFlight);
        }
        if self.result.is_none() {
            return Err(SkipReason::NoResult);
        }

        let statements = self.selected_statements();
        if statements.is_empty() {
            return Err(SkipReason::NothingSelected);
        }

        self.executing = true;
        Ok(ExecuteRequest {
            target_id,
            statements,
            target_database: self.explicit_database(Side::Target),
        })
    }

    /// Clear the in-flight flag. Result and selection are untouched either way.
    pub fn finish_execute(&mut self, outcome: Result<()>) -> Result<()> {
        self.executing = false;
        outcome
    }

    pub fn begin_export(&mut self) {
        self.exporting = true;
    }

    pub fn finish_export(&mut self) {
        self.exporting = false;
    }

    pub fn dialect(&self) -> Option<Dialect> {
        resolve_dialect(
            self.connection(Side::Target).map(|connection| connection.dialect),
            self.connection(Side::Source).map(|connection| connection.dialect),
        )
    }

    pub fn descriptor(&self, side: Side) -> Option<ConnectionDescriptor> {
        let database = self.side(side).database.as_deref();
        self.connection(side)
            .map(|connection| connection.descriptor(database))
    }

    /// Script for the current selection, reassembled only when its inputs change.
    pub fn script(&mut self, clock: &dyn Clock) -> String {
        let Some(result) = self.result.clone() else {
            return String::new();
        };
        let items = self.selection.selected_items(&result);
        let key = ScriptKey {
            dialect: self.dialect(),
            source: self.descriptor(Side::Source),
            target: self.descriptor(Side::Target),
            result_revision: self.result_revision,
            item_ids: items.iter().map(|item| item.id.clone()).collect(),
        };
        self.script.get_or_assemble(key, &items, clock)
    }

    fn explicit_database(&self, side: Side) -> Option<String> {
        if self.needs_database(side) {
            self.side(side).database.clone()
        } else {
            None
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
