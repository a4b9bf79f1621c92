//! Sync orchestration for schemasync.
//!
//! [`Orchestrator`] owns the comparison result and the selection over it and
//! coordinates the external comparator, executor, connection directory and
//! export service defined in [`ports`].

pub mod machine;
pub mod orchestrator;
pub mod ports;

pub use machine::{
    CompareOutcome, CompareTicket, GroupView, Phase, Side, SideState, SkipReason, SyncMachine,
};
pub use orchestrator::{
    Collaborators, ExecuteOutcome, ExportOutcome, Orchestrator, SUGGESTED_FILE_NAME,
};
pub use ports::{
    CompareRequest, ConnectionDirectory, ExecuteRequest, ExecutionService, ExtensionFilter,
    FileExportService, SchemaComparator,
};
