//! Concrete collaborators wired into the orchestrator by the CLI.

mod comparator;
mod directory;
mod export;

pub use comparator::CommandComparator;
pub use directory::ProfileDirectory;
pub use export::FsExporter;
