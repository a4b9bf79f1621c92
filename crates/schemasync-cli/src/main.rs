mod backend;
mod logging;
mod prompt;
mod render;
mod workspace;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use backend::{CommandComparator, FsExporter, ProfileDirectory};
use logging::{LoggingError, init_logging};
use render::{render_connections, render_groups};
use schemasync_core::{DiffResult, Error as CoreError, GroupState};
use schemasync_sqlx::SqlxExecutor;
use schemasync_sync::{
    Collaborators, CompareOutcome, ConnectionDirectory, ExecuteOutcome, ExportOutcome,
    Orchestrator, Side, SkipReason,
};
use workspace::{
    DEFAULT_WORKSPACE, WorkspaceError, WorkspacePaths, WorkspaceSettings,
    load_or_create_connections, load_or_create_settings,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Sync(#[from] CoreError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}

#[derive(Parser, Debug)]
#[command(
    name = "schemasync",
    version,
    about = "Compare two database schemas and apply the selected changes"
)]
struct Cli {
    /// Workspace directory holding config and logs.
    #[arg(long, global = true, default_value = DEFAULT_WORKSPACE)]
    workspace: PathBuf,
    /// Print debug output on stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List saved connections.
    Connections,
    /// List databases reachable through a connection.
    Databases(DatabasesArgs),
    /// Compare two connections and print the differences.
    Diff(DiffArgs),
    /// Print or export the sync script for the selected differences.
    Script(ScriptArgs),
    /// Apply the selected differences to the target and compare again.
    Sync(SyncArgs),
    /// Print the JSON schema comparator output must follow.
    Contract,
}

#[derive(Args, Debug)]
struct DatabasesArgs {
    /// Connection id from connections.toml.
    connection: String,
}

#[derive(Args, Debug)]
struct PairArgs {
    /// Source connection id.
    #[arg(long)]
    source: String,
    /// Target connection id.
    #[arg(long)]
    target: String,
    /// Database to compare when the source connection is not bound to one.
    #[arg(long)]
    source_database: Option<String>,
    /// Database to compare when the target connection is not bound to one.
    #[arg(long)]
    target_database: Option<String>,
}

#[derive(Args, Debug)]
struct SelectionArgs {
    /// Select a difference by id. Repeatable.
    #[arg(long = "select", value_name = "ID")]
    ids: Vec<String>,
    /// Select every difference of a table. Repeatable.
    #[arg(long = "table", value_name = "NAME")]
    tables: Vec<String>,
    /// Select every difference.
    #[arg(long, default_value_t = false)]
    all: bool,
}

#[derive(Args, Debug)]
struct DiffArgs {
    #[command(flatten)]
    pair: PairArgs,
    /// Print the raw comparison result as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct ScriptArgs {
    #[command(flatten)]
    pair: PairArgs,
    #[command(flatten)]
    selection: SelectionArgs,
    /// Save the script instead of printing it, asking for a path.
    #[arg(long, default_value_t = false)]
    export: bool,
    /// Save the script to this path.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SyncArgs {
    #[command(flatten)]
    pair: PairArgs,
    #[command(flatten)]
    selection: SelectionArgs,
    /// Skip the confirmation prompt.
    #[arg(long, short, default_value_t = false)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    if let Command::Contract = cli.command {
        return run_contract();
    }

    let paths = WorkspacePaths::new(cli.workspace);
    paths.ensure_dirs()?;
    let settings = load_or_create_settings(&paths)?;
    init_logging(&paths.cli_log_path(), &settings.log_filter, cli.verbose)?;

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", run_id = %run_id);
    let result = run(cli.command, &paths, &settings).instrument(span).await;
    if let Err(err) = &result {
        tracing::error!(event = "run_failed", run_id = %run_id, error = %err);
    }
    result
}

async fn run(
    command: Command,
    paths: &WorkspacePaths,
    settings: &WorkspaceSettings,
) -> Result<(), CliError> {
    match command {
        Command::Connections => {
            let app = App::open(paths, settings, None).await?;
            println!("{}", render_connections(&app.orchestrator.connections()));
            Ok(())
        }
        Command::Databases(args) => run_databases(args, paths, settings).await,
        Command::Diff(args) => run_diff(args, paths, settings).await,
        Command::Script(args) => run_script(args, paths, settings).await,
        Command::Sync(args) => run_sync(args, paths, settings).await,
        Command::Contract => run_contract(),
    }
}

/// Orchestrator wired to the workspace's collaborators.
struct App {
    orchestrator: Orchestrator,
    directory: Arc<dyn ConnectionDirectory>,
}

impl App {
    async fn open(
        paths: &WorkspacePaths,
        settings: &WorkspaceSettings,
        export_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        let config = load_or_create_connections(paths)?;
        let connections = config.to_connections(|var| std::env::var(var).ok());
        let pool = settings.pool.to_options();

        let directory: Arc<dyn ConnectionDirectory> =
            Arc::new(ProfileDirectory::new(connections, pool.clone()));
        let collaborators = Collaborators {
            directory: Arc::clone(&directory),
            comparator: Arc::new(CommandComparator::new(
                settings.comparator.command.clone(),
                paths.connections_path(),
            )),
            executor: Arc::new(SqlxExecutor::new(Arc::clone(&directory), pool)),
            exporter: Arc::new(FsExporter::new(export_path)),
        };

        let orchestrator = Orchestrator::new(collaborators);
        let loaded = orchestrator.refresh_connections().await?;
        tracing::debug!(event = "connections_loaded", count = loaded);
        Ok(Self {
            orchestrator,
            directory,
        })
    }

    fn ensure_known(&self, connection_id: &str) -> Result<(), CliError> {
        let known = self
            .orchestrator
            .connections()
            .iter()
            .any(|connection| connection.id == connection_id);
        if known {
            Ok(())
        } else {
            Err(CliError::InvalidArgs(format!(
                "unknown connection '{connection_id}'"
            )))
        }
    }

    /// Choose both sides, resolve databases for unbound ones, then compare.
    async fn compare(&self, pair: &PairArgs) -> Result<DiffResult, CliError> {
        self.ensure_known(&pair.source)?;
        self.ensure_known(&pair.target)?;
        self.orchestrator.set_source_connection(&pair.source);
        self.orchestrator.set_target_connection(&pair.target);
        self.choose_database(Side::Source, &pair.source, pair.source_database.as_deref())
            .await?;
        self.choose_database(Side::Target, &pair.target, pair.target_database.as_deref())
            .await?;

        match self.orchestrator.compare().await? {
            CompareOutcome::Completed { .. } => {}
            outcome => {
                return Err(CliError::InvalidArgs(format!(
                    "comparison did not run: {outcome:?}"
                )));
            }
        }
        self.orchestrator
            .result()
            .ok_or_else(|| CliError::InvalidArgs("comparison produced no result".to_string()))
    }

    async fn choose_database(
        &self,
        side: Side,
        connection_id: &str,
        database: Option<&str>,
    ) -> Result<(), CliError> {
        let flag = match side {
            Side::Source => "--source-database",
            Side::Target => "--target-database",
        };
        if !self.orchestrator.needs_database(side) {
            if database.is_some() {
                tracing::warn!(
                    event = "database_ignored",
                    connection_id = %connection_id,
                    flag,
                    "connection is bound to a database"
                );
            }
            return Ok(());
        }

        let options = self.orchestrator.database_options(side).await?;
        match database {
            Some(name) if options.iter().any(|option| option == name) => {
                match side {
                    Side::Source => self.orchestrator.set_source_database(name),
                    Side::Target => self.orchestrator.set_target_database(name),
                }
                Ok(())
            }
            Some(name) => Err(CliError::InvalidArgs(format!(
                "database '{name}' not found on '{connection_id}' (available: {})",
                options.join(", ")
            ))),
            None => Err(CliError::InvalidArgs(format!(
                "connection '{connection_id}' is not bound to a database; pass {flag} (available: {})",
                options.join(", ")
            ))),
        }
    }

    /// Apply selection flags without undoing choices made by earlier flags.
    fn apply_selection(&self, args: &SelectionArgs, result: &DiffResult) -> Result<(), CliError> {
        if args.all {
            self.orchestrator.select_all();
        }
        for table in &args.tables {
            let state = self
                .orchestrator
                .groups()
                .into_iter()
                .find(|group| &group.table_name == table)
                .map(|group| group.state)
                .ok_or_else(|| CliError::InvalidArgs(format!("no differences for table '{table}'")))?;
            if state != GroupState::Checked {
                self.orchestrator.toggle_group(table);
            }
        }
        for id in &args.ids {
            if !result.contains(id) {
                return Err(CliError::InvalidArgs(format!("unknown difference id '{id}'")));
            }
            if !self.orchestrator.selection().contains(id) {
                self.orchestrator.toggle_item(id);
            }
        }
        Ok(())
    }
}

async fn run_databases(
    args: DatabasesArgs,
    paths: &WorkspacePaths,
    settings: &WorkspaceSettings,
) -> Result<(), CliError> {
    let app = App::open(paths, settings, None).await?;
    app.ensure_known(&args.connection)?;
    let databases = app.directory.list_databases(&args.connection).await?;
    tracing::info!(
        event = "databases_listed",
        connection_id = %args.connection,
        count = databases.len()
    );
    for database in databases {
        println!("{database}");
    }
    Ok(())
}

async fn run_diff(
    args: DiffArgs,
    paths: &WorkspacePaths,
    settings: &WorkspaceSettings,
) -> Result<(), CliError> {
    let app = App::open(paths, settings, None).await?;
    let result = app.compare(&args.pair).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "{}",
            render_groups(&app.orchestrator.groups(), &app.orchestrator.selection())
        );
    }
    Ok(())
}

async fn run_script(
    args: ScriptArgs,
    paths: &WorkspacePaths,
    settings: &WorkspaceSettings,
) -> Result<(), CliError> {
    let export = args.export || args.out.is_some();
    let app = App::open(paths, settings, args.out.clone()).await?;
    let result = app.compare(&args.pair).await?;
    app.apply_selection(&args.selection, &result)?;

    if app.orchestrator.selection().is_empty() {
        eprintln!("no differences selected; use --select, --table or --all");
        return Ok(());
    }

    if !export {
        println!("{}", app.orchestrator.script());
        return Ok(());
    }

    match app.orchestrator.export_script().await? {
        ExportOutcome::Exported(path) => eprintln!("script saved to {}", path.display()),
        ExportOutcome::NotExported => eprintln!("export cancelled"),
    }
    Ok(())
}

async fn run_sync(
    args: SyncArgs,
    paths: &WorkspacePaths,
    settings: &WorkspaceSettings,
) -> Result<(), CliError> {
    let app = App::open(paths, settings, None).await?;
    let result = app.compare(&args.pair).await?;
    app.apply_selection(&args.selection, &result)?;

    let selected = app.orchestrator.selection().len();
    if selected == 0 {
        eprintln!("no differences selected; use --select, --table or --all");
        return Ok(());
    }

    if !args.yes {
        eprintln!(
            "{}",
            render_groups(&app.orchestrator.groups(), &app.orchestrator.selection())
        );
        let question = format!("Apply {selected} change(s) to '{}'? [y/N] ", args.pair.target);
        let answer = prompt::ask_stdin(&question).await?;
        if !prompt::is_affirmative(answer.as_deref()) {
            eprintln!("aborted");
            return Ok(());
        }
    }

    match app.orchestrator.execute().await? {
        ExecuteOutcome::Skipped(reason) => {
            eprintln!("nothing executed: {}", describe_skip(reason));
        }
        ExecuteOutcome::Executed { statements, .. } => {
            let remaining = app
                .orchestrator
                .result()
                .map(|result| result.items.len())
                .unwrap_or_default();
            println!("applied {statements} statement(s); {remaining} difference(s) remain");
        }
    }
    Ok(())
}

fn describe_skip(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NoTarget => "no target connection",
        SkipReason::NoResult => "no comparison result",
        SkipReason::NothingSelected => "selected differences carry no SQL",
        SkipReason::CompareInFlight => "a comparison is running",
        SkipReason::ExecuteInFlight => "an execution is running",
    }
}

fn run_contract() -> Result<(), CliError> {
    let schema = schemars::schema_for!(DiffResult);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
