use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use schemasync_core::{
    Clock, Connection, Credentials, Dialect, DiffItem, DiffKind, DiffResult, Error, GroupState,
    Result,
};
use schemasync_sync::{
    Collaborators, CompareOutcome, CompareRequest, ConnectionDirectory, ExecuteOutcome,
    ExecuteRequest, ExecutionService, ExportOutcome, ExtensionFilter, FileExportService,
    Orchestrator, Phase, SchemaComparator, Side, SkipReason,
};
use tokio::sync::oneshot;

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|date| date.and_hms_opt(12, 0, 0))
            .expect("valid timestamp")
    }
}

#[derive(Default)]
struct FakeDirectory {
    connections: Vec<Connection>,
    databases: HashMap<String, Vec<String>>,
    database_calls: AtomicUsize,
}

#[async_trait]
impl ConnectionDirectory for FakeDirectory {
    async fn list_connections(&self) -> Result<Vec<Connection>> {
        Ok(self.connections.clone())
    }

    async fn list_databases(&self, connection_id: &str) -> Result<Vec<String>> {
        self.database_calls.fetch_add(1, Ordering::SeqCst);
        self.databases
            .get(connection_id)
            .cloned()
            .ok_or_else(|| Error::Connectivity(format!("{connection_id} unreachable")))
    }
}

#[derive(Default)]
struct FakeComparator {
    responses: Mutex<VecDeque<Result<DiffResult>>>,
    requests: Mutex<Vec<CompareRequest>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeComparator {
    fn respond(&self, response: Result<DiffResult>) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SchemaComparator for FakeComparator {
    async fn compare(&self, request: &CompareRequest) -> Result<DiffResult> {
        self.requests.lock().unwrap().push(request.clone());
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DiffResult::default()))
    }
}

#[derive(Default)]
struct FakeExecutor {
    failure: Option<Error>,
    requests: Mutex<Vec<ExecuteRequest>>,
}

#[async_trait]
impl ExecutionService for FakeExecutor {
    async fn execute(&self, request: &ExecuteRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct FakeExporter {
    path: Option<PathBuf>,
    write_failure: Option<Error>,
    dialogs: Mutex<Vec<(String, ExtensionFilter)>>,
    writes: Mutex<Vec<(PathBuf, String)>>,
}

#[async_trait]
impl FileExportService for FakeExporter {
    async fn choose_save_path(
        &self,
        default_name: &str,
        filter: &ExtensionFilter,
    ) -> Result<Option<PathBuf>> {
        self.dialogs
            .lock()
            .unwrap()
            .push((default_name.to_string(), filter.clone()));
        Ok(self.path.clone())
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(err) = &self.write_failure {
            return Err(err.clone());
        }
        self.writes
            .lock()
            .unwrap()
            .push((path.to_path_buf(), content.to_string()));
        Ok(())
    }
}

fn connection(id: &str, dialect: Dialect, database: Option<&str>) -> Connection {
    Connection {
        id: id.to_string(),
        name: format!("{id} server"),
        dialect,
        host: "db.internal".to_string(),
        port: dialect.default_port(),
        credentials: Credentials {
            username: "sync".to_string(),
            password: Some("pw".to_string()),
        },
        database: database.map(str::to_string),
        ssl: None,
    }
}

fn item(id: &str, table: &str, sql: &str) -> DiffItem {
    DiffItem {
        id: id.to_string(),
        kind: DiffKind::ColumnAdded,
        table_name: table.to_string(),
        object_name: Some(format!("col_{id}")),
        source_def: Some("int".to_string()),
        target_def: None,
        sql: sql.to_string(),
        selected: true,
    }
}

fn diff_result() -> DiffResult {
    DiffResult {
        items: vec![
            item("1", "users", "CREATE TABLE users (id INT PRIMARY KEY);"),
            item("2", "posts", "ALTER TABLE posts ADD COLUMN title VARCHAR(255);"),
            item("3", "posts", "ALTER TABLE posts ADD COLUMN body TEXT;"),
        ],
        source_tables: 2,
        target_tables: 1,
    }
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    directory: Arc<FakeDirectory>,
    comparator: Arc<FakeComparator>,
    executor: Arc<FakeExecutor>,
    exporter: Arc<FakeExporter>,
}

fn harness_with(
    target_dialect: Dialect,
    executor: FakeExecutor,
    exporter: FakeExporter,
) -> Harness {
    let directory = Arc::new(FakeDirectory {
        connections: vec![
            connection("src", Dialect::MySql, Some("app")),
            connection("dst", target_dialect, None),
        ],
        databases: HashMap::from([(
            "dst".to_string(),
            vec!["app_staging".to_string(), "app_prod".to_string()],
        )]),
        database_calls: AtomicUsize::new(0),
    });
    let comparator = Arc::new(FakeComparator::default());
    let executor = Arc::new(executor);
    let exporter = Arc::new(exporter);
    let orchestrator = Arc::new(Orchestrator::with_clock(
        Collaborators {
            directory: directory.clone(),
            comparator: comparator.clone(),
            executor: executor.clone(),
            exporter: exporter.clone(),
        },
        Arc::new(FixedClock),
    ));
    Harness {
        orchestrator,
        directory,
        comparator,
        executor,
        exporter,
    }
}

fn harness() -> Harness {
    harness_with(Dialect::MySql, FakeExecutor::default(), FakeExporter::default())
}

async fn ready(harness: &Harness) {
    let orchestrator = &harness.orchestrator;
    orchestrator.refresh_connections().await.expect("load connections");
    orchestrator.set_source_connection("src");
    orchestrator.set_target_connection("dst");
    orchestrator.set_target_database("app_staging");
    harness.comparator.respond(Ok(diff_result()));
    let outcome = orchestrator.compare().await.expect("compare");
    assert_eq!(outcome, CompareOutcome::Completed { items: 3 });
}

#[tokio::test]
async fn compare_is_a_no_op_until_unbound_target_has_database() {
    let harness = harness();
    let orchestrator = &harness.orchestrator;
    orchestrator.refresh_connections().await.expect("load connections");

    assert!(!orchestrator.can_compare());
    orchestrator.set_source_connection("src");
    orchestrator.set_target_connection("dst");
    assert!(orchestrator.needs_database(Side::Target));
    assert!(!orchestrator.can_compare());

    let outcome = orchestrator.compare().await.expect("compare");
    assert_eq!(outcome, CompareOutcome::Skipped);
    assert_eq!(harness.comparator.calls(), 0);

    orchestrator.set_target_database("app_staging");
    assert!(orchestrator.can_compare());
}

#[tokio::test]
async fn compare_sends_explicit_database_for_unbound_side_only() {
    let harness = harness();
    ready(&harness).await;

    let requests = harness.comparator.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![CompareRequest {
            source_id: "src".to_string(),
            target_id: "dst".to_string(),
            source_database: None,
            target_database: Some("app_staging".to_string()),
        }]
    );
    assert_eq!(harness.orchestrator.phase(), Phase::Ready);
    assert_eq!(harness.orchestrator.result(), Some(diff_result()));
}

#[tokio::test]
async fn compare_failure_discards_previous_result() {
    let harness = harness();
    ready(&harness).await;
    harness.orchestrator.select_all();

    harness
        .comparator
        .respond(Err(Error::Connectivity("access denied".to_string())));
    let err = harness.orchestrator.compare().await.unwrap_err();

    assert_eq!(err, Error::Connectivity("access denied".to_string()));
    assert_eq!(harness.orchestrator.result(), None);
    assert!(harness.orchestrator.selection().is_empty());
    assert_eq!(harness.orchestrator.phase(), Phase::Idle);
}

#[tokio::test]
async fn superseded_compare_failure_reaches_its_caller() {
    let harness = harness();
    ready(&harness).await;

    let (release, gate) = oneshot::channel();
    *harness.comparator.gate.lock().unwrap() = Some(gate);
    // The gated first call answers last.
    harness.comparator.respond(Ok(diff_result()));
    harness
        .comparator
        .respond(Err(Error::Connectivity("connection reset".to_string())));

    let (first, second) = tokio::join!(harness.orchestrator.compare(), async {
        let outcome = harness.orchestrator.compare().await;
        let _ = release.send(());
        outcome
    });

    assert_eq!(first, Err(Error::Connectivity("connection reset".to_string())));
    assert_eq!(second, Ok(CompareOutcome::Completed { items: 3 }));
    assert_eq!(harness.orchestrator.result(), Some(diff_result()));
    assert_eq!(harness.orchestrator.phase(), Phase::Ready);
}

#[tokio::test]
async fn blank_only_selection_yields_no_script() {
    let harness = harness();
    let orchestrator = &harness.orchestrator;
    orchestrator.refresh_connections().await.expect("load connections");
    orchestrator.set_source_connection("src");
    orchestrator.set_target_connection("dst");
    orchestrator.set_target_database("app_staging");
    harness.comparator.respond(Ok(DiffResult {
        items: vec![item("9", "audit", "  \n ")],
        source_tables: 1,
        target_tables: 1,
    }));
    orchestrator.compare().await.expect("compare");
    orchestrator.select_all();
    assert_eq!(orchestrator.selection().len(), 1);

    assert_eq!(orchestrator.script(), "");
    assert_eq!(
        orchestrator.execute().await.expect("execute"),
        ExecuteOutcome::Skipped(SkipReason::NothingSelected)
    );
    assert_eq!(
        orchestrator.export_script().await.expect("export"),
        ExportOutcome::NotExported
    );
    assert!(harness.exporter.dialogs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn selection_commands_follow_tri_state_rules() {
    let harness = harness();
    ready(&harness).await;
    let orchestrator = &harness.orchestrator;

    orchestrator.toggle_item("2");
    let groups = orchestrator.groups();
    assert_eq!(groups[1].table_name, "posts");
    assert_eq!(groups[1].state, GroupState::Indeterminate);

    orchestrator.toggle_group("posts");
    assert_eq!(orchestrator.selection().len(), 2);
    orchestrator.toggle_group("posts");
    assert!(orchestrator.selection().is_empty());

    orchestrator.toggle_item("missing");
    assert!(orchestrator.selection().is_empty());

    orchestrator.select_all();
    assert_eq!(orchestrator.selection().len(), 3);
    orchestrator.deselect_all();
    assert_eq!(orchestrator.selection().len(), 0);
}

#[tokio::test]
async fn script_tracks_selection_in_result_order() {
    let harness = harness();
    ready(&harness).await;
    let orchestrator = &harness.orchestrator;
    assert_eq!(orchestrator.script(), "");

    orchestrator.toggle_item("1");
    let script = orchestrator.script();
    assert!(script.contains("-- Database Structure Sync v"));
    assert!(script.contains("-- Source:          src server (db.internal:3306/app)"));
    assert!(script.contains("-- Target:          dst server (db.internal:3306/app_staging)"));
    assert!(script.contains("CREATE TABLE users (id INT PRIMARY KEY);"));
    assert!(!script.contains("ALTER TABLE posts"));
    assert!(script.ends_with("-- End of synchronization script"));

    orchestrator.toggle_item("3");
    orchestrator.toggle_item("2");
    let script = orchestrator.script();
    assert!(script.contains("Changes:         3 item(s)"));
    let title = script.find("ADD COLUMN title").expect("title present");
    let body = script.find("ADD COLUMN body").expect("body present");
    assert!(title < body);
}

#[tokio::test]
async fn script_dialect_follows_target() {
    let harness = harness_with(
        Dialect::PostgreSql,
        FakeExecutor::default(),
        FakeExporter::default(),
    );
    ready(&harness).await;
    harness.orchestrator.select_all();

    let script = harness.orchestrator.script();
    assert!(script.contains("-- Dialect:         PostgreSQL"));
    assert!(script.contains("SET statement_timeout = 0;"));
    assert!(!script.contains("SET NAMES utf8mb4"));
}

#[tokio::test]
async fn execute_without_selection_never_reaches_executor() {
    let harness = harness();
    ready(&harness).await;

    let outcome = harness.orchestrator.execute().await.expect("execute");
    assert_eq!(outcome, ExecuteOutcome::Skipped(SkipReason::NothingSelected));
    assert!(harness.executor.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn execute_without_result_is_skipped() {
    let harness = harness();
    harness.orchestrator.refresh_connections().await.expect("load connections");
    harness.orchestrator.set_target_connection("dst");

    let outcome = harness.orchestrator.execute().await.expect("execute");
    assert_eq!(outcome, ExecuteOutcome::Skipped(SkipReason::NoResult));
}

#[tokio::test]
async fn execute_success_refreshes_comparison() {
    let harness = harness();
    ready(&harness).await;
    let orchestrator = &harness.orchestrator;
    orchestrator.toggle_item("3");
    orchestrator.toggle_item("1");

    let refreshed = DiffResult {
        items: vec![item("1", "posts", "ALTER TABLE posts ADD COLUMN title VARCHAR(255);")],
        source_tables: 2,
        target_tables: 2,
    };
    harness.comparator.respond(Ok(refreshed.clone()));

    let outcome = orchestrator.execute().await.expect("execute");
    assert_eq!(
        outcome,
        ExecuteOutcome::Executed {
            statements: 2,
            refresh: CompareOutcome::Completed { items: 1 },
        }
    );

    let requests = harness.executor.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![ExecuteRequest {
            target_id: "dst".to_string(),
            statements: vec![
                "CREATE TABLE users (id INT PRIMARY KEY);".to_string(),
                "ALTER TABLE posts ADD COLUMN body TEXT;".to_string(),
            ],
            target_database: Some("app_staging".to_string()),
        }]
    );
    assert_eq!(harness.comparator.calls(), 2);
    assert_eq!(orchestrator.result(), Some(refreshed));
    assert!(orchestrator.selection().is_empty());
}

#[tokio::test]
async fn execute_failure_keeps_result_and_selection() {
    let harness = harness_with(
        Dialect::MySql,
        FakeExecutor {
            failure: Some(Error::Execution("Failed to execute: DROP".to_string())),
            requests: Mutex::new(Vec::new()),
        },
        FakeExporter::default(),
    );
    ready(&harness).await;
    let orchestrator = &harness.orchestrator;
    orchestrator.toggle_item("2");
    let before_result = orchestrator.result();
    let before_selection = orchestrator.selection();

    let err = orchestrator.execute().await.unwrap_err();

    assert_eq!(err, Error::Execution("Failed to execute: DROP".to_string()));
    assert_eq!(orchestrator.result(), before_result);
    assert_eq!(orchestrator.selection(), before_selection);
    assert_eq!(orchestrator.phase(), Phase::Ready);
    assert_eq!(harness.comparator.calls(), 1, "no refresh after failure");
}

#[tokio::test]
async fn execute_is_rejected_while_compare_in_flight() {
    let harness = harness();
    ready(&harness).await;
    harness.orchestrator.select_all();

    let (release, gate) = oneshot::channel();
    *harness.comparator.gate.lock().unwrap() = Some(gate);
    harness.comparator.respond(Ok(diff_result()));

    let orchestrator = harness.orchestrator.clone();
    let (compared, executed) = tokio::join!(orchestrator.compare(), async {
        let outcome = harness.orchestrator.execute().await;
        let _ = release.send(());
        outcome
    });

    assert_eq!(
        compared.expect("compare"),
        CompareOutcome::Completed { items: 3 }
    );
    assert_eq!(
        executed.expect("execute"),
        ExecuteOutcome::Skipped(SkipReason::CompareInFlight)
    );
    assert!(harness.executor.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn database_options_are_listed_lazily_and_cached() {
    let harness = harness();
    let orchestrator = &harness.orchestrator;
    orchestrator.refresh_connections().await.expect("load connections");
    orchestrator.set_source_connection("src");
    orchestrator.set_target_connection("dst");

    let source = orchestrator
        .database_options(Side::Source)
        .await
        .expect("source options");
    assert!(source.is_empty(), "bound connections offer no choices");
    assert_eq!(harness.directory.database_calls.load(Ordering::SeqCst), 0);

    let first = orchestrator
        .database_options(Side::Target)
        .await
        .expect("target options");
    let second = orchestrator
        .database_options(Side::Target)
        .await
        .expect("target options");
    assert_eq!(first, vec!["app_staging", "app_prod"]);
    assert_eq!(first, second);
    assert_eq!(harness.directory.database_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn export_with_empty_script_touches_nothing() {
    let harness = harness();
    ready(&harness).await;

    let outcome = harness.orchestrator.export_script().await.expect("export");
    assert_eq!(outcome, ExportOutcome::NotExported);
    assert!(harness.exporter.dialogs.lock().unwrap().is_empty());
    assert!(harness.exporter.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn export_cancelled_does_not_write() {
    let harness = harness();
    ready(&harness).await;
    harness.orchestrator.select_all();

    let outcome = harness.orchestrator.export_script().await.expect("export");
    assert_eq!(outcome, ExportOutcome::NotExported);
    let dialogs = harness.exporter.dialogs.lock().unwrap().clone();
    assert_eq!(dialogs, vec![("sync.sql".to_string(), ExtensionFilter::sql())]);
    assert!(harness.exporter.writes.lock().unwrap().is_empty());
    assert!(!harness.orchestrator.is_exporting());
}

#[tokio::test]
async fn export_writes_current_script() {
    let harness = harness_with(
        Dialect::MySql,
        FakeExecutor::default(),
        FakeExporter {
            path: Some(PathBuf::from("/tmp/out/sync.sql")),
            ..FakeExporter::default()
        },
    );
    ready(&harness).await;
    harness.orchestrator.toggle_item("1");

    let outcome = harness.orchestrator.export_script().await.expect("export");
    assert_eq!(
        outcome,
        ExportOutcome::Exported(PathBuf::from("/tmp/out/sync.sql"))
    );
    let writes = harness.exporter.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].1, harness.orchestrator.script());
    assert!(!harness.orchestrator.is_exporting());
}

#[tokio::test]
async fn export_write_failure_propagates_and_resets_flag() {
    let harness = harness_with(
        Dialect::MySql,
        FakeExecutor::default(),
        FakeExporter {
            path: Some(PathBuf::from("/readonly/sync.sql")),
            write_failure: Some(Error::Export("permission denied".to_string())),
            ..FakeExporter::default()
        },
    );
    ready(&harness).await;
    harness.orchestrator.select_all();

    let err = harness.orchestrator.export_script().await.unwrap_err();
    assert_eq!(err, Error::Export("permission denied".to_string()));
    assert!(!harness.orchestrator.is_exporting());
}
