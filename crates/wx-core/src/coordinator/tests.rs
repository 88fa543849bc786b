use super::*;
use std::sync::atomic::{AtomicBool, Ordering};
use arrow::array::{Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::error::QueryBuildError;
use crate::query::{Projection, SqlQuery};

/// Store answering every query with its filter rendered as text
struct MockStore {
    executed: Mutex<Vec<SqlQuery>>,
    gate: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
    fail: AtomicBool,
}

impl MockStore {
    fn new() -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            gate: None,
            delay: None,
            fail: AtomicBool::new(false),
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self { gate: Some(gate), ..Self::new() }
    }

    fn executions(&self) -> usize {
        self.executed.lock().len()
    }
}

#[async_trait::async_trait]
impl TabularStore for MockStore {
    async fn execute(&self, spec: &QuerySpec) -> Result<RecordBatch, QueryExecutionError> {
        self.executed.lock().push(spec.to_sql());

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| QueryExecutionError::Worker(e.to_string()))?
                .forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(QueryExecutionError::Rejected("mock failure".to_string()));
        }

        let schema = Arc::new(Schema::new(vec![Field::new("filter", DataType::Utf8, false)]));
        let filter = StringArray::from(vec![spec.filter.to_string()]);
        RecordBatch::try_new(schema, vec![Arc::new(filter)])
            .map_err(|e| QueryExecutionError::Conversion(e.to_string()))
    }

    fn store_name(&self) -> &str {
        "mock"
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Probe {
    Result { generation: u64, filter: String },
    Error(ClientError),
}

type ProbeLog = Arc<Mutex<Vec<Probe>>>;

struct ProbeClient {
    name: String,
    column: String,
    source: Option<String>,
    self_exclusion: bool,
    fail_build: bool,
    log: ProbeLog,
}

impl ProbeClient {
    fn new(name: &str) -> (Self, ProbeLog) {
        let log: ProbeLog = Arc::new(Mutex::new(Vec::new()));
        let client = Self {
            name: name.to_string(),
            column: name.to_string(),
            source: None,
            self_exclusion: false,
            fail_build: false,
            log: log.clone(),
        };
        (client, log)
    }

    fn producing(mut self, source: &str, self_exclusion: bool) -> Self {
        self.source = Some(source.to_string());
        self.self_exclusion = self_exclusion;
        self
    }

    fn reading(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }
}

impl Client for ProbeClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn self_exclusion(&self) -> bool {
        self.self_exclusion
    }

    fn build_query(&self, filter: &Predicate) -> Result<QuerySpec, QueryBuildError> {
        if self.fail_build {
            return Err(QueryBuildError::NotConfigured(self.name.clone()));
        }
        Ok(QuerySpec::from_table("weather")
            .select(Projection::column(self.column.clone()))
            .filter(filter.clone()))
    }

    fn on_result(&mut self, result: &QueryResult) {
        let filter = result
            .batch
            .column_by_name("filter")
            .and_then(|col| col.as_any().downcast_ref::<StringArray>().map(|a| a.value(0).to_string()))
            .unwrap_or_default();
        self.log.lock().push(Probe::Result { generation: result.generation, filter });
    }

    fn on_error(&mut self, error: &ClientError) {
        self.log.lock().push(Probe::Error(error.clone()));
    }
}

fn coordinator(store: Arc<MockStore>) -> Coordinator {
    Coordinator::new(store, CoordinatorConfig::default(), Handle::current())
}

fn results(log: &ProbeLog) -> Vec<(u64, String)> {
    log.lock()
        .iter()
        .filter_map(|probe| match probe {
            Probe::Result { generation, filter } => Some((*generation, filter.clone())),
            Probe::Error(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn test_connect_issues_initial_query() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (client, log) = ProbeClient::new("hist");
    let id = coordinator.connect(Box::new(client), Some(&selection));
    assert_eq!(coordinator.client_state(id), Some(ClientState::QueryPending { generation: 0 }));

    assert_eq!(coordinator.run_until_idle().await, 1);
    assert_eq!(results(&log), vec![(0, "TRUE".to_string())]);
    assert_eq!(coordinator.client_state(id), Some(ClientState::Idle));
    assert_eq!(selection.subscriber_count(), 1);
}

#[tokio::test]
async fn test_updates_in_one_turn_coalesce_into_one_pass() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (a, log_a) = ProbeClient::new("hist");
    let (b, log_b) = ProbeClient::new("scatter");
    coordinator.connect(Box::new(a), Some(&selection));
    coordinator.connect(Box::new(b), Some(&selection));
    coordinator.run_until_idle().await;

    selection.update("menu", Some(Predicate::eq("weather", "rain")));
    selection.update("menu", Some(Predicate::eq("weather", "sun")));
    selection.update("brush", Some(Predicate::between("temp_max", 0.0, 10.0)));

    assert_eq!(coordinator.dispatch_pending(), 1);
    assert_eq!(coordinator.dispatch_pending(), 0);
    coordinator.run_until_idle().await;

    assert_eq!(selection.version(), 1);
    assert_eq!(coordinator.stats().dispatch_passes, 1);

    let expected = "(\"weather\" = 'sun') AND (\"temp_max\" BETWEEN 0.0 AND 10.0)".to_string();
    assert_eq!(results(&log_a), vec![(0, "TRUE".to_string()), (1, expected.clone())]);
    assert_eq!(results(&log_b), vec![(0, "TRUE".to_string()), (1, expected)]);
}

#[tokio::test]
async fn test_superseded_result_is_never_applied() {
    let gate = Arc::new(Semaphore::new(0));
    let store = Arc::new(MockStore::gated(gate.clone()));
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (client, log) = ProbeClient::new("hist");
    let id = coordinator.connect(Box::new(client), Some(&selection));

    selection.update("menu", Some(Predicate::eq("weather", "rain")));
    assert_eq!(coordinator.dispatch_pending(), 1);
    assert_eq!(coordinator.client_state(id), Some(ClientState::QueryPending { generation: 1 }));
    assert_eq!(coordinator.client_stats(id).map(|s| s.superseded), Some(1));

    gate.add_permits(2);
    assert_eq!(coordinator.run_until_idle().await, 1);

    assert_eq!(results(&log), vec![(1, "\"weather\" = 'rain'".to_string())]);
    assert_eq!(coordinator.stats().stale_dropped, 1);
    assert_eq!(store.executions(), 2);
}

#[tokio::test]
async fn test_late_completion_for_old_generation_is_dropped() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (client, log) = ProbeClient::new("hist");
    let id = coordinator.connect(Box::new(client), Some(&selection));
    coordinator.run_until_idle().await;
    selection.update("menu", Some(Predicate::eq("weather", "rain")));
    coordinator.run_until_idle().await;

    let schema = Arc::new(Schema::new(vec![Field::new("filter", DataType::Utf8, false)]));
    let batch = RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["late"]))]).unwrap();
    let applied = coordinator.apply(QueryCompletion {
        key: "late".to_string(),
        targets: vec![(id, 0), (id, 1)],
        outcome: Ok(batch),
        cached: true,
    });

    assert_eq!(applied, 0);
    assert_eq!(results(&log).len(), 2);
    assert_eq!(coordinator.client_stats(id).map(|s| s.stale_dropped), Some(2));
}

#[tokio::test]
async fn test_build_failure_is_isolated() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (mut broken, broken_log) = ProbeClient::new("broken");
    broken.fail_build = true;
    let (healthy, healthy_log) = ProbeClient::new("healthy");

    let broken_id = coordinator.connect(Box::new(broken), Some(&selection));
    coordinator.connect(Box::new(healthy), Some(&selection));
    coordinator.run_until_idle().await;

    selection.update("menu", Some(Predicate::eq("weather", "fog")));
    coordinator.run_until_idle().await;

    assert_eq!(results(&healthy_log).len(), 2);
    assert_eq!(
        broken_log.lock().as_slice(),
        &[
            Probe::Error(ClientError::Build(QueryBuildError::NotConfigured("broken".to_string()))),
            Probe::Error(ClientError::Build(QueryBuildError::NotConfigured("broken".to_string()))),
        ]
    );
    assert_eq!(coordinator.client_state(broken_id), Some(ClientState::Idle));
    assert_eq!(coordinator.stats().failures, 2);
    assert_eq!(store.executions(), 2);
}

#[tokio::test]
async fn test_execution_failure_keeps_last_result_and_retries_on_next_change() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (client, log) = ProbeClient::new("stat");
    coordinator.connect(Box::new(client), Some(&selection));
    coordinator.run_until_idle().await;

    store.fail.store(true, Ordering::SeqCst);
    selection.update("menu", Some(Predicate::eq("weather", "rain")));
    coordinator.run_until_idle().await;

    store.fail.store(false, Ordering::SeqCst);
    assert_eq!(coordinator.dispatch_pending(), 0);
    assert_eq!(store.executions(), 2);

    selection.update("menu", Some(Predicate::eq("weather", "sun")));
    coordinator.run_until_idle().await;

    let log = log.lock().clone();
    assert_eq!(log.len(), 3);
    assert!(matches!(log[0], Probe::Result { generation: 0, .. }));
    assert!(matches!(
        log[1],
        Probe::Error(ClientError::Execution(QueryExecutionError::Rejected(_)))
    ));
    assert!(matches!(log[2], Probe::Result { generation: 2, .. }));
}

#[tokio::test]
async fn test_timeout_is_reported_as_failure() {
    let store = Arc::new(MockStore { delay: Some(Duration::from_millis(500)), ..MockStore::new() });
    let config = CoordinatorConfig {
        query_timeout: Duration::from_millis(20),
        cache_capacity: 0,
    };
    let mut coordinator = Coordinator::new(store, config, Handle::current());

    let (client, log) = ProbeClient::new("slow");
    coordinator.connect(Box::new(client), None);
    coordinator.run_until_idle().await;

    assert_eq!(
        log.lock().as_slice(),
        &[Probe::Error(ClientError::Execution(QueryExecutionError::Timeout(
            Duration::from_millis(20)
        )))]
    );
}

#[tokio::test]
async fn test_identical_queries_share_one_execution() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (a, log_a) = ProbeClient::new("a");
    let (b, log_b) = ProbeClient::new("b");
    coordinator.connect(Box::new(a.reading("wind")), Some(&selection));
    coordinator.connect(Box::new(b.reading("wind")), Some(&selection));
    coordinator.run_until_idle().await;

    selection.update("menu", Some(Predicate::eq("weather", "rain")));
    coordinator.run_until_idle().await;

    assert_eq!(results(&log_a).len(), 2);
    assert_eq!(results(&log_b).len(), 2);
    // connects issue separately; the pass shares one execution
    assert_eq!(store.executions(), 3);
    assert_eq!(coordinator.stats().deduplicated, 1);

    selection.update("menu", None);
    coordinator.run_until_idle().await;
    assert_eq!(store.executions(), 3);
    assert_eq!(coordinator.stats().deduplicated, 2);
    assert_eq!(coordinator.stats().cache_hits, 1);
    assert_eq!(results(&log_b).last(), Some(&(2, "TRUE".to_string())));
}

#[tokio::test]
async fn test_repeated_filter_is_served_from_cache() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (client, log) = ProbeClient::new("hist");
    coordinator.connect(Box::new(client), Some(&selection));
    coordinator.run_until_idle().await;

    selection.update("menu", Some(Predicate::eq("weather", "rain")));
    coordinator.run_until_idle().await;
    selection.update("menu", None);
    coordinator.run_until_idle().await;

    assert_eq!(store.executions(), 2);
    assert_eq!(coordinator.stats().cache_hits, 1);
    assert_eq!(coordinator.cached_results(), 2);
    assert_eq!(results(&log).last(), Some(&(2, "TRUE".to_string())));
}

#[tokio::test]
async fn test_disconnected_client_never_receives_result() {
    let gate = Arc::new(Semaphore::new(0));
    let store = Arc::new(MockStore::gated(gate.clone()));
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (client, log) = ProbeClient::new("hist");
    let id = coordinator.connect(Box::new(client), Some(&selection));
    assert!(coordinator.disconnect(id));
    assert!(!coordinator.disconnect(id));

    gate.add_permits(1);
    coordinator.run_until_idle().await;
    assert!(log.lock().is_empty());
    assert_eq!(coordinator.stats().stale_dropped, 1);

    selection.update("menu", Some(Predicate::eq("weather", "rain")));
    assert_eq!(coordinator.dispatch_pending(), 1);
    assert_eq!(coordinator.in_flight(), 0);
    assert_eq!(store.executions(), 1);
}

#[tokio::test]
async fn test_independent_selections_do_not_cross_notify() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let x = coordinator.intersect();
    let y = coordinator.intersect();

    let (a, log_a) = ProbeClient::new("a");
    let (b, log_b) = ProbeClient::new("b");
    coordinator.connect(Box::new(a), Some(&x));
    let b_id = coordinator.connect(Box::new(b), Some(&y));
    coordinator.run_until_idle().await;

    x.update("menu", Some(Predicate::eq("weather", "rain")));
    assert_eq!(coordinator.dispatch_pending(), 1);
    coordinator.run_until_idle().await;

    assert_eq!(results(&log_a).len(), 2);
    assert_eq!(results(&log_b).len(), 1);
    assert_eq!(coordinator.client_stats(b_id).map(|s| s.issued), Some(1));
    assert_eq!(y.version(), 0);
}

#[tokio::test]
async fn test_source_client_excludes_own_clause() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (menu, menu_log) = ProbeClient::new("menu");
    let (hist, hist_log) = ProbeClient::new("hist");
    let menu_id = coordinator.connect(Box::new(menu.producing("menu", true)), Some(&selection));
    coordinator.connect(Box::new(hist), Some(&selection));
    coordinator.run_until_idle().await;

    selection.update("menu", Some(Predicate::eq("weather", "rain")));
    coordinator.run_until_idle().await;

    assert_eq!(results(&menu_log).last().map(|r| r.1.as_str()), Some("TRUE"));
    assert_eq!(results(&hist_log).last().map(|r| r.1.as_str()), Some("\"weather\" = 'rain'"));
    let request = coordinator.last_request(menu_id).unwrap();
    assert_eq!(request.generation, 1);
    assert!(request.predicate_snapshot.is_true());
}

#[tokio::test]
async fn test_connect_during_pending_turn_waits_for_pass() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();
    selection.update("menu", Some(Predicate::eq("weather", "rain")));

    let (client, log) = ProbeClient::new("hist");
    let id = coordinator.connect(Box::new(client), Some(&selection));
    assert_eq!(coordinator.client_state(id), Some(ClientState::Idle));
    assert_eq!(coordinator.in_flight(), 0);

    coordinator.run_until_idle().await;
    assert_eq!(results(&log), vec![(1, "\"weather\" = 'rain'".to_string())]);
}

#[tokio::test]
async fn test_selection_changed_before_first_connect_is_dispatched() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = Arc::new(Selection::intersect());
    selection.update("menu", Some(Predicate::eq("weather", "rain")));

    let (client, log) = ProbeClient::new("hist");
    coordinator.connect(Box::new(client), Some(&selection));
    coordinator.run_until_idle().await;

    assert_eq!(results(&log), vec![(1, "\"weather\" = 'rain'".to_string())]);
    assert!(!selection.is_dirty());

    selection.update("menu", Some(Predicate::eq("weather", "sun")));
    assert_eq!(coordinator.dispatch_pending(), 1);
    coordinator.run_until_idle().await;
    assert_eq!(results(&log).last(), Some(&(2, "\"weather\" = 'sun'".to_string())));
}

#[tokio::test]
async fn test_selection_shared_by_two_coordinators_reaches_both() {
    let store = Arc::new(MockStore::new());
    let mut first = coordinator(store.clone());
    let mut second = coordinator(store.clone());
    let selection = first.intersect();

    let (a, log_a) = ProbeClient::new("a");
    let (b, log_b) = ProbeClient::new("b");
    first.connect(Box::new(a), Some(&selection));
    second.connect(Box::new(b), Some(&selection));
    first.run_until_idle().await;
    second.run_until_idle().await;

    selection.update("menu", Some(Predicate::eq("weather", "rain")));
    assert_eq!(first.dispatch_pending(), 1);
    assert_eq!(second.dispatch_pending(), 1);
    first.run_until_idle().await;
    second.run_until_idle().await;

    let rain = (1, "\"weather\" = 'rain'".to_string());
    assert_eq!(results(&log_a).last(), Some(&rain));
    assert_eq!(results(&log_b).last(), Some(&rain));

    // the next turn still bumps and notifies
    selection.update("menu", None);
    assert_eq!(selection.version(), 2);
    assert_eq!(second.dispatch_pending(), 1);
}

#[tokio::test]
async fn test_tick_applies_one_completion() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());

    let (client, log) = ProbeClient::new("stat");
    coordinator.connect(Box::new(client), None);

    assert!(coordinator.tick().await);
    assert!(!coordinator.tick().await);
    assert_eq!(results(&log).len(), 1);
}

#[tokio::test]
async fn test_shutdown_unsubscribes_all_clients() {
    let store = Arc::new(MockStore::new());
    let mut coordinator = coordinator(store.clone());
    let selection = coordinator.intersect();

    let (a, _) = ProbeClient::new("a");
    let (b, _) = ProbeClient::new("b");
    coordinator.connect(Box::new(a), Some(&selection));
    coordinator.connect(Box::new(b), None);
    coordinator.run_until_idle().await;

    assert_eq!(coordinator.shutdown(), 2);
    assert_eq!(coordinator.client_count(), 0);

    selection.update("menu", Some(Predicate::eq("weather", "rain")));
    assert_eq!(coordinator.dispatch_pending(), 0);
}
