//! Reactive coordinator
//!
//! The coordinator owns the selection → client subscription graph. Each
//! dispatch turn it drains selection change notifications, runs one pass per
//! changed selection, and issues every subscribed client's query at the
//! selection's new version. Results come back over a channel and are applied
//! only if the client is still waiting on that exact generation, so a newer
//! pass logically cancels older in-flight queries.
//!
//! All coordinator state and client callbacks are confined to `&mut self`
//! methods; only store execution runs on other tasks.

mod cache;

use std::sync::{Arc, Weak};
use std::time::Duration;
use ahash::AHashMap;
use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::client::{Client, ClientId, ClientState};
use crate::error::{ClientError, QueryExecutionError};
use crate::predicate::Predicate;
use crate::query::{QueryRequest, QueryResult, QuerySpec};
use crate::selection::{CombineMode, Selection, SelectionId, SelectionSubscriber};
use crate::store::TabularStore;
use cache::QueryCache;

/// Coordinator tuning
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Queries running longer than this are treated as failed
    pub query_timeout: Duration,

    /// Number of query results kept in the LRU cache; 0 disables it
    pub cache_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(30),
            cache_capacity: 64,
        }
    }
}

/// Session-wide dispatch counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub dispatch_passes: u64,
    /// Client queries issued, before deduplication
    pub queries_issued: u64,
    pub store_executions: u64,
    pub cache_hits: u64,
    /// Client queries that shared another client's execution
    pub deduplicated: u64,
    pub results_applied: u64,
    pub stale_dropped: u64,
    pub failures: u64,
}

/// Per-client dispatch counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub issued: u64,
    pub applied: u64,
    pub superseded: u64,
    pub stale_dropped: u64,
    pub failed: u64,
}

/// Forwards selection bumps into the coordinator's change queue
struct ChangeNotifier {
    tx: mpsc::UnboundedSender<SelectionId>,
}

impl SelectionSubscriber for ChangeNotifier {
    fn on_selection_change(&self, selection: SelectionId, version: u64) {
        trace!(selection = %selection, version, "selection change queued");
        let _ = self.tx.send(selection);
    }
}

struct ClientSlot {
    client: Box<dyn Client>,
    /// Non-owning; the coordinator holds the selection itself
    selection: Option<Weak<Selection>>,
    state: ClientState,
    generation: u64,
    last_request: Option<QueryRequest>,
    stats: ClientStats,
}

/// A finished store execution, fanned out to every client that asked for it
pub struct QueryCompletion {
    key: String,
    targets: Vec<(ClientId, u64)>,
    outcome: Result<RecordBatch, QueryExecutionError>,
    cached: bool,
}

struct PlannedQuery {
    client: ClientId,
    generation: u64,
    filter: Predicate,
    spec: QuerySpec,
}

/// The central reactive scheduler for one dashboard session
pub struct Coordinator {
    store: Arc<dyn TabularStore>,
    config: CoordinatorConfig,
    runtime: Handle,
    selections: AHashMap<SelectionId, Arc<Selection>>,
    subscriptions: AHashMap<SelectionId, Vec<ClientId>>,
    /// Last version each selection was dispatched at by this coordinator
    dispatched: AHashMap<SelectionId, u64>,
    clients: IndexMap<ClientId, ClientSlot>,
    notifier: Arc<ChangeNotifier>,
    changes: mpsc::UnboundedReceiver<SelectionId>,
    completion_tx: mpsc::UnboundedSender<QueryCompletion>,
    completion_rx: mpsc::UnboundedReceiver<QueryCompletion>,
    cache: QueryCache,
    in_flight: usize,
    stats: CoordinatorStats,
}

impl Coordinator {
    /// Start a session against a loaded store
    ///
    /// Store queries are spawned on `runtime`.
    pub fn new(store: Arc<dyn TabularStore>, config: CoordinatorConfig, runtime: Handle) -> Self {
        let (change_tx, changes) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        info!(
            store = store.store_name(),
            timeout = ?config.query_timeout,
            cache_capacity = config.cache_capacity,
            "coordinator started"
        );

        Self {
            store,
            cache: QueryCache::new(config.cache_capacity),
            config,
            runtime,
            selections: AHashMap::new(),
            subscriptions: AHashMap::new(),
            dispatched: AHashMap::new(),
            clients: IndexMap::new(),
            notifier: Arc::new(ChangeNotifier { tx: change_tx }),
            changes,
            completion_tx,
            completion_rx,
            in_flight: 0,
            stats: CoordinatorStats::default(),
        }
    }

    /// Create a selection owned by this session
    pub fn selection(&mut self, mode: CombineMode, cross: bool) -> Arc<Selection> {
        let selection = Arc::new(Selection::new(mode, cross));
        self.register_selection(&selection);
        selection
    }

    pub fn intersect(&mut self) -> Arc<Selection> {
        self.selection(CombineMode::Intersect, false)
    }

    pub fn union(&mut self) -> Arc<Selection> {
        self.selection(CombineMode::Union, false)
    }

    pub fn crossfilter(&mut self) -> Arc<Selection> {
        self.selection(CombineMode::Intersect, true)
    }

    fn register_selection(&mut self, selection: &Arc<Selection>) {
        if self.selections.contains_key(&selection.id()) {
            return;
        }
        selection.add_subscriber(self.notifier.clone());
        self.selections.insert(selection.id(), selection.clone());

        // a change made before registration never reached our queue
        if selection.is_dirty() {
            self.queue_pass(selection.id());
        } else {
            self.dispatched.insert(selection.id(), selection.version());
        }
    }

    fn queue_pass(&self, selection: SelectionId) {
        let _ = self.notifier.tx.send(selection);
    }

    /// Whether this coordinator still owes the selection a dispatch pass
    fn pass_pending(&self, selection: &Selection) -> bool {
        selection.is_dirty() || self.dispatched.get(&selection.id()).copied() != Some(selection.version())
    }

    /// Subscribe a client and issue its first query
    ///
    /// If the selection already has a change waiting for the next turn, the
    /// first query is issued by that turn's dispatch pass instead.
    pub fn connect(&mut self, client: Box<dyn Client>, selection: Option<&Arc<Selection>>) -> ClientId {
        let id = Uuid::new_v4();
        let name = client.name().to_string();

        self.clients.insert(
            id,
            ClientSlot {
                client,
                selection: selection.map(Arc::downgrade),
                state: ClientState::Idle,
                generation: 0,
                last_request: None,
                stats: ClientStats::default(),
            },
        );

        let generation = match selection {
            Some(selection) => {
                self.register_selection(selection);
                self.subscriptions.entry(selection.id()).or_default().push(id);
                info!(client = %name, selection = %selection.id(), "client connected");

                if self.pass_pending(selection) {
                    debug!(client = %name, "first query deferred to pending dispatch pass");
                    self.queue_pass(selection.id());
                    return id;
                }
                selection.version()
            }
            None => {
                info!(client = %name, "client connected without selection");
                0
            }
        };

        let planned = self.plan(id, generation);
        self.issue(planned.into_iter().collect());
        id
    }

    /// Unsubscribe a client; its in-flight result is dropped on arrival
    pub fn disconnect(&mut self, id: ClientId) -> bool {
        let Some(slot) = self.clients.shift_remove(&id) else {
            return false;
        };

        if let Some(selection) = slot.selection.as_ref().and_then(Weak::upgrade) {
            if let Some(ids) = self.subscriptions.get_mut(&selection.id()) {
                ids.retain(|client| *client != id);
            }
        }

        info!(client = %slot.client.name(), "client disconnected");
        true
    }

    /// Tear down the session, unsubscribing every client
    pub fn shutdown(&mut self) -> usize {
        let ids: Vec<ClientId> = self.clients.keys().copied().collect();
        let count = ids.iter().filter(|id| self.disconnect(**id)).count();

        self.subscriptions.clear();
        self.selections.clear();
        self.dispatched.clear();
        info!(clients = count, "session closed");
        count
    }

    /// End the current turn: one dispatch pass per changed selection
    ///
    /// Returns the number of passes run.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut changed: Vec<SelectionId> = Vec::new();
        while let Ok(id) = self.changes.try_recv() {
            if !changed.contains(&id) {
                changed.push(id);
            }
        }

        let mut passes = 0;
        for selection_id in changed {
            let Some(selection) = self.selections.get(&selection_id).cloned() else {
                continue;
            };
            // another coordinator sharing the selection may have ended the turn
            selection.take_pending();
            let version = selection.version();
            if self.dispatched.get(&selection_id) == Some(&version) {
                continue;
            }
            self.dispatched.insert(selection_id, version);
            self.dispatch_pass(&selection, version);
            passes += 1;
        }
        passes
    }

    fn dispatch_pass(&mut self, selection: &Selection, version: u64) {
        self.stats.dispatch_passes += 1;

        let client_ids = self
            .subscriptions
            .get(&selection.id())
            .cloned()
            .unwrap_or_default();

        info!(
            selection = %selection.id(),
            version,
            clients = client_ids.len(),
            filter = %selection.resolve(&[]),
            "dispatch pass"
        );

        let planned: Vec<PlannedQuery> = client_ids
            .into_iter()
            .filter_map(|id| self.plan(id, version))
            .collect();
        self.issue(planned);
    }

    /// Resolve the client's filter and build its query for `generation`
    fn plan(&mut self, id: ClientId, generation: u64) -> Option<PlannedQuery> {
        let slot = self.clients.get_mut(&id)?;

        if let ClientState::QueryPending { generation: pending } = slot.state {
            if pending < generation {
                slot.state = ClientState::Superseded { generation: pending };
                slot.stats.superseded += 1;
                trace!(client = %slot.client.name(), pending, generation, "pending query superseded");
            }
        }

        let filter = match slot.selection.as_ref().and_then(Weak::upgrade) {
            Some(selection) => selection.resolve_for(slot.client.source(), slot.client.self_exclusion()),
            None => Predicate::True,
        };

        let built = slot
            .client
            .build_query(&filter)
            .and_then(|spec| spec.validate().map(|()| spec));

        match built {
            Ok(spec) => Some(PlannedQuery { client: id, generation, filter, spec }),
            Err(error) => {
                warn!(client = %slot.client.name(), generation, %error, "query build failed, skipping dispatch");
                slot.state = ClientState::Idle;
                slot.generation = generation;
                slot.stats.failed += 1;
                self.stats.failures += 1;
                slot.client.on_error(&ClientError::Build(error));
                None
            }
        }
    }

    /// Mark clients pending and start one execution per distinct statement
    fn issue(&mut self, planned: Vec<PlannedQuery>) {
        let mut groups: IndexMap<String, (QuerySpec, Vec<(ClientId, u64)>)> = IndexMap::new();

        for query in planned {
            let key = query.spec.to_sql().cache_key();

            if let Some(slot) = self.clients.get_mut(&query.client) {
                debug!(
                    client = %slot.client.name(),
                    generation = query.generation,
                    filter = %query.filter,
                    "query issued"
                );
                slot.state = ClientState::QueryPending { generation: query.generation };
                slot.generation = query.generation;
                slot.stats.issued += 1;
                slot.last_request = Some(QueryRequest {
                    client_id: query.client,
                    predicate_snapshot: query.filter,
                    generation: query.generation,
                    spec: query.spec.clone(),
                });
            }
            self.stats.queries_issued += 1;

            groups
                .entry(key)
                .or_insert_with(|| (query.spec, Vec::new()))
                .1
                .push((query.client, query.generation));
        }

        for (key, (spec, targets)) in groups {
            self.stats.deduplicated += targets.len().saturating_sub(1) as u64;
            self.in_flight += 1;

            if let Some(batch) = self.cache.get(&key) {
                self.stats.cache_hits += 1;
                trace!(clients = targets.len(), "query answered from cache");
                let _ = self.completion_tx.send(QueryCompletion {
                    key,
                    targets,
                    outcome: Ok(batch),
                    cached: true,
                });
                continue;
            }

            self.stats.store_executions += 1;
            let store = self.store.clone();
            let tx = self.completion_tx.clone();
            let timeout = self.config.query_timeout;

            self.runtime.spawn(async move {
                // The execution keeps running past a timeout; its result is simply not waited for
                let execution = tokio::spawn(async move { store.execute(&spec).await });
                let outcome = match tokio::time::timeout(timeout, execution).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(join_error)) => Err(QueryExecutionError::Worker(join_error.to_string())),
                    Err(_) => Err(QueryExecutionError::Timeout(timeout)),
                };
                let _ = tx.send(QueryCompletion { key, targets, outcome, cached: false });
            });
        }
    }

    /// Apply a finished execution to the clients still waiting on it
    ///
    /// Returns the number of results handed to `on_result`.
    pub fn apply(&mut self, completion: QueryCompletion) -> usize {
        self.in_flight = self.in_flight.saturating_sub(1);

        let QueryCompletion { key, targets, outcome, cached } = completion;
        if let (Ok(batch), false) = (&outcome, cached) {
            self.cache.put(key, batch.clone());
        }

        let mut applied = 0;
        for (id, generation) in targets {
            let Some(slot) = self.clients.get_mut(&id) else {
                trace!(client = %id, generation, "result for disconnected client dropped");
                self.stats.stale_dropped += 1;
                continue;
            };

            if slot.state != (ClientState::QueryPending { generation }) {
                trace!(
                    client = %slot.client.name(),
                    generation,
                    current = slot.generation,
                    "stale result dropped"
                );
                slot.stats.stale_dropped += 1;
                self.stats.stale_dropped += 1;
                continue;
            }

            match &outcome {
                Ok(batch) => {
                    slot.state = ClientState::ApplyingResult { generation };
                    let result = QueryResult { generation, batch: batch.clone() };
                    slot.client.on_result(&result);
                    slot.state = ClientState::Idle;
                    slot.stats.applied += 1;
                    self.stats.results_applied += 1;
                    applied += 1;
                }
                Err(error) => {
                    warn!(client = %slot.client.name(), generation, %error, "query failed, keeping last result");
                    slot.state = ClientState::Idle;
                    slot.stats.failed += 1;
                    self.stats.failures += 1;
                    slot.client.on_error(&ClientError::Execution(error.clone()));
                }
            }
        }
        applied
    }

    /// Run one turn and apply at most one completion
    ///
    /// Returns false when nothing was in flight.
    pub async fn tick(&mut self) -> bool {
        self.dispatch_pending();
        if self.in_flight == 0 {
            return false;
        }
        match self.completion_rx.recv().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    /// Dispatch and apply until no change is pending and nothing is in flight
    ///
    /// Returns the number of results applied.
    pub async fn run_until_idle(&mut self) -> usize {
        let mut applied = 0;
        loop {
            self.dispatch_pending();
            if self.in_flight == 0 {
                break;
            }
            match self.completion_rx.recv().await {
                Some(completion) => applied += self.apply(completion),
                None => break,
            }
        }
        applied
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    pub fn client_stats(&self, id: ClientId) -> Option<&ClientStats> {
        self.clients.get(&id).map(|slot| &slot.stats)
    }

    pub fn client_state(&self, id: ClientId) -> Option<ClientState> {
        self.clients.get(&id).map(|slot| slot.state)
    }

    /// The most recent query issued for a client
    pub fn last_request(&self, id: ClientId) -> Option<&QueryRequest> {
        self.clients.get(&id).and_then(|slot| slot.last_request.as_ref())
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Distinct store executions currently outstanding
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests;
