//! Shared selections built from per-source clauses

use std::sync::{Arc, Weak};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use tracing::debug;
use uuid::Uuid;

use crate::predicate::Predicate;

mod clause;
mod subscriber;

pub use clause::{Clause, SourceId};
pub use subscriber::SelectionSubscriber;

/// Selection identifier type
pub type SelectionId = Uuid;

/// How clause predicates are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineMode {
    /// All clauses must hold
    Intersect,
    /// Any clause may hold
    Union,
}

/// Clause map and versioning, replaced as a whole under one lock
#[derive(Debug, Default)]
struct SelectionState {
    clauses: IndexMap<SourceId, Clause>,
    version: u64,
    /// Changed since the coordinator last took a dispatch turn
    dirty: bool,
}

/// A shared filter made of at most one clause per source
pub struct Selection {
    id: SelectionId,
    mode: CombineMode,
    cross: bool,
    state: RwLock<SelectionState>,
    subscribers: RwLock<Vec<Weak<dyn SelectionSubscriber>>>,
}

impl Selection {
    /// Create a new selection
    pub fn new(mode: CombineMode, cross: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            cross,
            state: RwLock::new(SelectionState::default()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn intersect() -> Self {
        Self::new(CombineMode::Intersect, false)
    }

    pub fn union() -> Self {
        Self::new(CombineMode::Union, false)
    }

    /// Intersecting selection where every source ignores its own clause
    pub fn crossfilter() -> Self {
        Self::new(CombineMode::Intersect, true)
    }

    pub fn id(&self) -> SelectionId {
        self.id
    }

    pub fn mode(&self) -> CombineMode {
        self.mode
    }

    pub fn is_cross(&self) -> bool {
        self.cross
    }

    /// Current version; bumped at most once per dispatch turn
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().clauses.is_empty()
    }

    /// Whether a change is waiting for the next dispatch turn
    pub fn is_dirty(&self) -> bool {
        self.state.read().dirty
    }

    /// Snapshot of the active clauses in insertion order
    pub fn clauses(&self) -> Vec<Clause> {
        self.state.read().clauses.values().cloned().collect()
    }

    /// The active clause for a source, if any
    pub fn clause(&self, source: &str) -> Option<Clause> {
        self.state.read().clauses.get(source).cloned()
    }

    /// Set or clear the clause for `source`
    ///
    /// `None` (or a `True` predicate) removes the clause. Returns whether the
    /// clause map changed; unchanged updates neither bump the version nor
    /// notify subscribers.
    pub fn update(&self, source: impl Into<SourceId>, predicate: Option<Predicate>) -> bool {
        let source = source.into();
        let predicate = predicate.filter(|p| !p.is_true());

        let bumped = {
            let mut state = self.state.write();
            let changed = match predicate {
                Some(predicate) => {
                    let unchanged = state
                        .clauses
                        .get(&source)
                        .map(|existing| existing.predicate == predicate)
                        .unwrap_or(false);
                    if !unchanged {
                        state.clauses.insert(source.clone(), Clause::new(source.clone(), predicate));
                    }
                    !unchanged
                }
                None => state.clauses.shift_remove(&source).is_some(),
            };

            if !changed {
                return false;
            }

            if state.dirty {
                None
            } else {
                state.dirty = true;
                state.version += 1;
                Some(state.version)
            }
        };

        debug!(selection = %self.id, source = %source, "selection clause updated");

        if let Some(version) = bumped {
            self.notify_subscribers(version);
        }
        true
    }

    /// Combined predicate over every clause whose source is not excluded
    pub fn resolve(&self, excluding: &[&str]) -> Predicate {
        let state = self.state.read();
        let parts = state
            .clauses
            .values()
            .filter(|clause| !excluding.contains(&clause.source.as_str()))
            .map(|clause| clause.predicate.clone());

        match self.mode {
            CombineMode::Intersect => Predicate::and(parts),
            CombineMode::Union => Predicate::or(parts),
        }
    }

    /// The predicate a client producing `source` should query against
    pub fn resolve_for(&self, source: Option<&str>, self_exclusion: bool) -> Predicate {
        match source {
            Some(source) if self.cross || self_exclusion => self.resolve(&[source]),
            _ => self.resolve(&[]),
        }
    }

    /// End the current turn, returning the version to dispatch at if dirty
    pub fn take_pending(&self) -> Option<u64> {
        let mut state = self.state.write();
        if state.dirty {
            state.dirty = false;
            Some(state.version)
        } else {
            None
        }
    }

    /// Add a subscriber
    pub fn add_subscriber(&self, subscriber: Arc<dyn SelectionSubscriber>) {
        let mut subscribers = self.subscribers.write();
        subscribers.push(Arc::downgrade(&subscriber));
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Notify all subscribers of a version bump
    fn notify_subscribers(&self, version: u64) {
        let live: Vec<Arc<dyn SelectionSubscriber>> = {
            let mut subscribers = self.subscribers.write();

            // Remove any dead weak references
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };

        for subscriber in live {
            subscriber.on_selection_change(self.id, version);
        }
    }
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Selection")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("cross", &self.cross)
            .field("version", &state.version)
            .field("clauses", &state.clauses.len())
            .finish()
    }
}
