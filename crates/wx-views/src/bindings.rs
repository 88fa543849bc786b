//! Widget-to-selection wiring
//!
//! Bindings are what UI event handlers hold. They build a widget's clause and
//! write it into the shared selection under the widget's source id.

use std::sync::Arc;
use tracing::debug;
use wx_core::{Predicate, Selection, SourceId};

/// Writes a menu choice into a selection
#[derive(Debug, Clone)]
pub struct MenuBinding {
    selection: Arc<Selection>,
    source: SourceId,
    column: String,
}

impl MenuBinding {
    pub fn new(selection: Arc<Selection>, source: impl Into<SourceId>, column: impl Into<String>) -> Self {
        Self {
            selection,
            source: source.into(),
            column: column.into(),
        }
    }

    /// `column = value` for a chosen option
    pub fn clause(&self, value: &str) -> Predicate {
        Predicate::eq(self.column.clone(), value)
    }

    /// Select one option; returns whether the selection changed
    pub fn select(&self, value: &str) -> bool {
        debug!(source = %self.source, value, "menu select");
        self.selection.update(self.source.clone(), Some(self.clause(value)))
    }

    /// Back to "all"
    pub fn clear(&self) -> bool {
        debug!(source = %self.source, "menu cleared");
        self.selection.update(self.source.clone(), None)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Writes an x-interval brush into a selection
#[derive(Debug, Clone)]
pub struct IntervalBinding {
    selection: Arc<Selection>,
    source: SourceId,
    column: String,
}

impl IntervalBinding {
    pub fn new(selection: Arc<Selection>, source: impl Into<SourceId>, column: impl Into<String>) -> Self {
        Self {
            selection,
            source: source.into(),
            column: column.into(),
        }
    }

    /// Closed interval over the bound column; the ends may come in either order
    pub fn clause(&self, a: f64, b: f64) -> Predicate {
        interval_clause(&self.column, a, b)
    }

    pub fn brush(&self, a: f64, b: f64) -> bool {
        debug!(source = %self.source, a, b, "brush moved");
        self.selection.update(self.source.clone(), Some(self.clause(a, b)))
    }

    pub fn clear(&self) -> bool {
        debug!(source = %self.source, "brush cleared");
        self.selection.update(self.source.clone(), None)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

pub(crate) fn interval_clause(column: &str, a: f64, b: f64) -> Predicate {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    Predicate::between(column, low, high)
}
