use std::collections::BTreeSet;

use crate::predicate::Predicate;

/// Identifier of a clause producer, such as a menu or a brush
pub type SourceId = String;

/// A replaceable predicate fragment contributed by one source
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub source: SourceId,
    pub predicate: Predicate,
    /// Columns the predicate constrains
    pub columns: BTreeSet<String>,
}

impl Clause {
    pub fn new(source: impl Into<SourceId>, predicate: Predicate) -> Self {
        let columns = predicate.columns();
        Self {
            source: source.into(),
            predicate,
            columns,
        }
    }
}
