//! Selection subscriber trait

use super::SelectionId;

/// Trait for components that need to respond to selection changes
pub trait SelectionSubscriber: Send + Sync {
    /// Called once per turn, when the selection first changes after a dispatch
    fn on_selection_change(&self, selection: SelectionId, version: u64);
}
