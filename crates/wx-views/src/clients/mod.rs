//! Query-bound widgets

mod histogram;
mod menu;
mod scatter;
mod stat;

pub use histogram::{HistogramClient, HistogramConfig};
pub use menu::{MenuClient, MenuConfig};
pub use scatter::{ScatterClient, ScatterConfig};
pub use stat::{StatClient, StatConfig};

use tracing::warn;
use wx_core::ClientError;

use crate::columns::ColumnError;
use crate::render::RenderAdapter;

/// Log a failed generation and flag the widget's output as stale
fn report_failure(adapter: &dyn RenderAdapter, widget: &str, error: &ClientError) {
    warn!(widget, %error, "widget output is stale");
    adapter.mark_stale(widget, &error.to_string());
}

/// A result arrived in a shape the widget cannot read
fn report_bad_result(adapter: &dyn RenderAdapter, widget: &str, error: &ColumnError) {
    warn!(widget, %error, "unreadable query result");
    adapter.mark_stale(widget, &error.to_string());
}
