//! Dashboard widgets
//!
//! Each widget is a [`wx_core::Client`] that turns its query results into a
//! [`WidgetOutput`] for a [`RenderAdapter`]. Widgets that produce filters
//! hand out bindings that write clauses into their selection.

mod bindings;
mod columns;
pub mod clients;
pub mod render;

pub use bindings::{IntervalBinding, MenuBinding};
pub use clients::{
    HistogramClient, HistogramConfig, MenuClient, MenuConfig, ScatterClient, ScatterConfig,
    StatClient, StatConfig,
};
pub use columns::ColumnError;
pub use render::{
    HistogramBin, JsonLinesAdapter, RecordingAdapter, RenderAdapter, ScatterPoint, WidgetOutput,
};
