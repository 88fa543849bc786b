//! Render adapters

use std::io::Write;
use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use serde_json::json;
use tracing::warn;

/// One histogram bar, `[start, end)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
}

/// Everything a widget can ask to have drawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetOutput {
    Options { values: Vec<String> },
    Histogram { bins: Vec<HistogramBin> },
    Scatter { points: Vec<ScatterPoint> },
    Stat { label: String, value: Option<f64> },
}

/// Receives widget output; what it does with it is up to the adapter
pub trait RenderAdapter: Send + Sync {
    fn render(&self, widget: &str, output: &WidgetOutput);

    /// The widget's query failed; its last output is still current but stale
    fn mark_stale(&self, _widget: &str, _reason: &str) {}
}

/// Latest state of one widget as seen by [`RecordingAdapter`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedWidget {
    pub output: Option<WidgetOutput>,
    pub renders: usize,
    /// Set by `mark_stale`, cleared by the next render
    pub stale: Option<String>,
}

/// Keeps the latest output per widget
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    widgets: Mutex<AHashMap<String, RecordedWidget>>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn widget(&self, widget: &str) -> Option<RecordedWidget> {
        self.widgets.lock().get(widget).cloned()
    }

    pub fn latest(&self, widget: &str) -> Option<WidgetOutput> {
        self.widgets.lock().get(widget).and_then(|w| w.output.clone())
    }

    pub fn render_count(&self, widget: &str) -> usize {
        self.widgets.lock().get(widget).map_or(0, |w| w.renders)
    }

    /// Widget names in sorted order
    pub fn widget_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.widgets.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl RenderAdapter for RecordingAdapter {
    fn render(&self, widget: &str, output: &WidgetOutput) {
        let mut widgets = self.widgets.lock();
        let entry = widgets.entry(widget.to_string()).or_default();
        entry.output = Some(output.clone());
        entry.renders += 1;
        entry.stale = None;
    }

    fn mark_stale(&self, widget: &str, reason: &str) {
        self.widgets
            .lock()
            .entry(widget.to_string())
            .or_default()
            .stale = Some(reason.to_string());
    }
}

/// Writes every render as one JSON object per line
pub struct JsonLinesAdapter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesAdapter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_line(&self, line: serde_json::Value) {
        let mut writer = self.writer.lock();
        let result = serde_json::to_writer(&mut *writer, &line)
            .map_err(std::io::Error::from)
            .and_then(|()| {
                writeln!(writer)?;
                writer.flush()
            });
        if let Err(e) = result {
            warn!("failed to write render output: {}", e);
        }
    }
}

impl<W: Write + Send> RenderAdapter for JsonLinesAdapter<W> {
    fn render(&self, widget: &str, output: &WidgetOutput) {
        self.write_line(json!({ "widget": widget, "output": output }));
    }

    fn mark_stale(&self, widget: &str, reason: &str) {
        self.write_line(json!({ "widget": widget, "stale": reason }));
    }
}
