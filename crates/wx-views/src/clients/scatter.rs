//! Dot plot of two numeric columns with an optional x-interval brush

use std::sync::Arc;
use serde::{Serialize, Deserialize};
use wx_core::{Client, ClientError, Predicate, Projection, QueryBuildError, QueryResult, QuerySpec, Selection};

use super::{report_bad_result, report_failure};
use crate::bindings::{interval_clause, IntervalBinding};
use crate::columns::f64_values;
use crate::render::{RenderAdapter, ScatterPoint, WidgetOutput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    pub table: String,
    pub x: String,
    pub y: String,
    /// Source id of the brush clause, if the plot has a brush
    pub brush_source: Option<String>,
    /// Keep showing points outside the plot's own brush
    pub self_exclusion: bool,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            table: "weather".to_string(),
            x: "temp_max".to_string(),
            y: "wind".to_string(),
            brush_source: Some("brush".to_string()),
            self_exclusion: false,
        }
    }
}

pub struct ScatterClient {
    name: String,
    config: ScatterConfig,
    adapter: Arc<dyn RenderAdapter>,
    points: Vec<ScatterPoint>,
}

impl ScatterClient {
    pub fn new(name: impl Into<String>, config: ScatterConfig, adapter: Arc<dyn RenderAdapter>) -> Self {
        Self {
            name: name.into(),
            config,
            adapter,
            points: Vec::new(),
        }
    }

    /// Brush predicate over the x column
    pub fn brush_clause(&self, a: f64, b: f64) -> Predicate {
        interval_clause(&self.config.x, a, b)
    }

    /// Brush handle for UI events, if the plot has a brush
    pub fn binding(&self, selection: Arc<Selection>) -> Option<IntervalBinding> {
        let source = self.config.brush_source.clone()?;
        Some(IntervalBinding::new(selection, source, self.config.x.clone()))
    }

    pub fn points(&self) -> &[ScatterPoint] {
        &self.points
    }
}

impl Client for ScatterClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> Option<&str> {
        self.config.brush_source.as_deref()
    }

    fn self_exclusion(&self) -> bool {
        self.config.self_exclusion
    }

    fn build_query(&self, filter: &Predicate) -> Result<QuerySpec, QueryBuildError> {
        let ScatterConfig { table, x, y, .. } = &self.config;
        if x.is_empty() || y.is_empty() {
            return Err(QueryBuildError::NotConfigured(format!("{}: x and y are required", self.name)));
        }

        Ok(QuerySpec::from_table(table.clone())
            .select(Projection::column(x.clone()))
            .select(Projection::column(y.clone()))
            .filter(filter.clone())
            .filter(Predicate::is_not_null(x.clone()))
            .filter(Predicate::is_not_null(y.clone())))
    }

    fn on_result(&mut self, result: &QueryResult) {
        let columns = f64_values(&result.batch, &self.config.x)
            .and_then(|xs| Ok((xs, f64_values(&result.batch, &self.config.y)?)));

        match columns {
            Ok((xs, ys)) => {
                self.points = xs
                    .into_iter()
                    .zip(ys)
                    .filter_map(|(x, y)| Some(ScatterPoint { x: x?, y: y? }))
                    .collect();
                self.adapter.render(&self.name, &WidgetOutput::Scatter { points: self.points.clone() });
            }
            Err(e) => report_bad_result(self.adapter.as_ref(), &self.name, &e),
        }
    }

    fn on_error(&mut self, error: &ClientError) {
        report_failure(self.adapter.as_ref(), &self.name, error);
    }
}
