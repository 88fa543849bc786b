//! Fixed-width histogram

use std::sync::Arc;
use serde::{Serialize, Deserialize};
use wx_core::{Client, ClientError, Predicate, Projection, QueryBuildError, QueryResult, QuerySpec};

use super::{report_bad_result, report_failure};
use crate::columns::f64_values;
use crate::render::{HistogramBin, RenderAdapter, WidgetOutput};

const BIN_ALIAS: &str = "bin";
const COUNT_ALIAS: &str = "count";

/// Configuration for histogram view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    pub table: String,
    /// Column to create histogram from
    pub column: String,
    /// Bin width; bins start at multiples of it
    pub step: f64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            table: "weather".to_string(),
            column: "temp_max".to_string(),
            step: 5.0,
        }
    }
}

/// Counts rows per bin of one numeric column
pub struct HistogramClient {
    name: String,
    config: HistogramConfig,
    adapter: Arc<dyn RenderAdapter>,
    bins: Vec<HistogramBin>,
}

impl HistogramClient {
    pub fn new(name: impl Into<String>, config: HistogramConfig, adapter: Arc<dyn RenderAdapter>) -> Self {
        Self {
            name: name.into(),
            config,
            adapter,
            bins: Vec::new(),
        }
    }

    pub fn bins(&self) -> &[HistogramBin] {
        &self.bins
    }
}

impl Client for HistogramClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_query(&self, filter: &Predicate) -> Result<QuerySpec, QueryBuildError> {
        let HistogramConfig { table, column, step } = &self.config;
        if column.is_empty() {
            return Err(QueryBuildError::NotConfigured(format!("{}: no column", self.name)));
        }
        if !step.is_finite() || *step <= 0.0 {
            return Err(QueryBuildError::InvalidBinStep { column: column.clone(), step: *step });
        }

        Ok(QuerySpec::from_table(table.clone())
            .select(Projection::bin(column.clone(), *step, BIN_ALIAS))
            .select(Projection::count_all(COUNT_ALIAS))
            .filter(filter.clone())
            .filter(Predicate::is_not_null(column.clone()))
            .group_by(BIN_ALIAS)
            .order_by(BIN_ALIAS, false))
    }

    fn on_result(&mut self, result: &QueryResult) {
        let columns = f64_values(&result.batch, BIN_ALIAS)
            .and_then(|starts| Ok((starts, f64_values(&result.batch, COUNT_ALIAS)?)));

        match columns {
            Ok((starts, counts)) => {
                let step = self.config.step;
                self.bins = starts
                    .into_iter()
                    .zip(counts)
                    .filter_map(|(start, count)| {
                        let start = start?;
                        Some(HistogramBin {
                            start,
                            end: start + step,
                            count: count.unwrap_or(0.0) as u64,
                        })
                    })
                    .collect();
                self.adapter.render(&self.name, &WidgetOutput::Histogram { bins: self.bins.clone() });
            }
            Err(e) => report_bad_result(self.adapter.as_ref(), &self.name, &e),
        }
    }

    fn on_error(&mut self, error: &ClientError) {
        report_failure(self.adapter.as_ref(), &self.name, error);
    }
}
