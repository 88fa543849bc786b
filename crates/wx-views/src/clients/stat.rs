//! Single derived statistic, such as average precipitation

use std::sync::Arc;
use serde::{Serialize, Deserialize};
use wx_core::{AggregateFunc, Client, ClientError, Predicate, Projection, QueryBuildError, QueryResult, QuerySpec};

use super::{report_bad_result, report_failure};
use crate::columns::f64_values;
use crate::render::{RenderAdapter, WidgetOutput};

const VALUE_ALIAS: &str = "value";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatConfig {
    pub table: String,
    pub column: String,
    pub func: AggregateFunc,
    /// Shown next to the value
    pub label: String,
}

impl Default for StatConfig {
    fn default() -> Self {
        Self {
            table: "weather".to_string(),
            column: "precipitation".to_string(),
            func: AggregateFunc::Avg,
            label: "Average precipitation".to_string(),
        }
    }
}

pub struct StatClient {
    name: String,
    config: StatConfig,
    adapter: Arc<dyn RenderAdapter>,
    value: Option<f64>,
}

impl StatClient {
    pub fn new(name: impl Into<String>, config: StatConfig, adapter: Arc<dyn RenderAdapter>) -> Self {
        Self {
            name: name.into(),
            config,
            adapter,
            value: None,
        }
    }

    /// `None` until a result arrives, and when nothing matches the filter
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Client for StatClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_query(&self, filter: &Predicate) -> Result<QuerySpec, QueryBuildError> {
        if self.config.column.is_empty() {
            return Err(QueryBuildError::NotConfigured(format!("{}: no column", self.name)));
        }

        Ok(QuerySpec::from_table(self.config.table.clone())
            .select(Projection::aggregate(self.config.func, self.config.column.clone(), VALUE_ALIAS))
            .filter(filter.clone()))
    }

    /// Reads the last non-null row, so grouped results work as well as scalars
    fn on_result(&mut self, result: &QueryResult) {
        match f64_values(&result.batch, VALUE_ALIAS) {
            Ok(values) => {
                self.value = values.into_iter().flatten().last();
                self.adapter.render(
                    &self.name,
                    &WidgetOutput::Stat { label: self.config.label.clone(), value: self.value },
                );
            }
            Err(e) => report_bad_result(self.adapter.as_ref(), &self.name, &e),
        }
    }

    fn on_error(&mut self, error: &ClientError) {
        report_failure(self.adapter.as_ref(), &self.name, error);
    }
}
