//! Categorical menu over the distinct values of one column

use std::sync::Arc;
use serde::{Serialize, Deserialize};
use wx_core::{Client, ClientError, Predicate, Projection, QueryBuildError, QueryResult, QuerySpec, Selection};

use super::{report_bad_result, report_failure};
use crate::bindings::MenuBinding;
use crate::columns::text_values;
use crate::render::{RenderAdapter, WidgetOutput};

/// Configuration for a menu widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    pub table: String,
    pub column: String,
    /// Source id of the clause the menu writes
    pub source: String,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            table: "weather".to_string(),
            column: "weather".to_string(),
            source: "menu".to_string(),
        }
    }
}

/// Lists the options left by every other clause; never hides its own
pub struct MenuClient {
    name: String,
    config: MenuConfig,
    adapter: Arc<dyn RenderAdapter>,
    options: Vec<String>,
}

impl MenuClient {
    pub fn new(name: impl Into<String>, config: MenuConfig, adapter: Arc<dyn RenderAdapter>) -> Self {
        Self {
            name: name.into(),
            config,
            adapter,
            options: Vec::new(),
        }
    }

    /// Predicate for choosing `value`
    pub fn clause(&self, value: &str) -> Predicate {
        Predicate::eq(self.config.column.clone(), value)
    }

    /// Handle for UI events to write this menu's clause
    pub fn binding(&self, selection: Arc<Selection>) -> MenuBinding {
        MenuBinding::new(selection, self.config.source.clone(), self.config.column.clone())
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }
}

impl Client for MenuClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> Option<&str> {
        Some(&self.config.source)
    }

    fn self_exclusion(&self) -> bool {
        true
    }

    fn build_query(&self, filter: &Predicate) -> Result<QuerySpec, QueryBuildError> {
        if self.config.column.is_empty() {
            return Err(QueryBuildError::NotConfigured(format!("{}: no column", self.name)));
        }
        let column = &self.config.column;

        Ok(QuerySpec::from_table(self.config.table.clone())
            .select(Projection::column(column.clone()))
            .filter(filter.clone())
            .filter(Predicate::is_not_null(column.clone()))
            .distinct()
            .order_by(column.clone(), false))
    }

    fn on_result(&mut self, result: &QueryResult) {
        match text_values(&result.batch, &self.config.column) {
            Ok(values) => {
                self.options = values.into_iter().flatten().collect();
                self.adapter.render(&self.name, &WidgetOutput::Options { values: self.options.clone() });
            }
            Err(e) => report_bad_result(self.adapter.as_ref(), &self.name, &e),
        }
    }

    fn on_error(&mut self, error: &ClientError) {
        report_failure(self.adapter.as_ref(), &self.name, error);
    }
}
