//! One dashboard session: the store, the coordinator and the four widgets

use std::io::Write;
use std::sync::Arc;
use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::runtime::Handle;
use tracing::{info, warn};
use wx_core::{Coordinator, Projection, QuerySpec, Selection, TabularStore};
use wx_data::{SqliteStore, TableInfo};
use wx_views::{
    HistogramClient, IntervalBinding, MenuBinding, MenuClient, RenderAdapter, ScatterClient, StatClient,
};

use crate::commands::Command;
use crate::config::DashboardConfig;

pub const MENU: &str = "menu";
pub const HISTOGRAM: &str = "histogram";
pub const SCATTER: &str = "scatter";
pub const STAT: &str = "stat";

pub struct Session {
    coordinator: Coordinator,
    selection: Arc<Selection>,
    menu: MenuBinding,
    brush: Option<IntervalBinding>,
    store: SqliteStore,
    table: TableInfo,
}

impl Session {
    /// Load the dataset, connect every widget and render the unfiltered dashboard
    pub async fn start(config: &DashboardConfig, adapter: Arc<dyn RenderAdapter>) -> Result<Self> {
        let store = SqliteStore::open_in_memory().context("failed to open the in-memory store")?;
        let table = store
            .load_csv(&config.dataset)
            .await
            .with_context(|| format!("failed to load dataset {}", config.dataset.path.display()))?;

        let mut coordinator = Coordinator::new(
            Arc::new(store.clone()),
            config.coordinator.to_coordinator_config()?,
            Handle::current(),
        );
        let selection = if config.widgets.crossfilter {
            coordinator.crossfilter()
        } else {
            coordinator.intersect()
        };

        let widgets = &config.widgets;
        let menu = MenuClient::new(MENU, widgets.menu.clone(), adapter.clone());
        let menu_binding = menu.binding(selection.clone());
        let scatter = ScatterClient::new(SCATTER, widgets.scatter.clone(), adapter.clone());
        let brush = scatter.binding(selection.clone());

        coordinator.connect(Box::new(menu), Some(&selection));
        coordinator.connect(
            Box::new(HistogramClient::new(HISTOGRAM, widgets.histogram.clone(), adapter.clone())),
            Some(&selection),
        );
        coordinator.connect(Box::new(scatter), Some(&selection));
        coordinator.connect(Box::new(StatClient::new(STAT, widgets.stat.clone(), adapter)), Some(&selection));
        coordinator.run_until_idle().await;

        info!(table = %table.name, rows = table.row_count, widgets = coordinator.client_count(), "dashboard ready");

        Ok(Self {
            coordinator,
            selection,
            menu: menu_binding,
            brush,
            store,
            table,
        })
    }

    /// Read commands until `quit` or end of input
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("failed to read command")? {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.parse::<Command>() {
                Ok(command) => {
                    if !self.execute(command, out).await? {
                        break;
                    }
                }
                Err(e) => eprintln!("error: {e}"),
            }
        }
        Ok(())
    }

    /// Apply one command and wait for the dashboard to settle; `false` means quit
    pub async fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> Result<bool> {
        match command {
            Command::Select(value) => {
                self.menu.select(&value);
            }
            Command::Clear => {
                self.menu.clear();
            }
            Command::Brush(a, b) => match &self.brush {
                Some(brush) => {
                    brush.brush(a, b);
                }
                None => warn!("the scatter plot has no brush"),
            },
            Command::Unbrush => {
                if let Some(brush) = &self.brush {
                    brush.clear();
                }
            }
            Command::Show(rows) => self.show(rows, out).await?,
            Command::Stats => self.write_stats(out)?,
            Command::Quit => return Ok(false),
        }

        self.coordinator.run_until_idle().await;
        out.flush()?;
        Ok(true)
    }

    /// Print the first `rows` rows that pass the current selection
    async fn show<W: Write>(&self, rows: usize, out: &mut W) -> Result<()> {
        let mut spec = QuerySpec::from_table(self.table.name.clone())
            .filter(self.selection.resolve(&[]))
            .limit(rows);
        for (column, _) in &self.table.columns {
            spec = spec.select(Projection::column(column.clone()));
        }
        if let Some((first, _)) = self.table.columns.first() {
            spec = spec.order_by(first.clone(), false);
        }

        let batch = self.store.execute(&spec).await?;
        writeln!(out, "{}", pretty_format_batches(&[batch])?)?;
        Ok(())
    }

    fn write_stats<W: Write>(&self, out: &mut W) -> Result<()> {
        let stats = self.coordinator.stats();
        writeln!(
            out,
            "passes={} issued={} executed={} cache_hits={} deduplicated={} applied={} stale={} failures={}",
            stats.dispatch_passes,
            stats.queries_issued,
            stats.store_executions,
            stats.cache_hits,
            stats.deduplicated,
            stats.results_applied,
            stats.stale_dropped,
            stats.failures,
        )?;
        Ok(())
    }

    pub fn selection(&self) -> &Arc<Selection> {
        &self.selection
    }

    /// Drop pending work and disconnect the widgets
    pub fn close(mut self) {
        let abandoned = self.coordinator.shutdown();
        info!(abandoned, "session closed");
    }
}
