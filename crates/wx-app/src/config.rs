//! Dashboard configuration file

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::Level;
use wx_core::CoordinatorConfig;
use wx_data::IngestConfig;
use wx_views::{HistogramConfig, MenuConfig, ScatterConfig, StatConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid query_timeout '{value}': {source}")]
    Timeout {
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("unknown log level '{0}'")]
    LogLevel(String),
}

/// Scheduler settings as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Human-readable duration such as `30s` or `500ms`
    pub query_timeout: String,
    pub cache_capacity: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            query_timeout: "30s".to_string(),
            cache_capacity: 64,
        }
    }
}

impl CoordinatorSettings {
    pub fn query_timeout(&self) -> Result<Duration, ConfigError> {
        humantime::parse_duration(&self.query_timeout).map_err(|source| ConfigError::Timeout {
            value: self.query_timeout.clone(),
            source,
        })
    }

    pub fn to_coordinator_config(&self) -> Result<CoordinatorConfig, ConfigError> {
        Ok(CoordinatorConfig {
            query_timeout: self.query_timeout()?,
            cache_capacity: self.cache_capacity,
        })
    }
}

/// The widgets on the dashboard; all of them query the dataset table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetSettings {
    pub menu: MenuConfig,
    pub histogram: HistogramConfig,
    pub scatter: ScatterConfig,
    pub stat: StatConfig,
    /// Every source widget ignores its own clause
    pub crossfilter: bool,
}

impl WidgetSettings {
    fn use_table(&mut self, table: &str) {
        self.menu.table = table.to_string();
        self.histogram.table = table.to_string();
        self.scatter.table = table.to_string();
        self.stat.table = table.to_string();
    }
}

/// Top-level configuration; the defaults describe the Seattle weather dashboard
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub dataset: IngestConfig,
    pub coordinator: CoordinatorSettings,
    pub widgets: WidgetSettings,
    /// `error`, `warn`, `info`, `debug` or `trace`; `-v` takes precedence
    pub log_level: Option<String>,
}

impl DashboardConfig {
    /// Read a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: DashboardConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Replace the dataset path, keeping the rest
    pub fn with_data_path(mut self, path: PathBuf) -> Self {
        self.dataset.path = path;
        self
    }

    /// Point every widget at the dataset table
    pub fn normalize(&mut self) {
        let table = self.dataset.table.clone();
        self.widgets.use_table(&table);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coordinator.query_timeout()?;
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<Option<Level>, ConfigError> {
        self.log_level
            .as_deref()
            .map(|level| Level::from_str(level).map_err(|_| ConfigError::LogLevel(level.to_string())))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_defaults_describe_weather_dashboard() {
        let config = DashboardConfig::default();
        assert_eq!(config.dataset.table, "weather");
        assert_eq!(config.widgets.menu.column, "weather");
        assert_eq!(config.widgets.scatter.x, "temp_max");
        assert_eq!(config.widgets.scatter.y, "wind");
        assert_eq!(config.widgets.stat.column, "precipitation");
        assert_eq!(config.coordinator.query_timeout().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_partial_file() {
        let file = write_config(
            r#"{
                "dataset": { "path": "other.csv", "table": "obs" },
                "coordinator": { "query_timeout": "250ms" },
                "widgets": { "histogram": { "column": "temp_min", "step": 2.5 } },
                "log_level": "debug"
            }"#,
        );
        let config = DashboardConfig::load(file.path()).unwrap();

        assert_eq!(config.dataset.path, PathBuf::from("other.csv"));
        assert_eq!(config.widgets.histogram.column, "temp_min");
        assert_eq!(config.widgets.histogram.table, "obs");
        assert_eq!(config.widgets.menu.table, "obs");
        assert_eq!(config.coordinator.cache_capacity, 64);
        assert_eq!(
            config.coordinator.to_coordinator_config().unwrap().query_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(config.log_level().unwrap(), Some(Level::DEBUG));
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/dashboard.json"));
        let config = DashboardConfig::load(path).unwrap();

        assert_eq!(config.widgets, WidgetSettings::default());
        assert_eq!(config.dataset.column_type("date", wx_data::ColumnType::Text), wx_data::ColumnType::Date);
        assert_eq!(config.coordinator.query_timeout().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let file = write_config(r#"{ "coordinator": { "query_timeout": "soon" } }"#);
        assert!(matches!(DashboardConfig::load(file.path()), Err(ConfigError::Timeout { .. })));
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let file = write_config(r#"{ "log_level": "loud" }"#);
        assert!(matches!(DashboardConfig::load(file.path()), Err(ConfigError::LogLevel(level)) if level == "loud"));
    }

    #[test]
    fn test_malformed_json() {
        let file = write_config("{ dataset: ");
        assert!(matches!(DashboardConfig::load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = DashboardConfig::load(Path::new("/nonexistent/weatherwiz.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
