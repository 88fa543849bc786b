//! Logging setup using `tracing` and `tracing-subscriber`
//!
//! Logs go to stderr; stdout carries the rendered widget stream.

use std::io;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose events pass the default filter at the configured level
const CRATES: &[&str] = &["wx_core", "wx_data", "wx_views", "weatherwiz"];

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: Level,
    /// Include the module path in each line
    pub with_target: bool,
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            with_target: false,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// - 0: info
    /// - 1 (`-v`): debug
    /// - 2+ (`-vv`): trace
    pub fn from_verbosity(verbosity: u8) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            with_target: verbosity > 1,
            ..Default::default()
        }
    }

    /// `-v` wins over the config file's level
    pub fn resolve(verbosity: u8, configured: Option<Level>) -> Self {
        match (verbosity, configured) {
            (0, Some(level)) => Self { level, ..Default::default() },
            _ => Self::from_verbosity(verbosity),
        }
    }

    /// Directive used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> String {
        let level = self.level.to_string().to_lowercase();
        let mut directive = String::from("warn");
        for name in CRATES {
            directive.push_str(&format!(",{name}={level}"));
        }
        directive
    }
}

/// Install the global subscriber; `RUST_LOG` overrides the configured level
pub fn init_logging(config: &LogConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(config.with_target)
                .with_ansi(config.with_ansi),
        )
        .try_init()
}
