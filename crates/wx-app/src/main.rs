//! Main application entry point

use std::io;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::error;

use wx_views::JsonLinesAdapter;

mod cli;
mod commands;
mod config;
mod logging;
mod session;

use crate::cli::Cli;
use crate::config::{ConfigError, DashboardConfig};
use crate::logging::{init_logging, LogConfig};
use crate::session::Session;

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(2);
        }
    };

    let log_config = LogConfig::resolve(cli.verbose, config.log_level().ok().flatten());
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    let exit_code = match run(config) {
        Ok(()) => 0,
        Err(error) => {
            error!("{:#}", error);
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn load_config(cli: &Cli) -> Result<DashboardConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    if let Some(data) = &cli.data {
        config = config.with_data_path(data.clone());
    }
    config.normalize();
    Ok(config)
}

fn run(config: DashboardConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let result = runtime.block_on(async {
        let adapter = Arc::new(JsonLinesAdapter::new(io::stdout()));
        let mut session = Session::start(&config, adapter).await?;
        let result = session.run(BufReader::new(tokio::io::stdin()), &mut io::stdout()).await;
        session.close();
        result
    });

    // stdin is read on a blocking thread that may never return
    runtime.shutdown_background();
    result
}
