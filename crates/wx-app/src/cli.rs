//! Command-line arguments

use std::path::PathBuf;
use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "weatherwiz",
    version,
    about = "Cross-filtering weather dashboard",
    long_about = "Loads a weather CSV into an in-memory store and renders linked widgets as JSON lines.\n\
                  Commands are read from stdin: select <value>, clear, brush <lo> <hi>, unbrush, show [n], stats, quit."
)]
pub struct Cli {
    /// Dashboard config file (JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Weather CSV, overriding the config's dataset path
    #[arg(short, long, value_name = "CSV")]
    pub data: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
