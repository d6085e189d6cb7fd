//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the appliance with the configured console devices
    Run,
    /// Run a self-driving demo that posts and expires messages
    Demo {
        /// Seconds between feeder actions
        #[arg(short, long, default_value_t = 8)]
        step_secs: u64,
    },
}
