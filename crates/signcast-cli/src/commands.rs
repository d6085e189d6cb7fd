//! Command dispatch for the CLI subcommands

use std::time::Duration;

use crate::app::ApplianceApp;
use crate::cli::{Cli, Commands};
use crate::error::Result;

/// Routes parsed subcommands to the application
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub async fn execute(cli: Cli, app: ApplianceApp) -> Result<()> {
        match cli.command {
            Commands::Run => app.run().await,
            Commands::Demo { step_secs } => app.demo(Duration::from_secs(step_secs)).await,
        }
    }
}
