//! Signcast CLI - headless appliance entry point

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use signcast_cli::{
    app::ApplianceApp,
    cli::Cli,
    commands::CommandDispatcher,
    config::AppConfig,
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_configuration(&cli)?;

    let app = ApplianceApp::new(config);

    if let Err(e) = CommandDispatcher::execute(cli, app).await {
        error!("Appliance exited with an error: {}", e);
        std::process::exit(1);
    }

    info!("Signcast CLI exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level, honoring RUST_LOG when set
fn setup_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
        AppConfig::load_from_file(config_path)
    } else {
        info!("Using default configuration");
        Ok(AppConfig::default())
    }
}
