//! Signcast CLI library
//!
//! Components for the signcast appliance binary: argument parsing, TOML
//! configuration, console device tasks, and the run/demo applications.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod devices;
pub mod error;

pub use app::ApplianceApp;
pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::AppConfig;
pub use devices::{ConsoleAudio, ConsoleRenderer, LoggingLights};
pub use error::{CliError, Result};
