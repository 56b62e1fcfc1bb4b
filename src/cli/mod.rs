//! Command line interface for shipper.
//!
//! Argument parsing, progress rendering and the confirmation prompt that
//! separates a plan from its execution.

mod args;
pub mod commands;
mod output;
mod printer;

pub use args::{Args, CiCommand, Command, RuntimeConfig};
pub use commands::execute_command;
pub use output::OutputManager;
pub use printer::DeployPrinter;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}
