//! Command execution.
//!
//! Each command loads the project from the working directory, wires the
//! handler to GitHub and the gitops repository, and drives one workflow.

mod ci;
mod deploy;
mod helpers;
mod release;
mod remove;

pub use ci::{BuildTarget, build_targets};

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;

use ci::execute_ci;
use deploy::execute_deploy;
use release::execute_release;
use remove::execute_remove;

/// Execute the command selected by `args`, returning the exit code
pub async fn execute_command(args: Args) -> Result<i32> {
    let config = RuntimeConfig::new();

    if let Err(validation_error) = args.validate() {
        config.error_println(&format!("Invalid arguments: {validation_error}"));
        return Ok(1);
    }

    let result = run_command(&args, &config).await;
    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            config.error_println(&format!("Command '{}' failed: {e}", args.command.name()));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                config.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    config.indent(&format!("• {suggestion}"));
                }
            }

            Ok(1)
        }
    }
}

async fn run_command(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    if let Command::Ci { command } = &args.command {
        execute_ci(command)?;
        return Ok(0);
    }

    let project = helpers::load_project()?;
    log::debug!("Project '{}' at {}", project.name, project.root_dir.display());
    let handler = helpers::build_handler(args, project)?;
    let cancel = helpers::cancel_on_ctrl_c();

    match &args.command {
        Command::Deploy { reference } => execute_deploy(&handler, reference, config, &cancel).await,
        Command::Release { service, version } => {
            execute_release(&handler, service, *version, config, &cancel).await
        }
        Command::Remove { service, version } => {
            execute_remove(&handler, service, *version, config, &cancel).await
        }
        Command::Ci { .. } => Ok(0),
    }
}
