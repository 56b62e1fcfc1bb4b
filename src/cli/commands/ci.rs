//! CI helper commands.

use crate::cli::CiCommand;
use crate::error::Result;
use crate::project::{ChangedFileFilter, Project};
use serde::Serialize;
use std::io::Write;

/// A service CI should build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
    /// Service name
    pub name: String,
    /// Dockerfile relative to the service directory
    pub dockerfile: String,
    /// Service directory relative to the project root
    pub path: String,
}

/// Services of `project` selected by `filter`
pub fn build_targets(project: &Project, filter: &ChangedFileFilter) -> Vec<BuildTarget> {
    project
        .services
        .iter()
        .filter(|svc| filter.include(svc))
        .map(|svc| BuildTarget {
            name: svc.name.clone(),
            dockerfile: svc.build.dockerfile.clone(),
            path: svc.root_dir.clone(),
        })
        .collect()
}

/// Execute a `ci` subcommand
pub(super) fn execute_ci(command: &CiCommand) -> Result<()> {
    match command {
        CiCommand::ListServices {
            changed_file_filter,
        } => {
            let project = super::helpers::load_project()?;
            let filter = ChangedFileFilter::new(changed_file_filter);
            let targets = build_targets(&project, &filter);
            log::debug!(
                "{} of {} service(s) selected",
                targets.len(),
                project.services.len()
            );

            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer(&mut stdout, &targets)?;
            writeln!(stdout)?;
            Ok(())
        }
    }
}
