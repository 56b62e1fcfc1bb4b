//! Orchestration of the deploy, release and remove workflows.
//!
//! Every workflow runs in two calls. Without a confirmation the handler
//! returns a plan and changes nothing. With one, it re-validates the plan
//! against freshly read state and only then mutates the destination. The
//! destination's acknowledgement is the only completion signal.

mod deploy;
mod release;
mod remove;

pub use deploy::{
    ConfirmDeploy, DeployParams, DeployResponse, DeployStatus, ServiceDeployRequest,
    ServiceDeployStatus,
};
pub use release::{ReleaseParams, ReleaseResponse};
pub use remove::{RemoveParams, RemoveResponse};

use crate::destination::Destination;
use crate::error::{Result, ValidationError};
use crate::source::Source;

/// Drives workflows for one project against a source and a destination
#[derive(Debug, Clone)]
pub struct Handler<S, D> {
    source: S,
    destination: D,
    project: String,
}

impl<S: Source, D: Destination> Handler<S, D> {
    /// Handler for `project`
    pub fn new(project: impl Into<String>, source: S, destination: D) -> Self {
        Self {
            source,
            destination,
            project: project.into(),
        }
    }

    /// Project the handler operates on
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Source backend
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Destination backend
    pub fn destination(&self) -> &D {
        &self.destination
    }
}

fn required<'a>(parameter: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingParameter {
            parameter: parameter.to_string(),
        }
        .into());
    }
    Ok(value)
}
