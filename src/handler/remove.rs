use super::{Handler, required};
use crate::destination::{Destination, Version, VersionTarget};
use crate::error::{ConflictError, NotFoundError, Result, ValidationError};
use crate::source::{GitHash, Source};
use tokio_util::sync::CancellationToken;

/// Input of a remove call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveParams {
    /// Service to remove a version of
    pub service: String,
    /// Version to remove
    pub version: Option<Version>,
    /// Set on the second call, after the operator accepted the plan
    pub confirm: bool,
}

/// Result of a remove call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveResponse {
    /// Project name
    pub project: String,
    /// Service name
    pub service: String,
    /// Version removed or to be removed
    pub version: Version,
    /// Whether the version was removed
    pub done: bool,
    /// Commit created in the destination repository, if any
    pub destination_commit: Option<GitHash>,
}

impl<S: Source, D: Destination> Handler<S, D> {
    /// Plan the removal of a deployed version, or remove it once confirmed.
    ///
    /// The released version can never be removed.
    pub async fn remove(
        &self,
        params: &RemoveParams,
        cancel: &CancellationToken,
    ) -> Result<RemoveResponse> {
        let service = required("service", &params.service)?;
        let version = params.version.ok_or_else(|| ValidationError::MissingParameter {
            parameter: "version".to_string(),
        })?;
        let target = VersionTarget {
            project: self.project.clone(),
            service: service.to_string(),
            version,
        };

        if params.confirm {
            let ack = self.destination.remove(&target, cancel).await?;
            log::info!("Removed {service} {version} from {}", self.project);

            return Ok(RemoveResponse {
                project: target.project,
                service: target.service,
                version,
                done: true,
                destination_commit: Some(ack.commit),
            });
        }

        let state = self.destination.get(&self.project, cancel).await?;
        let svc = state.service(service).ok_or_else(|| NotFoundError::Service {
            service: service.to_string(),
        })?;

        if svc.release == Some(version) {
            return Err(ConflictError::ActiveVersion {
                service: service.to_string(),
                version: version.to_string(),
            }
            .into());
        }
        if !svc.has_version(version) {
            return Err(NotFoundError::Version {
                service: service.to_string(),
                version: version.to_string(),
            }
            .into());
        }

        Ok(RemoveResponse {
            project: svc.project.clone(),
            service: svc.name.clone(),
            version,
            done: false,
            destination_commit: None,
        })
    }
}
