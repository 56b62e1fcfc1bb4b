use super::{Handler, required};
use crate::destination::{Destination, Version, VersionTarget};
use crate::error::{NotFoundError, Result, ValidationError};
use crate::source::{GitHash, Source};
use tokio_util::sync::CancellationToken;

/// Input of a release call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseParams {
    /// Service to release
    pub service: String,
    /// Version to route traffic to, the latest deploy when unset
    pub version: Option<Version>,
    /// Set on the second call, after the operator accepted the plan
    pub confirm: bool,
}

/// Result of a release call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseResponse {
    /// Project name
    pub project: String,
    /// Service name
    pub service: String,
    /// Version that is or will be active
    pub version: Version,
    /// Version active before this call
    pub current_release: Option<Version>,
    /// Nothing left to do: released now, or already active
    pub done: bool,
    /// Commit created in the destination repository, if any
    pub destination_commit: Option<GitHash>,
}

impl<S: Source, D: Destination> Handler<S, D> {
    /// Plan a release, or route traffic to the confirmed version
    pub async fn release(
        &self,
        params: &ReleaseParams,
        cancel: &CancellationToken,
    ) -> Result<ReleaseResponse> {
        let service = required("service", &params.service)?;

        if params.confirm {
            let version = params.version.ok_or_else(|| ValidationError::MissingParameter {
                parameter: "version".to_string(),
            })?;
            let target = VersionTarget {
                project: self.project.clone(),
                service: service.to_string(),
                version,
            };
            let ack = self.destination.release(&target, cancel).await?;
            log::info!("Released {service} {version} in {}", self.project);

            return Ok(ReleaseResponse {
                project: self.project.clone(),
                service: service.to_string(),
                version,
                current_release: Some(version),
                done: true,
                destination_commit: Some(ack.commit),
            });
        }

        let state = self.destination.get(&self.project, cancel).await?;
        let svc = state.service(service).ok_or_else(|| NotFoundError::Service {
            service: service.to_string(),
        })?;

        let version = match params.version {
            Some(version) => version,
            None => svc.latest().ok_or_else(|| NotFoundError::NoDeploys {
                service: service.to_string(),
            })?,
        };

        let response = ReleaseResponse {
            project: svc.project.clone(),
            service: svc.name.clone(),
            version,
            current_release: svc.release,
            done: false,
            destination_commit: None,
        };

        if svc.release == Some(version) {
            log::debug!("{service} {version} is already released");
            return Ok(ReleaseResponse {
                done: true,
                ..response
            });
        }
        if !svc.has_version(version) {
            return Err(NotFoundError::Version {
                service: service.to_string(),
                version: version.to_string(),
            }
            .into());
        }

        Ok(response)
    }
}
