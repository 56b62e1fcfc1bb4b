use super::{Handler, required};
use crate::destination::{DeployBatch, Destination, ServiceDeploy, Version};
use crate::error::{ConflictError, NotFoundError, Result, ValidationError};
use crate::source::{BuildStatus, GitHash, Source, SourceSnapshot};
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

/// One service the operator agreed to deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeployRequest {
    /// Service name
    pub service: String,
    /// Version shown in the plan
    pub version: Version,
}

/// Operator confirmation of a deploy plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmDeploy {
    /// Commit the plan was built for
    pub commit: GitHash,
    /// Services and versions from the plan
    pub requests: Vec<ServiceDeployRequest>,
}

/// Input of a deploy call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployParams {
    /// Trunk name, pull request number or branch name
    pub reference: String,
    /// Set on the second call, after the operator accepted the plan
    pub confirm: Option<ConfirmDeploy>,
}

/// Plan line for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeployStatus {
    /// Service name
    pub name: String,
    /// CI outcome at the resolved commit
    pub build_status: BuildStatus,
    /// Highest deployed version, 0 without deploys
    pub current_version: u32,
    /// Version the deploy would create, known once the destination was read
    pub next_version: Option<Version>,
}

/// Where a deploy call stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStatus {
    /// The ref has no deployable commit, e.g. an unmerged pull request
    NotReady,
    /// CI is still running, call again later
    ChecksPending,
    /// CI finished without success
    ChecksFailed,
    /// Plan computed, waiting for confirmation
    PlanReady,
    /// Destination accepted the batch
    Committed {
        /// Commit created in the destination repository
        destination_commit: GitHash,
    },
}

impl DeployStatus {
    /// Whether calling again without a confirmation could change the outcome
    pub fn is_pending(&self) -> bool {
        matches!(self, DeployStatus::ChecksPending)
    }
}

/// Result of a deploy call
#[derive(Debug, Clone)]
pub struct DeployResponse {
    /// Source state the response was built from
    pub snapshot: SourceSnapshot,
    /// One line per service built at the commit
    pub services: Vec<ServiceDeployStatus>,
    /// Outcome
    pub status: DeployStatus,
}

impl DeployResponse {
    /// Confirmation accepting every line of this plan
    pub fn confirmation(&self) -> Option<ConfirmDeploy> {
        let commit = self.snapshot.reference.commit.clone()?;
        let requests = self
            .services
            .iter()
            .filter_map(|s| {
                s.next_version.map(|version| ServiceDeployRequest {
                    service: s.name.clone(),
                    version,
                })
            })
            .collect::<Vec<_>>();
        (!requests.is_empty()).then_some(ConfirmDeploy { commit, requests })
    }
}

/// Image built by CI for `service` at `commit`
pub(crate) fn deploy_image(registry_prefix: &str, service: &str, commit: &GitHash) -> String {
    let prefix = registry_prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("{service}:{}", commit.short())
    } else {
        format!("{prefix}/{service}:{}", commit.short())
    }
}

fn respond(
    snapshot: SourceSnapshot,
    services: Vec<ServiceDeployStatus>,
    status: DeployStatus,
) -> Result<DeployResponse> {
    Ok(DeployResponse {
        snapshot,
        services,
        status,
    })
}

fn validate_confirmation(confirm: &ConfirmDeploy) -> Result<()> {
    if confirm.requests.is_empty() {
        return Err(ValidationError::EmptyBatch.into());
    }
    if confirm.commit.as_str().trim().is_empty() {
        return Err(ValidationError::MissingParameter {
            parameter: "commit".to_string(),
        }
        .into());
    }

    let mut seen = BTreeSet::new();
    for request in &confirm.requests {
        required("service", &request.service)?;
        if !seen.insert(request.service.as_str()) {
            return Err(ValidationError::InvalidParameter {
                parameter: "service".to_string(),
                reason: format!("'{}' is requested more than once", request.service),
            }
            .into());
        }
    }
    Ok(())
}

impl<S: Source, D: Destination> Handler<S, D> {
    /// Plan a deploy of `params.reference`, or execute a confirmed plan.
    ///
    /// A confirmation is honoured only if the ref still resolves to the
    /// confirmed commit and every requested version is still the next one.
    pub async fn deploy(
        &self,
        params: &DeployParams,
        cancel: &CancellationToken,
    ) -> Result<DeployResponse> {
        let reference = required("ref", &params.reference)?;
        if let Some(confirm) = &params.confirm {
            validate_confirmation(confirm)?;
        }

        let snapshot = self.source.get(&self.project, reference, cancel).await?;
        let mut services: Vec<ServiceDeployStatus> = snapshot
            .services
            .values()
            .map(|s| ServiceDeployStatus {
                name: s.service.name.clone(),
                build_status: s.build_status.clone(),
                current_version: 0,
                next_version: None,
            })
            .collect();

        let Some(commit) = snapshot.reference.commit.clone() else {
            log::debug!("{reference}: no deployable commit");
            return respond(snapshot, services, DeployStatus::NotReady);
        };
        if snapshot.checks_running {
            return respond(snapshot, services, DeployStatus::ChecksPending);
        }
        if !snapshot.checks_complete {
            return respond(snapshot, services, DeployStatus::ChecksFailed);
        }

        let state = self.destination.get(&self.project, cancel).await?;
        for line in &mut services {
            line.current_version = state.current_version_for(&line.name);
            line.next_version = Some(state.next_version_for(&line.name)?);
        }

        let Some(confirm) = &params.confirm else {
            return respond(snapshot, services, DeployStatus::PlanReady);
        };

        if confirm.commit != commit {
            return Err(ConflictError::CommitMoved {
                confirmed: confirm.commit.to_string(),
                current: commit.to_string(),
            }
            .into());
        }

        let mut batch = DeployBatch {
            project: self.project.clone(),
            commit: commit.clone(),
            services: Vec::with_capacity(confirm.requests.len()),
        };
        for request in &confirm.requests {
            let source_service = snapshot.services.get(&request.service).ok_or_else(|| {
                NotFoundError::ServiceNotInSource {
                    service: request.service.clone(),
                }
            })?;

            let expected = state.next_version_for(&request.service)?;
            if expected != request.version {
                return Err(ConflictError::VersionDrift {
                    service: request.service.clone(),
                    expected: expected.to_string(),
                    requested: request.version.to_string(),
                }
                .into());
            }

            batch.services.push(ServiceDeploy {
                service: source_service.service.clone(),
                version: request.version,
                image: deploy_image(&snapshot.registry_prefix, &request.service, &commit),
            });
        }

        let ack = self.destination.deploy(&batch, cancel).await?;
        log::info!(
            "Deployed {} service(s) of {} at {}",
            batch.services.len(),
            self.project,
            commit.short()
        );

        respond(
            snapshot,
            services,
            DeployStatus::Committed {
                destination_commit: ack.commit,
            },
        )
    }
}
