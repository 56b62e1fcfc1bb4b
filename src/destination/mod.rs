//! Destination side of a deploy: the gitops repository and its ledger.
//!
//! A [`Destination`] reports the deployed state of a project and applies
//! deploy, release and remove operations. Each mutating call is one atomic
//! commit and push; nothing is visible remotely until the push succeeds.

mod bundle;
mod gitops;
pub mod ledger;
pub mod manifest;
mod slug;

pub use bundle::{
    DeployContext, RELEASE_FILE, ReleaseContext, delete_deploy_bundle, deploy_dir,
    deploy_variables, write_deploy_bundle, write_release_bundle,
};
pub use gitops::GitopsDestination;
pub use ledger::{Artifact, Deploy, DestinationService, DestinationState, Version};
pub use slug::slugify_service_name;

use crate::error::Result;
use crate::project::Service;
use crate::source::GitHash;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// One service in a deploy batch
#[derive(Debug, Clone)]
pub struct ServiceDeploy {
    /// Service configuration at the deployed commit
    pub service: Service,
    /// Version to create, must be the ledger's next version
    pub version: Version,
    /// Image reference to run
    pub image: String,
}

/// Every service deployed by one confirmation
#[derive(Debug, Clone)]
pub struct DeployBatch {
    /// Project name
    pub project: String,
    /// Source commit being deployed
    pub commit: GitHash,
    /// Services to deploy
    pub services: Vec<ServiceDeploy>,
}

/// Target of a release or remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTarget {
    /// Project name
    pub project: String,
    /// Service name
    pub service: String,
    /// Version to release or remove
    pub version: Version,
}

/// Acknowledgement of a pushed change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationAck {
    /// Commit created in the destination repository
    pub commit: GitHash,
}

/// Deployed-state store
pub trait Destination {
    /// Current ledger of `project`
    fn get(
        &self,
        project: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<DestinationState>>;

    /// Create a deploy bundle for every service in the batch
    fn deploy(
        &self,
        batch: &DeployBatch,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<DestinationAck>>;

    /// Route traffic to a deployed version
    fn release(
        &self,
        target: &VersionTarget,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<DestinationAck>>;

    /// Delete a deployed version that is not released
    fn remove(
        &self,
        target: &VersionTarget,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<DestinationAck>>;
}
