//! Gitops repository backed [`Destination`]

use super::bundle::{
    DeployContext, ReleaseContext, delete_deploy_bundle, deploy_variables, write_deploy_bundle,
    write_release_bundle,
};
use super::ledger::DestinationState;
use super::manifest::read_ledger;
use super::slug::slugify_service_name;
use super::{DeployBatch, Destination, DestinationAck, VersionTarget};
use crate::error::{ConflictError, NotFoundError, Result, TransportError, ValidationError};
use crate::git::{Checkout, GitCli};
use crate::project::Project;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Keeps the ledger as Kubernetes manifests in a git repository
#[derive(Debug, Clone)]
pub struct GitopsDestination {
    project: String,
    repo: String,
    manifest_path: String,
    template_path: String,
    namespace: String,
    git: GitCli,
}

impl GitopsDestination {
    /// Destination for the project's gitops settings
    pub fn new(project: &Project, git: GitCli) -> Self {
        Self {
            project: project.name.clone(),
            repo: project.gitops.repo.clone(),
            manifest_path: project.gitops.manifest_path.clone(),
            template_path: project.gitops.template_path.clone(),
            namespace: project.gitops.namespace.clone(),
            git,
        }
    }

    fn ensure_project(&self, project: &str) -> Result<()> {
        if project != self.project {
            return Err(ConflictError::ProjectMismatch {
                configured: self.project.clone(),
                requested: project.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn manifest_root(&self, checkout: &Checkout) -> PathBuf {
        checkout.path().join(&self.manifest_path)
    }

    async fn open(&self, cancel: &CancellationToken) -> Result<(Checkout, DestinationState)> {
        let checkout = self.git.clone_repo(&self.repo, Some(1), cancel).await?;
        let state = read_ledger(&self.manifest_root(&checkout), &self.project)?;
        Ok((checkout, state))
    }

    async fn commit_and_push(
        &self,
        checkout: &Checkout,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<DestinationAck> {
        let pathspec = match self.manifest_path.as_str() {
            "" => ".",
            path => path,
        };
        checkout.stage(pathspec, cancel).await?;
        if !checkout.has_staged_changes(cancel).await? {
            return Err(TransportError::Git {
                operation: "commit".to_string(),
                reason: "nothing to commit".to_string(),
            }
            .into());
        }

        let commit = checkout.commit(message, cancel).await?;
        checkout.push(cancel).await?;
        log::info!("Pushed {} to {}: {message}", commit.short(), self.repo);

        Ok(DestinationAck { commit })
    }
}

impl Destination for GitopsDestination {
    async fn get(&self, project: &str, cancel: &CancellationToken) -> Result<DestinationState> {
        self.ensure_project(project)?;
        let (_checkout, state) = self.open(cancel).await?;
        Ok(state)
    }

    async fn deploy(&self, batch: &DeployBatch, cancel: &CancellationToken) -> Result<DestinationAck> {
        self.ensure_project(&batch.project)?;
        if batch.services.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }

        let (checkout, state) = self.open(cancel).await?;
        let manifest_root = self.manifest_root(&checkout);
        let template_root = checkout.path().join(&self.template_path);

        for item in &batch.services {
            let name = &item.service.name;
            if state
                .service(name)
                .is_some_and(|svc| svc.has_version(item.version))
            {
                return Err(ConflictError::VersionExists {
                    service: name.clone(),
                    version: item.version.to_string(),
                }
                .into());
            }

            let expected = state.next_version_for(name)?;
            if expected != item.version {
                return Err(ConflictError::VersionDrift {
                    service: name.clone(),
                    expected: expected.to_string(),
                    requested: item.version.to_string(),
                }
                .into());
            }

            let slug = slugify_service_name(name)?;
            let ctx = DeployContext {
                project: batch.project.clone(),
                name: name.clone(),
                slug_name_version: format!("{slug}-{}", item.version),
                slug_name: slug,
                version: item.version.to_string(),
                deploy_image: item.image.clone(),
                namespace: self.namespace.clone(),
                deploy_variables: deploy_variables(&item.service.deploy.config)?,
                secret_mounts: item.service.deploy.secret_mounts.clone(),
            };

            write_deploy_bundle(
                &template_root,
                &manifest_root,
                &item.service.deploy.template,
                item.version,
                &ctx,
            )?;
        }

        let message = match batch.services.as_slice() {
            [only] => format!("Deploying {}/{} {}", batch.project, only.service.name, only.version),
            _ => format!("Deploying {} ({} services)", batch.project, batch.services.len()),
        };
        self.commit_and_push(&checkout, &format!("{message}\n\nSource commit {}", batch.commit), cancel)
            .await
    }

    async fn release(&self, target: &VersionTarget, cancel: &CancellationToken) -> Result<DestinationAck> {
        self.ensure_project(&target.project)?;
        let (checkout, state) = self.open(cancel).await?;

        let svc = state
            .service(&target.service)
            .ok_or_else(|| NotFoundError::Service {
                service: target.service.clone(),
            })?;
        if !svc.has_version(target.version) {
            return Err(NotFoundError::Version {
                service: target.service.clone(),
                version: target.version.to_string(),
            }
            .into());
        }
        if svc.release == Some(target.version) {
            return Err(ConflictError::AlreadyReleased {
                service: target.service.clone(),
                version: target.version.to_string(),
            }
            .into());
        }

        let slug = slugify_service_name(&svc.name)?;
        let ctx = ReleaseContext {
            project: svc.project.clone(),
            name: svc.name.clone(),
            slug_name_version: format!("{slug}-{}", target.version),
            slug_name: slug,
            version: target.version.to_string(),
            namespace: self.namespace.clone(),
        };
        write_release_bundle(&self.manifest_root(&checkout), &ctx)?;

        let message = format!("Releasing {}/{}/{}", target.project, target.service, target.version);
        self.commit_and_push(&checkout, &message, cancel).await
    }

    async fn remove(&self, target: &VersionTarget, cancel: &CancellationToken) -> Result<DestinationAck> {
        self.ensure_project(&target.project)?;
        let (checkout, state) = self.open(cancel).await?;

        let svc = state
            .service(&target.service)
            .ok_or_else(|| NotFoundError::Service {
                service: target.service.clone(),
            })?;
        if svc.release == Some(target.version) {
            return Err(ConflictError::ActiveVersion {
                service: target.service.clone(),
                version: target.version.to_string(),
            }
            .into());
        }
        if !svc.has_version(target.version) {
            return Err(NotFoundError::Version {
                service: target.service.clone(),
                version: target.version.to_string(),
            }
            .into());
        }

        delete_deploy_bundle(&self.manifest_root(&checkout), &target.service, target.version)?;

        let message = format!("Removing {}/{}/{}", target.project, target.service, target.version);
        self.commit_and_push(&checkout, &message, cancel).await
    }
}

