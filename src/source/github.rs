//! GitHub backed [`Source`]

use super::checks::{CheckSummary, latest_run, summarize};
use super::{
    BranchCommit, GitHash, PullRequest, ResolvedRef, Source, SourceService, SourceSnapshot,
};
use crate::error::{
    ConflictError, NotFoundError, Result, ShipperError, TransportError, ValidationError,
};
use crate::git::GitCli;
use crate::github::{GitHubClient, models};
use crate::project::{Project, Service};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Settings for [`GithubSource`]
#[derive(Debug, Clone)]
pub struct GithubSourceConfig {
    /// REST API base URL
    pub api_url: String,
    /// Access token for the API and for cloning
    pub token: Option<String>,
    /// Reload service configuration from the resolved commit instead of the
    /// working copy
    pub checkout_project_at_commit: bool,
}

/// Resolves refs and reads CI results through the GitHub API
#[derive(Debug)]
pub struct GithubSource {
    project: Project,
    client: GitHubClient,
    config: GithubSourceConfig,
    /// Configuration loaded at the last checked out commit; a commit's tree
    /// never changes, so polling the same ref clones once
    checked_out: Mutex<Option<(GitHash, Project)>>,
}

impl GithubSource {
    /// Create a source for the project's repository
    pub fn new(project: Project, config: GithubSourceConfig) -> Result<Self> {
        let (owner, repo) = project.source_repo()?;
        let client = GitHubClient::new(&config.api_url, config.token.as_deref(), &owner, &repo)?;
        Ok(Self {
            project,
            client,
            config,
            checked_out: Mutex::new(None),
        })
    }

    /// Resolve a trunk name, pull request number or branch name to a commit
    pub async fn resolve(&self, reference: &str, cancel: &CancellationToken) -> Result<ResolvedRef> {
        if reference.is_empty() {
            return Err(ValidationError::MissingParameter {
                parameter: "ref".to_string(),
            }
            .into());
        }

        if reference == self.project.trunk {
            let branch = self
                .client
                .get_branch(reference, cancel)
                .await
                .map_err(|e| not_found_on_404(e, reference))?;
            let commit = branch.commit;

            return Ok(ResolvedRef {
                given_ref: reference.to_string(),
                commit: non_empty_hash(Some(commit.sha)),
                committed_by: commit.author.or(commit.committer).map(|u| u.login),
                pull_request: None,
            });
        }

        if let Ok(number) = reference.parse::<u64>() {
            let pr = self
                .client
                .get_pull_request(number, cancel)
                .await
                .map_err(|e| not_found_on_404(e, reference))?;
            return Ok(ref_for_pull_request(pr));
        }

        let prs = self
            .client
            .list_pull_requests_for_branch(reference, cancel)
            .await?;
        let pr = prs
            .into_iter()
            .next()
            .ok_or_else(|| NotFoundError::PullRequestForBranch {
                branch: reference.to_string(),
            })?;

        Ok(ref_for_pull_request(pr))
    }

    /// Per-service CI status of the newest workflow run for `commit`
    pub async fn checks(
        &self,
        commit: &GitHash,
        services: &[Service],
        cancel: &CancellationToken,
    ) -> Result<CheckSummary> {
        let suites = self.client.list_check_suites(commit.as_str(), cancel).await?;
        if suites.is_empty() {
            return Err(NotFoundError::CheckSuites {
                commit: commit.to_string(),
            }
            .into());
        }

        let mut runs = Vec::new();
        for suite in &suites {
            runs.extend(self.client.list_workflow_runs(suite.id, cancel).await?);
        }

        let run = latest_run(&runs).ok_or_else(|| NotFoundError::WorkflowRuns {
            commit: commit.to_string(),
        })?;
        log::debug!(
            "Using workflow run {} ({:?}) for {}",
            run.id,
            run.status,
            commit.short()
        );

        let jobs = self.client.list_workflow_jobs(run.id, cancel).await?;
        summarize(run, &jobs, services)
    }

    async fn project_at(&self, commit: &GitHash, cancel: &CancellationToken) -> Result<Project> {
        if let Ok(cached) = self.checked_out.lock()
            && let Some((hash, project)) = cached.as_ref()
            && hash == commit
        {
            return Ok(project.clone());
        }

        let git = GitCli::locate(self.config.token.clone())?;
        let checkout = git.clone_repo(&self.project.repo, None, cancel).await?;
        checkout.checkout(commit, cancel).await?;
        let project = Project::discover(checkout.path())?;
        log::debug!(
            "Loaded {} service(s) at {}",
            project.services.len(),
            commit.short()
        );

        if let Ok(mut cached) = self.checked_out.lock() {
            *cached = Some((commit.clone(), project.clone()));
        }
        Ok(project)
    }
}

impl Source for GithubSource {
    async fn get(
        &self,
        project: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<SourceSnapshot> {
        if project != self.project.name {
            return Err(ConflictError::ProjectMismatch {
                configured: self.project.name.clone(),
                requested: project.to_string(),
            }
            .into());
        }

        let resolved = self.resolve(reference, cancel).await?;
        let Some(commit) = resolved.commit.clone() else {
            log::info!("{} has no deployable commit yet", resolved.given_ref);
            return Ok(SourceSnapshot::not_ready(
                &self.project.name,
                &self.project.registry_prefix,
                resolved,
            ));
        };

        let at_commit = if self.config.checkout_project_at_commit {
            self.project_at(&commit, cancel).await?
        } else {
            self.project.clone()
        };

        let summary = self.checks(&commit, &at_commit.services, cancel).await?;

        let mut services = BTreeMap::new();
        for (name, build_status) in summary.statuses {
            if let Some(service) = at_commit.service(&name) {
                services.insert(
                    name,
                    SourceService {
                        service: service.clone(),
                        build_status,
                    },
                );
            }
        }

        Ok(SourceSnapshot {
            project: at_commit.name,
            registry_prefix: at_commit.registry_prefix,
            reference: resolved,
            services,
            checks_running: summary.running,
            checks_complete: summary.complete,
        })
    }
}

fn non_empty_hash(sha: Option<String>) -> Option<GitHash> {
    sha.filter(|s| !s.is_empty()).map(GitHash::new)
}

fn branch_commit(branch: models::PullRequestBranch) -> BranchCommit {
    BranchCommit {
        reference: branch.reference,
        hash: GitHash::new(branch.sha),
        username: branch.user.map(|u| u.login).unwrap_or_default(),
    }
}

fn ref_for_pull_request(pr: models::PullRequest) -> ResolvedRef {
    let merged = pr.is_merged();
    let merge_commit = if merged {
        non_empty_hash(pr.merge_commit_sha)
    } else {
        None
    };

    let pull_request = PullRequest {
        number: pr.number,
        title: pr.title,
        url: pr.html_url,
        head: branch_commit(pr.head),
        base: branch_commit(pr.base),
        merged,
        merged_at: pr.merged_at,
        merge_commit: merge_commit.clone(),
        merged_by: pr.merged_by.map(|u| u.login),
    };

    ResolvedRef {
        given_ref: format!("Pull Request #{}", pr.number),
        commit: merge_commit,
        committed_by: None,
        pull_request: Some(pull_request),
    }
}

fn not_found_on_404(err: ShipperError, reference: &str) -> ShipperError {
    match err {
        ShipperError::Transport(TransportError::Status { status: 404, .. }) => {
            NotFoundError::Ref {
                reference: reference.to_string(),
                reason: "no such branch or pull request".to_string(),
            }
            .into()
        }
        other => other,
    }
}
