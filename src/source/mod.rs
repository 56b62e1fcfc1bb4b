//! Source side of a deploy: what commit a ref points at and how CI went.
//!
//! A [`Source`] resolves a user supplied ref to an immutable commit and
//! reports one [`BuildStatus`] per service built for that commit. Every call
//! performs a fresh resolution; callers poll until checks settle.

mod checks;
mod github;

pub use checks::{CheckSummary, extract_service_name, latest_run, status_for_job, summarize};
pub use github::{GithubSource, GithubSourceConfig};

use crate::error::Result;
use crate::project::Service;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Full commit hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitHash(String);

impl GitHash {
    /// Wrap a hash string
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Full hash
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First seven characters, used as the image tag
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for GitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One side of a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchCommit {
    /// Branch name
    pub reference: String,
    /// Commit at the time of the lookup
    pub hash: GitHash,
    /// Branch owner
    pub username: String,
}

/// Pull request metadata attached to a resolved ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Number
    pub number: u64,
    /// Title
    pub title: String,
    /// Browser URL
    pub url: String,
    /// Source branch
    pub head: BranchCommit,
    /// Target branch
    pub base: BranchCommit,
    /// Whether it has been merged
    pub merged: bool,
    /// When it was merged
    pub merged_at: Option<DateTime<Utc>>,
    /// Merge commit, set only once merged
    pub merge_commit: Option<GitHash>,
    /// Account that merged it
    pub merged_by: Option<String>,
}

/// A ref resolved against the source repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    /// Human readable description of what was resolved
    pub given_ref: String,
    /// Commit to deploy; `None` means not deployable yet
    pub commit: Option<GitHash>,
    /// Author of the trunk head commit
    pub committed_by: Option<String>,
    /// Pull request the ref resolved through
    pub pull_request: Option<PullRequest>,
}

/// CI outcome for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// Job waiting for a runner
    Queued,
    /// Job in progress
    Running {
        /// When the job started
        started_at: Option<DateTime<Utc>>,
    },
    /// Job finished successfully
    Complete {
        /// When the job started
        started_at: Option<DateTime<Utc>>,
        /// When the job finished
        finished_at: Option<DateTime<Utc>>,
    },
    /// Job finished unsuccessfully or reported an unknown status
    Failed {
        /// Raw conclusion or status
        reason: String,
    },
}

impl BuildStatus {
    /// Whether the service's image is ready to deploy
    pub fn is_complete(&self) -> bool {
        matches!(self, BuildStatus::Complete { .. })
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Queued => f.write_str("queued"),
            BuildStatus::Running { .. } => f.write_str("running"),
            BuildStatus::Complete { .. } => f.write_str("complete"),
            BuildStatus::Failed { reason } => write!(f, "failed - {reason}"),
        }
    }
}

/// Service configuration at the resolved commit plus its build status
#[derive(Debug, Clone)]
pub struct SourceService {
    /// Configuration
    pub service: Service,
    /// CI outcome
    pub build_status: BuildStatus,
}

/// Everything known about a ref at one point in time
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    /// Project name
    pub project: String,
    /// Registry prefix for images built from this commit
    pub registry_prefix: String,
    /// Resolution result
    pub reference: ResolvedRef,
    /// Services built for the commit, keyed by name
    pub services: BTreeMap<String, SourceService>,
    /// The workflow run has not finished
    pub checks_running: bool,
    /// The workflow run finished successfully
    pub checks_complete: bool,
}

impl SourceSnapshot {
    /// Snapshot for a ref that has no deployable commit yet
    pub fn not_ready(project: &str, registry_prefix: &str, reference: ResolvedRef) -> Self {
        Self {
            project: project.to_string(),
            registry_prefix: registry_prefix.to_string(),
            reference,
            services: BTreeMap::new(),
            checks_running: false,
            checks_complete: false,
        }
    }
}

/// Version control and CI backend
pub trait Source {
    /// Resolve `reference` for `project` and collect CI status for the commit
    fn get(
        &self,
        project: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<SourceSnapshot>>;
}
