//! Subset of the GitHub REST payloads used by shipper

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Account reference
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    /// Login name
    pub login: String,
}

/// `GET /repos/{owner}/{repo}/branches/{branch}`
#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    /// Branch name
    pub name: String,
    /// Head commit
    pub commit: BranchCommit,
}

/// Head commit of a branch
#[derive(Debug, Clone, Deserialize)]
pub struct BranchCommit {
    /// Commit hash
    pub sha: String,
    /// Linked author account, absent for unknown emails
    #[serde(default)]
    pub author: Option<User>,
    /// Linked committer account
    #[serde(default)]
    pub committer: Option<User>,
}

/// Head or base side of a pull request
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestBranch {
    /// Branch name
    #[serde(rename = "ref")]
    pub reference: String,
    /// Commit hash
    pub sha: String,
    /// Owner of the branch
    #[serde(default)]
    pub user: Option<User>,
}

/// Pull request as returned by both the single and list endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    /// Pull request number
    pub number: u64,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Browser URL
    #[serde(default)]
    pub html_url: String,
    /// Source branch
    pub head: PullRequestBranch,
    /// Target branch
    pub base: PullRequestBranch,
    /// Only present on the single pull request endpoint
    #[serde(default)]
    pub merged: Option<bool>,
    /// When the pull request was merged
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    /// Merge commit, also set as a test merge for open pull requests
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    /// Account that merged the pull request
    #[serde(default)]
    pub merged_by: Option<User>,
}

impl PullRequest {
    /// Merged state, derived from `merged_at` for list results
    pub fn is_merged(&self) -> bool {
        self.merged.unwrap_or(self.merged_at.is_some())
    }
}

/// `GET /repos/{owner}/{repo}/commits/{sha}/check-suites`
#[derive(Debug, Clone, Deserialize)]
pub struct CheckSuiteList {
    /// Total across pages
    #[serde(default)]
    pub total_count: u64,
    /// Suites on this page
    #[serde(default)]
    pub check_suites: Vec<CheckSuite>,
}

/// A check suite attached to a commit
#[derive(Debug, Clone, Deserialize)]
pub struct CheckSuite {
    /// Suite id
    pub id: u64,
    /// `queued`, `in_progress` or `completed`
    #[serde(default)]
    pub status: Option<String>,
    /// Final outcome once completed
    #[serde(default)]
    pub conclusion: Option<String>,
}

/// `GET /repos/{owner}/{repo}/actions/runs`
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunList {
    /// Total across pages
    #[serde(default)]
    pub total_count: u64,
    /// Runs on this page
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

/// A GitHub Actions workflow run
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    /// Run id
    pub id: u64,
    /// Workflow name
    #[serde(default)]
    pub name: Option<String>,
    /// `queued`, `in_progress`, `completed`, ...
    #[serde(default)]
    pub status: Option<String>,
    /// Final outcome once completed
    #[serde(default)]
    pub conclusion: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// `GET /repos/{owner}/{repo}/actions/runs/{id}/jobs`
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJobList {
    /// Total across pages
    #[serde(default)]
    pub total_count: u64,
    /// Jobs on this page
    #[serde(default)]
    pub jobs: Vec<WorkflowJob>,
}

/// A job inside a workflow run
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJob {
    /// Job id
    pub id: u64,
    /// Job name, carries the service name by convention
    pub name: String,
    /// `queued`, `in_progress`, `completed`, ...
    pub status: String,
    /// Final outcome once completed
    #[serde(default)]
    pub conclusion: Option<String>,
    /// When the job started
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job finished
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}
