//! Thin GitHub REST client scoped to one repository

use super::models::{
    Branch, CheckSuite, CheckSuiteList, PullRequest, WorkflowJob, WorkflowJobList, WorkflowRun,
    WorkflowRunList,
};
use crate::error::{Result, TransportError, ValidationError};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

/// Public GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

/// Upper bound on pages fetched for any listing
const MAX_PAGES: usize = 10;

/// GitHub API client for a single `owner/repo`
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Create a client. `token` is sent as a bearer token when present.
    pub fn new(api_url: &str, token: Option<&str>, owner: &str, repo: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                ValidationError::InvalidParameter {
                    parameter: "github token".to_string(),
                    reason: e.to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("shipper/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|source| TransportError::Http {
                url: api_url.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_url, self.owner, self.repo, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T> {
        let url = self.url(path);
        log::debug!("GET {url} {query:?}");

        let request = self.http.get(&url).query(query).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            response = request => response.map_err(|source| TransportError::Http {
                url: url.clone(),
                source,
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
                body = response.text() => body.unwrap_or_default(),
            };
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            body = response.json::<T>() => body,
        };
        Ok(body.map_err(|source| TransportError::Http { url, source })?)
    }

    async fn get_pages<W, T>(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
        items: fn(W) -> Vec<T>,
    ) -> Result<Vec<T>>
    where
        W: DeserializeOwned,
    {
        let mut out = Vec::new();
        for page in 1..=MAX_PAGES {
            let mut paged = query.to_vec();
            paged.push(("per_page", PER_PAGE.to_string()));
            paged.push(("page", page.to_string()));

            let batch = items(self.get_json::<W>(path, &paged, cancel).await?);
            let done = batch.len() < PER_PAGE;
            out.extend(batch);
            if done {
                break;
            }
        }
        Ok(out)
    }

    /// Branch head
    pub async fn get_branch(&self, branch: &str, cancel: &CancellationToken) -> Result<Branch> {
        self.get_json(&format!("/branches/{branch}"), &[], cancel).await
    }

    /// Single pull request by number
    pub async fn get_pull_request(
        &self,
        number: u64,
        cancel: &CancellationToken,
    ) -> Result<PullRequest> {
        self.get_json(&format!("/pulls/{number}"), &[], cancel).await
    }

    /// Open pull requests whose head is `owner:branch`
    pub async fn list_pull_requests_for_branch(
        &self,
        branch: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PullRequest>> {
        let head = format!("{}:{}", self.owner, branch);
        self.get_json("/pulls", &[("head", head), ("state", "open".to_string())], cancel)
            .await
    }

    /// Check suites attached to a commit
    pub async fn list_check_suites(
        &self,
        sha: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<CheckSuite>> {
        self.get_pages(
            &format!("/commits/{sha}/check-suites"),
            &[],
            cancel,
            |list: CheckSuiteList| list.check_suites,
        )
        .await
    }

    /// Workflow runs started by a check suite
    pub async fn list_workflow_runs(
        &self,
        check_suite_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkflowRun>> {
        self.get_pages(
            "/actions/runs",
            &[("check_suite_id", check_suite_id.to_string())],
            cancel,
            |list: WorkflowRunList| list.workflow_runs,
        )
        .await
    }

    /// Jobs of a workflow run
    pub async fn list_workflow_jobs(
        &self,
        run_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkflowJob>> {
        self.get_pages(
            &format!("/actions/runs/{run_id}/jobs"),
            &[],
            cancel,
            |list: WorkflowJobList| list.jobs,
        )
        .await
    }
}
