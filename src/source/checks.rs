//! Correlation of CI jobs to services

use super::BuildStatus;
use crate::error::{ConflictError, Result};
use crate::github::models::{WorkflowJob, WorkflowRun};
use crate::project::Service;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static SERVICE_IN_JOB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(service\.[a-zA-Z0-9\-\.]+)").expect("service job regex is valid")
});

/// Reduced view of a workflow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSummary {
    /// Run has not reached `completed`
    pub running: bool,
    /// Run concluded with `success`
    pub complete: bool,
    /// Status per service that has exactly one job
    pub statuses: BTreeMap<String, BuildStatus>,
}

/// Service name embedded in a CI job name, if any
pub fn extract_service_name(job_name: &str) -> Option<&str> {
    SERVICE_IN_JOB_RE.find(job_name).map(|m| m.as_str())
}

/// Map a job's status and conclusion to a [`BuildStatus`]
pub fn status_for_job(job: &WorkflowJob) -> BuildStatus {
    match job.status.as_str() {
        "queued" => BuildStatus::Queued,
        "in_progress" => BuildStatus::Running {
            started_at: job.started_at,
        },
        "completed" => match job.conclusion.as_deref() {
            Some("success") => BuildStatus::Complete {
                started_at: job.started_at,
                finished_at: job.completed_at,
            },
            Some(conclusion) => BuildStatus::Failed {
                reason: conclusion.to_string(),
            },
            None => BuildStatus::Failed {
                reason: job.status.clone(),
            },
        },
        other => BuildStatus::Failed {
            reason: other.to_string(),
        },
    }
}

/// Most recently created run, ties broken by id
pub fn latest_run(runs: &[WorkflowRun]) -> Option<&WorkflowRun> {
    runs.iter().max_by_key(|run| (run.created_at, run.id))
}

/// Reduce a run and its jobs to per-service statuses.
///
/// Services without a job are left out. Two jobs naming the same service is
/// a conflict rather than a guess.
pub fn summarize(run: &WorkflowRun, jobs: &[WorkflowJob], services: &[Service]) -> Result<CheckSummary> {
    let mut statuses = BTreeMap::new();

    for service in services {
        let mut matched = jobs
            .iter()
            .filter(|job| extract_service_name(&job.name) == Some(service.name.as_str()));

        let Some(job) = matched.next() else {
            continue;
        };
        if matched.next().is_some() {
            return Err(ConflictError::DuplicateJobs {
                service: service.name.clone(),
            }
            .into());
        }

        statuses.insert(service.name.clone(), status_for_job(job));
    }

    Ok(CheckSummary {
        running: run.status.as_deref() != Some("completed"),
        complete: run.conclusion.as_deref() == Some("success"),
        statuses,
    })
}
