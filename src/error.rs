//! Error types for shipper operations.
//!
//! Every failure surfaced by the core falls into one of four families that
//! callers can act on: validation (fix the input), not found (fix the target),
//! conflict (re-run plan and confirm) and transport (retry the whole command).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shipper operations
pub type Result<T> = std::result::Result<T, ShipperError>;

/// Main error type for all shipper operations
#[derive(Error, Debug)]
pub enum ShipperError {
    /// Missing or malformed input, raised before any I/O
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Something the operation needs does not exist
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    /// The world disagrees with the plan
    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Network, subprocess or cancellation failures
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Project or service configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Destination ledger could not be read
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Manifest bundle could not be written
    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Input validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Required parameter was not supplied
    #[error("missing required parameter: {parameter}")]
    MissingParameter {
        /// Parameter name
        parameter: String,
    },

    /// Parameter was supplied but could not be used
    #[error("invalid {parameter}: {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Reason for the error
        reason: String,
    },

    /// Confirmation named no services
    #[error("confirmation does not request any services")]
    EmptyBatch,
}

/// Lookup failures
#[derive(Error, Debug)]
pub enum NotFoundError {
    /// Reference did not resolve to anything
    #[error("ref '{reference}' could not be resolved: {reason}")]
    Ref {
        /// Reference as given
        reference: String,
        /// Reason for the error
        reason: String,
    },

    /// No open pull request has the branch as its head
    #[error("no pull requests found for branch '{branch}'")]
    PullRequestForBranch {
        /// Branch name
        branch: String,
    },

    /// Service is not in the destination ledger
    #[error("service '{service}' not found")]
    Service {
        /// Service name
        service: String,
    },

    /// Service confirmed for deploy is not part of the build
    #[error("service '{service}' not found in source")]
    ServiceNotInSource {
        /// Service name
        service: String,
    },

    /// Version is not in the service's deploy ledger
    #[error("version {version} of '{service}' not found")]
    Version {
        /// Service name
        service: String,
        /// Version requested
        version: String,
    },

    /// Service has never been deployed
    #[error("no deploys found for service '{service}'")]
    NoDeploys {
        /// Service name
        service: String,
    },

    /// CI has not started for the commit
    #[error("no check suites found for commit {commit}")]
    CheckSuites {
        /// Commit hash
        commit: String,
    },

    /// No workflow runs are attached to the commit's check suites
    #[error("no workflow runs found for commit {commit}")]
    WorkflowRuns {
        /// Commit hash
        commit: String,
    },

    /// No project file in the directory or any parent
    #[error("{file} not found in {start} or any parent directory")]
    ProjectConfig {
        /// File name searched for
        file: String,
        /// Directory the search started from
        start: PathBuf,
    },

    /// Deploy template directory has no templates
    #[error("no deploy templates found in {path}")]
    Template {
        /// Template directory
        path: PathBuf,
    },
}

/// Disagreements between a plan and the current state of the world
#[derive(Error, Debug)]
pub enum ConflictError {
    /// More than one CI job correlates to the same service
    #[error("duplicate workflow jobs for service {service}")]
    DuplicateJobs {
        /// Service name
        service: String,
    },

    /// Deploy bundle for the version is already in the ledger
    #[error("version {version} of '{service}' already exists")]
    VersionExists {
        /// Service name
        service: String,
        /// Version that exists
        version: String,
    },

    /// Ref now resolves to a different commit than the one confirmed
    #[error("source commit {current} does not match confirmed commit {confirmed}")]
    CommitMoved {
        /// Commit in the confirmation
        confirmed: String,
        /// Commit the ref resolves to now
        current: String,
    },

    /// Another deploy advanced the ledger after the plan was shown
    #[error("service '{service}' expected version {expected} but {requested} was requested")]
    VersionDrift {
        /// Service name
        service: String,
        /// Freshly computed next version
        expected: String,
        /// Version from the confirmation
        requested: String,
    },

    /// Removing the version that is currently released
    #[error("active version cannot be removed: {service} {version}")]
    ActiveVersion {
        /// Service name
        service: String,
        /// Active version
        version: String,
    },

    /// Releasing the version that is already active
    #[error("version {version} of '{service}' is already active")]
    AlreadyReleased {
        /// Service name
        service: String,
        /// Active version
        version: String,
    },

    /// Operation names a project this backend was not set up for
    #[error("project '{requested}' not supported, configured for '{configured}'")]
    ProjectMismatch {
        /// Project the backend was built for
        configured: String,
        /// Project named by the caller
        requested: String,
    },
}

/// Outbound call failures
#[derive(Error, Debug)]
pub enum TransportError {
    /// Operation was cancelled before it finished
    #[error("operation cancelled")]
    Cancelled,

    /// HTTP request could not be completed
    #[error("request to {url} failed: {source}")]
    Http {
        /// Requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// API answered with an unexpected status
    #[error("{url} returned {status}: {body}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Git executable is not installed
    #[error("git executable not found: {reason}")]
    GitMissing {
        /// Reason for the error
        reason: String,
    },

    /// Git subcommand failed
    #[error("git {operation} failed: {reason}")]
    Git {
        /// Git subcommand
        operation: String,
        /// Reason for the error
        reason: String,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be parsed
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Field value is unusable
    #[error("invalid '{field}' in {path}: {reason}")]
    InvalidField {
        /// Config file path
        path: PathBuf,
        /// Field name
        field: String,
        /// Reason for the error
        reason: String,
    },

    /// Service search path is not a valid glob
    #[error("invalid service path pattern '{pattern}': {reason}")]
    Pattern {
        /// Pattern as configured
        pattern: String,
        /// Reason for the error
        reason: String,
    },

    /// Repository locator is not a github.com/org/repo form
    #[error("repository '{repo}' must be of the form github.com/org/repo")]
    Repository {
        /// Repository as configured
        repo: String,
    },
}

/// Destination ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Artifact file could not be read or parsed
    #[error("failed to read artifact {path}: {reason}")]
    UnreadableArtifact {
        /// Artifact path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Latest deploy already carries the highest representable version
    #[error("{service} has reached {latest}, no further version can be deployed")]
    VersionsExhausted {
        /// Service name
        service: String,
        /// Highest deployed version
        latest: String,
    },
}

/// Manifest bundle errors
#[derive(Error, Debug)]
pub enum BundleError {
    /// Service name cannot be turned into a resource name
    #[error("cannot slugify service name '{name}': {reason}")]
    Slug {
        /// Service name
        name: String,
        /// Reason for the error
        reason: String,
    },

    /// Template failed to parse or render
    #[error("failed to render template {template}: {reason}")]
    Render {
        /// Template name
        template: String,
        /// Reason for the error
        reason: String,
    },

    /// Rendered deploy bundle would be invisible to the ledger
    #[error("template {template} does not carry deploy annotations for {service} {version}")]
    MissingAnnotations {
        /// Template name
        template: String,
        /// Service name
        service: String,
        /// Version rendered
        version: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Operator declined the confirmation prompt
    #[error("aborted: only YES is accepted")]
    Aborted,
}

impl ShipperError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ShipperError::Conflict(ConflictError::CommitMoved { .. })
            | ShipperError::Conflict(ConflictError::VersionDrift { .. }) => vec![
                "Another change landed after the plan was shown".to_string(),
                "Re-run the command to build a fresh plan and confirm again".to_string(),
            ],
            ShipperError::Conflict(ConflictError::DuplicateJobs { service }) => vec![
                format!("Rename CI jobs so exactly one job name contains '{service}'"),
            ],
            ShipperError::Conflict(ConflictError::ActiveVersion { service, .. }) => vec![
                format!("Release another version of {service} first: shipper release {service}"),
            ],
            ShipperError::NotFound(NotFoundError::CheckSuites { .. })
            | ShipperError::NotFound(NotFoundError::WorkflowRuns { .. }) => vec![
                "CI has not started for this commit yet, wait and retry".to_string(),
            ],
            ShipperError::NotFound(NotFoundError::ProjectConfig { file, .. }) => vec![
                format!("Run from a directory containing {file} or one of its children"),
            ],
            ShipperError::Transport(TransportError::Status { status: 401, .. })
            | ShipperError::Transport(TransportError::Status { status: 403, .. }) => vec![
                "Check that SHIPPER_GITHUB_TOKEN is set and has repo scope".to_string(),
            ],
            ShipperError::Transport(TransportError::GitMissing { .. }) => vec![
                "Install git and make sure it is on PATH".to_string(),
            ],
            ShipperError::Transport(_) => vec![
                "No destination changes were pushed, the command is safe to retry".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if re-running the same command may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ShipperError::Transport(_)
                | ShipperError::Conflict(ConflictError::CommitMoved { .. })
                | ShipperError::Conflict(ConflictError::VersionDrift { .. })
                | ShipperError::NotFound(NotFoundError::CheckSuites { .. })
                | ShipperError::NotFound(NotFoundError::WorkflowRuns { .. })
        )
    }
}
