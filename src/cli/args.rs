//! Command line argument parsing and validation.

use crate::destination::Version;
use crate::git::GitIdentity;
use crate::github::DEFAULT_API_URL;
use clap::{Parser, Subcommand};

/// Deploy, release and remove services through a gitops repository
#[derive(Parser, Debug)]
#[command(
    name = "shipper",
    version,
    about = "Deploy, release and remove services through a gitops repository",
    long_about = "Promote a change through deploy, release and remove by writing annotated
Kubernetes manifests to a gitops repository.

Usage:
  shipper deploy main
  shipper deploy 123
  shipper deploy feature/foo
  shipper release service.foo
  shipper rm service.foo v1
  shipper ci list-services --changed-file-filter \"services/foo/main.go\""
)]
pub struct Args {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// GitHub token used for the API and for cloning
    #[arg(long, env = "SHIPPER_GITHUB_TOKEN", global = true, hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, env = "SHIPPER_GITHUB_API_URL", global = true, default_value = DEFAULT_API_URL)]
    pub github_api_url: String,

    /// Author name for gitops commits
    #[arg(long, env = "SHIPPER_GIT_AUTHOR_NAME", global = true)]
    pub git_author_name: Option<String>,

    /// Author email for gitops commits
    #[arg(long, env = "SHIPPER_GIT_AUTHOR_EMAIL", global = true)]
    pub git_author_email: Option<String>,

    /// Keep scratch clones on disk for debugging
    #[arg(long, global = true)]
    pub keep_temp: bool,

    /// Use the local service configuration instead of the one at the deployed commit
    #[arg(long, global = true)]
    pub no_checkout_project: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate manifests for a ref and push them to the gitops repository
    Deploy {
        /// Trunk branch, pull request number or branch name
        #[arg(value_name = "REF")]
        reference: String,
    },

    /// Route traffic to a deployed version
    Release {
        /// Service to release, e.g. service.foo
        service: String,

        /// Version to release instead of the latest
        #[arg(long)]
        version: Option<Version>,
    },

    /// Remove a deployed version from the gitops repository
    #[command(alias = "rm")]
    Remove {
        /// Service to remove a version of
        service: String,

        /// Version to remove, e.g. v1
        version: Version,
    },

    /// CI helper commands
    Ci {
        /// CI subcommand
        #[command(subcommand)]
        command: CiCommand,
    },
}

impl Command {
    /// Name of the command for messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Deploy { .. } => "deploy",
            Command::Release { .. } => "release",
            Command::Remove { .. } => "remove",
            Command::Ci { .. } => "ci",
        }
    }

    /// Whether the command reads or writes remote state
    pub fn needs_remote(&self) -> bool {
        !matches!(self, Command::Ci { .. })
    }
}

/// CI helper subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CiCommand {
    /// Print the services to build as JSON
    ListServices {
        /// Space separated changed files; only services containing one are listed
        #[arg(long, default_value = "")]
        changed_file_filter: String,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.command.needs_remote()
            && self
                .github_token
                .as_deref()
                .is_none_or(|t| t.trim().is_empty())
        {
            return Err(
                "a GitHub token is required, pass --github-token or set SHIPPER_GITHUB_TOKEN"
                    .to_string(),
            );
        }

        if let Command::Deploy { reference } = &self.command
            && reference.trim().is_empty()
        {
            return Err("ref must not be empty".to_string());
        }

        Ok(())
    }

    /// Author for gitops commits, falling back to the defaults
    pub fn git_identity(&self) -> GitIdentity {
        let defaults = GitIdentity::default();
        GitIdentity {
            name: self.git_author_name.clone().unwrap_or(defaults.name),
            email: self.git_author_email.clone().unwrap_or(defaults.email),
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new() -> Self {
        Self {
            output: super::OutputManager::new(false),
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
