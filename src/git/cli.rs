use super::{ScratchDir, authenticated_url};
use crate::error::{Result, TransportError};
use crate::source::GitHash;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Author recorded on gitops commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    /// Author name
    pub name: String,
    /// Author email
    pub email: String,
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            name: "shipper".to_string(),
            email: "shipper@localhost".to_string(),
        }
    }
}

/// Handle on the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: PathBuf,
    token: Option<String>,
    identity: GitIdentity,
    keep_scratch: bool,
}

impl GitCli {
    /// Find `git` on `PATH`
    pub fn locate(token: Option<String>) -> Result<Self> {
        let binary = which::which("git").map_err(|e| TransportError::GitMissing {
            reason: e.to_string(),
        })?;
        Ok(Self {
            binary,
            token,
            identity: GitIdentity::default(),
            keep_scratch: false,
        })
    }

    /// Commit as `identity`
    pub fn with_identity(mut self, identity: GitIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Leave scratch clones on disk
    pub fn keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }

    /// Clone `locator` into a fresh scratch directory
    pub async fn clone_repo(
        &self,
        locator: &str,
        depth: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<Checkout> {
        let url = authenticated_url(locator, self.token.as_deref())?;
        let mut scratch = ScratchDir::new("shipper-clone");
        if self.keep_scratch {
            scratch = scratch.keep();
        }

        let mut args = vec!["clone".to_string(), "--quiet".to_string()];
        if let Some(depth) = depth {
            args.push(format!("--depth={depth}"));
        }
        args.push(url.to_string());
        args.push(scratch.path().to_string_lossy().into_owned());

        log::debug!("Cloning {locator} into {}", scratch.path().display());
        let cwd = std::env::temp_dir();
        self.run("clone", &args, &cwd, cancel).await?;

        Ok(Checkout {
            git: self.clone(),
            dir: scratch,
        })
    }

    async fn run(
        &self,
        operation: &str,
        args: &[String],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            output = command.output() => output.map_err(|e| TransportError::Git {
                operation: operation.to_string(),
                reason: e.to_string(),
            })?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Git {
                operation: operation.to_string(),
                reason: self.redact(stderr.trim()),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn redact(&self, text: &str) -> String {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => text.replace(token, "***"),
            _ => text.to_string(),
        }
    }
}

/// A scratch clone. Dropping it deletes the directory.
#[derive(Debug)]
pub struct Checkout {
    git: GitCli,
    dir: ScratchDir,
}

impl Checkout {
    /// Working tree root
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    async fn git(&self, operation: &str, args: &[&str], cancel: &CancellationToken) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.git.run(operation, &args, self.path(), cancel).await
    }

    /// Detach the working tree at `commit`, fetching it if the clone lacks it
    pub async fn checkout(&self, commit: &GitHash, cancel: &CancellationToken) -> Result<()> {
        let probe = format!("{}^{{commit}}", commit.as_str());
        if self.git("cat-file", &["cat-file", "-e", &probe], cancel).await.is_err() {
            self.git("fetch", &["fetch", "--quiet", "origin", commit.as_str()], cancel)
                .await?;
        }
        self.git("checkout", &["checkout", "--quiet", "--detach", commit.as_str()], cancel)
            .await?;
        Ok(())
    }

    /// Stage every change under `pathspec`, including deletions
    pub async fn stage(&self, pathspec: &str, cancel: &CancellationToken) -> Result<()> {
        self.git("add", &["add", "--all", "--", pathspec], cancel).await?;
        Ok(())
    }

    /// Whether anything is staged
    pub async fn has_staged_changes(&self, cancel: &CancellationToken) -> Result<bool> {
        let status = self
            .git("status", &["status", "--porcelain", "--untracked-files=no"], cancel)
            .await?;
        Ok(!status.is_empty())
    }

    /// Commit staged changes and return the new head
    pub async fn commit(&self, message: &str, cancel: &CancellationToken) -> Result<GitHash> {
        let name = format!("user.name={}", self.git.identity.name);
        let email = format!("user.email={}", self.git.identity.email);
        self.git(
            "commit",
            &["-c", &name, "-c", &email, "commit", "--quiet", "-m", message],
            cancel,
        )
        .await?;
        self.head().await
    }

    /// Push the current branch to origin
    pub async fn push(&self, cancel: &CancellationToken) -> Result<()> {
        self.git("push", &["push", "--quiet", "origin", "HEAD"], cancel)
            .await?;
        Ok(())
    }

    /// Commit id of HEAD
    pub async fn head(&self) -> Result<GitHash> {
        let path = self.path().to_path_buf();
        let head = tokio::task::spawn_blocking(move || -> std::result::Result<String, String> {
            let repo = gix::open(&path).map_err(|e| e.to_string())?;
            let id = repo.head_id().map_err(|e| e.to_string())?;
            Ok(id.detach().to_string())
        })
        .await
        .map_err(|e| TransportError::Git {
            operation: "rev-parse".to_string(),
            reason: e.to_string(),
        })?
        .map_err(|reason| TransportError::Git {
            operation: "rev-parse".to_string(),
            reason,
        })?;

        Ok(GitHash::new(head))
    }
}
