//! Shared helper functions for command execution.

use crate::cli::Args;
use crate::destination::GitopsDestination;
use crate::error::{CliError, Result};
use crate::git::GitCli;
use crate::handler::Handler;
use crate::project::Project;
use crate::source::{GithubSource, GithubSourceConfig};
use std::io::BufRead;
use tokio_util::sync::CancellationToken;

/// Handler wired to GitHub and the gitops repository
pub(super) type LiveHandler = Handler<GithubSource, GitopsDestination>;

/// Load the project containing the working directory
pub(super) fn load_project() -> Result<Project> {
    let cwd = std::env::current_dir()?;
    Project::discover(&cwd)
}

/// Build the handler for `project` from the command line settings
pub(super) fn build_handler(args: &Args, project: Project) -> Result<LiveHandler> {
    let git = GitCli::locate(args.github_token.clone())?
        .with_identity(args.git_identity())
        .keep_scratch(args.keep_temp);
    let destination = GitopsDestination::new(&project, git);

    let name = project.name.clone();
    let source = GithubSource::new(
        project,
        GithubSourceConfig {
            api_url: args.github_api_url.clone(),
            token: args.github_token.clone(),
            checkout_project_at_commit: !args.no_checkout_project,
        },
    )?;

    Ok(Handler::new(name, source, destination))
}

/// Token cancelled when the user presses Ctrl-C
pub(super) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::debug!("Ctrl-C received, cancelling");
            child.cancel();
        }
    });
    token
}

/// Whether the answer is the literal `YES`
pub(super) fn is_confirmed(answer: &str) -> bool {
    answer.trim_end_matches(['\r', '\n']) == "YES"
}

/// Ask for confirmation; anything but `YES` aborts
pub(super) fn prompt_confirmation(prompt: &str) -> Result<()> {
    use std::io::Write;

    print!("{prompt} Type YES to continue: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;

    if is_confirmed(&input) {
        Ok(())
    } else {
        Err(CliError::Aborted.into())
    }
}
