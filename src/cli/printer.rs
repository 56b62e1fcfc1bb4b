//! Progress rendering for the deploy polling loop.

use super::OutputManager;
use crate::handler::{DeployResponse, DeployStatus, ServiceDeployStatus};
use crate::source::{BuildStatus, ResolvedRef};

/// Prints deploy responses as they arrive while the CLI polls.
///
/// The ref is described once; after that only services whose build status
/// changed are printed, so a one second poll does not flood the terminal.
#[derive(Debug)]
pub struct DeployPrinter<'a> {
    output: &'a OutputManager,
    described: bool,
    waiting_announced: bool,
    last: Vec<ServiceDeployStatus>,
}

impl<'a> DeployPrinter<'a> {
    /// Printer writing through `output`
    pub fn new(output: &'a OutputManager) -> Self {
        Self {
            output,
            described: false,
            waiting_announced: false,
            last: Vec::new(),
        }
    }

    /// Print a response. Returns true while the caller should poll again.
    pub fn print(&mut self, response: &DeployResponse) -> bool {
        if !self.described {
            self.described = true;
            self.describe_ref(&response.snapshot.reference);
        }

        match &response.status {
            DeployStatus::NotReady => {
                let _ = self.output.warn("Ref has no deployable commit");
                false
            }
            DeployStatus::ChecksPending => {
                if !self.waiting_announced {
                    self.waiting_announced = true;
                    let _ = self.output.progress("Waiting for checks to complete");
                }
                self.print_changed(&response.services);
                true
            }
            DeployStatus::ChecksFailed => {
                self.print_changed(&response.services);
                let _ = self.output.warn("Checks finished without success, nothing to deploy");
                false
            }
            DeployStatus::PlanReady => {
                self.print_plan(&response.services);
                false
            }
            DeployStatus::Committed { destination_commit } => {
                let _ = self
                    .output
                    .success(&format!("Deployment complete ({})", destination_commit.short()));
                false
            }
        }
    }

    fn describe_ref(&self, reference: &ResolvedRef) {
        let _ = self
            .output
            .info(&format!("Resolving ref as {}", reference.given_ref));

        if let Some(pr) = &reference.pull_request {
            let _ = self.output.indent(&format!("#{}: {}", pr.number, pr.title));
            if !pr.merged {
                let _ = self.output.warn("Pull request not merged, cannot deploy");
                return;
            }
            if let Some(commit) = &pr.merge_commit {
                let _ = self.output.indent(&format!(
                    "Merged into {} by {} → {}",
                    pr.base.reference,
                    pr.merged_by.as_deref().unwrap_or("unknown"),
                    commit
                ));
            }
        } else if let Some(commit) = &reference.commit {
            let _ = self.output.indent(&format!(
                "Commit {} by {}",
                commit,
                reference.committed_by.as_deref().unwrap_or("unknown")
            ));
        }
    }

    fn print_changed(&mut self, services: &[ServiceDeployStatus]) {
        let width = name_width(services);
        for svc in services {
            let changed = self
                .last
                .iter()
                .find(|s| s.name == svc.name)
                .is_none_or(|s| s.build_status != svc.build_status);
            if changed {
                let _ = self.output.indent(&format!(
                    "{:width$} {}",
                    svc.name,
                    svc.build_status
                ));
            }
        }
        self.last = services.to_vec();
    }

    fn print_plan(&self, services: &[ServiceDeployStatus]) {
        if services.is_empty() {
            let _ = self.output.warn("Nothing to deploy");
            return;
        }

        let _ = self.output.section("Ready to deploy");
        let width = name_width(services);
        for svc in services {
            let line = match (&svc.build_status, svc.next_version) {
                (BuildStatus::Complete { .. }, Some(next)) if svc.current_version == 0 => {
                    format!("{:width$} {next} (new)", svc.name)
                }
                (BuildStatus::Complete { .. }, Some(next)) => {
                    format!("{:width$} v{} → {next}", svc.name, svc.current_version)
                }
                (status, _) => format!("{:width$} {status}", svc.name),
            };
            let _ = self.output.item(&line);
        }
    }
}

fn name_width(services: &[ServiceDeployStatus]) -> usize {
    services.iter().map(|s| s.name.len()).max().unwrap_or(0) + 4
}
