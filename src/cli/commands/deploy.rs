//! Deploy command implementation.
//!
//! Polls the handler once a second until CI settles, shows the plan, asks
//! for confirmation and submits the plan exactly as shown.

use super::helpers::{LiveHandler, prompt_confirmation};
use crate::cli::{DeployPrinter, RuntimeConfig};
use crate::error::{Result, TransportError};
use crate::handler::{DeployParams, DeployStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Execute deploy command
pub(super) async fn execute_deploy(
    handler: &LiveHandler,
    reference: &str,
    config: &RuntimeConfig,
    cancel: &CancellationToken,
) -> Result<i32> {
    let mut params = DeployParams {
        reference: reference.to_string(),
        confirm: None,
    };
    let mut printer = DeployPrinter::new(config.output());

    let plan = loop {
        let response = handler.deploy(&params, cancel).await?;
        if !printer.print(&response) {
            break response;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(TransportError::Cancelled.into());
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    };

    match plan.status {
        DeployStatus::PlanReady => {}
        DeployStatus::ChecksFailed => return Ok(1),
        _ => return Ok(0),
    }
    let Some(confirm) = plan.confirmation() else {
        return Ok(0);
    };

    prompt_confirmation("Deploy to production?")?;

    params.confirm = Some(confirm);
    let committed = handler.deploy(&params, cancel).await?;
    printer.print(&committed);

    let code = confirmed_exit_code(&committed.status);
    if code != 0 {
        config.error_println("Nothing was deployed: CI state changed after the plan was shown");
    }
    Ok(code)
}

/// Only a destination commit counts as a finished deploy
fn confirmed_exit_code(status: &DeployStatus) -> i32 {
    match status {
        DeployStatus::Committed { .. } => 0,
        _ => 1,
    }
}
