//! Release command implementation.

use super::helpers::{LiveHandler, prompt_confirmation};
use crate::cli::RuntimeConfig;
use crate::destination::Version;
use crate::error::Result;
use crate::handler::ReleaseParams;
use tokio_util::sync::CancellationToken;

/// Execute release command
pub(super) async fn execute_release(
    handler: &LiveHandler,
    service: &str,
    version: Option<Version>,
    config: &RuntimeConfig,
    cancel: &CancellationToken,
) -> Result<i32> {
    let mut params = ReleaseParams {
        service: service.to_string(),
        version,
        confirm: false,
    };

    let plan = handler.release(&params, cancel).await?;
    if plan.done {
        config.success_println(&format!(
            "{} {} is already released",
            plan.service, plan.version
        ));
        return Ok(0);
    }

    let current = plan
        .current_release
        .map_or_else(|| "nothing".to_string(), |v| v.to_string());
    config.println(&format!(
        "Release {} {} (currently {current})",
        plan.service, plan.version
    ));
    prompt_confirmation(&format!("Release {} @ {}?", plan.service, plan.version))?;

    params.version = Some(plan.version);
    params.confirm = true;
    let released = handler.release(&params, cancel).await?;

    if released.done {
        config.success_println(&format!("Released {} {}", released.service, released.version));
    }
    Ok(0)
}
