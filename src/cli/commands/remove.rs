//! Remove command implementation.

use super::helpers::{LiveHandler, prompt_confirmation};
use crate::cli::RuntimeConfig;
use crate::destination::Version;
use crate::error::Result;
use crate::handler::RemoveParams;
use tokio_util::sync::CancellationToken;

/// Execute remove command
pub(super) async fn execute_remove(
    handler: &LiveHandler,
    service: &str,
    version: Version,
    config: &RuntimeConfig,
    cancel: &CancellationToken,
) -> Result<i32> {
    let mut params = RemoveParams {
        service: service.to_string(),
        version: Some(version),
        confirm: false,
    };

    let plan = handler.remove(&params, cancel).await?;
    prompt_confirmation(&format!("Remove {} @ {}?", plan.service, plan.version))?;

    params.confirm = true;
    let removed = handler.remove(&params, cancel).await?;

    if removed.done {
        config.success_println(&format!("Removed {} {}", removed.service, removed.version));
    }
    Ok(0)
}
