//! Proxy service command handlers.

use sbpolicy_host::ServiceStatus;

use crate::cli::{GlobalOpts, ServiceArgs, ServiceCommand};
use crate::error::CliError;
use crate::output;

use super::HostReconciler;

pub async fn handle(
    reconciler: &HostReconciler,
    args: ServiceArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let ServiceCommand::Restart = args.command {
        reconciler.restart().await?;
    }

    let status: ServiceStatus = reconciler.status().await;
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &status,
        |s| output::flag(s.active, &s.status, &s.status, color),
        |s| s.status.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
