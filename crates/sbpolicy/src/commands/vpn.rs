//! VPN switch command handlers.

use sbpolicy_core::VpnPolicy;
use sbpolicy_host::VpnReport;

use crate::cli::{GlobalOpts, PolicyArg, VpnArgs, VpnCommand};
use crate::error::CliError;
use crate::output;

use super::HostReconciler;

impl From<PolicyArg> for VpnPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Domains => Self::Domains,
            PolicyArg::All => Self::All,
        }
    }
}

fn report_detail(report: &VpnReport, color: bool) -> String {
    let policy = if report.enabled {
        report.policy.to_string()
    } else {
        "-".into()
    };
    [
        output::detail_line("VPN", output::flag(report.enabled, "on", "off", color), color),
        output::detail_line("Policy", policy, color),
        output::detail_line(
            "Service",
            output::flag(report.active, &report.status, &report.status, color),
            color,
        ),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    reconciler: &HostReconciler,
    args: VpnArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let report = match args.command {
        VpnCommand::Status => reconciler.vpn_state().await?,
        VpnCommand::On { policy } => reconciler.set_vpn(true, policy.into()).await?,
        // The policy is not kept once the VPN is off
        VpnCommand::Off => reconciler.set_vpn(false, VpnPolicy::default()).await?,
    };

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| report_detail(r, color),
        |r| if r.enabled { "on" } else { "off" }.to_owned(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
