//! Command dispatch: bridges CLI args -> reconciler calls -> output formatting.

pub mod clients;
pub mod config_cmd;
pub mod domains;
pub mod service;
pub mod util;
pub mod vless;
pub mod vpn;

use sbpolicy_config::Config;
use sbpolicy_host::{Discovery, Nft, Reconciler, Systemd};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// The reconciler as wired from the config file.
pub type HostReconciler = Reconciler<Systemd, Nft, Discovery>;

/// Dispatch a host-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let reconciler = config.reconciler(global.dry_run)?;
    if global.dry_run && !global.quiet {
        output::dry_run_notice(output::should_color(&global.color));
    }

    match cmd {
        Command::Domains(args) => domains::handle(&reconciler, args, global).await,
        Command::Vpn(args) => vpn::handle(&reconciler, args, global).await,
        Command::Clients(args) => clients::handle(&reconciler, args, global).await,
        Command::Vless(args) => vless::handle(&reconciler, args, global).await,
        Command::Service(args) => service::handle(&reconciler, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
