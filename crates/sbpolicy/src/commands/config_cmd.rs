//! Config subcommand handlers.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use sbpolicy_config::{self as config, Config};
use sbpolicy_host::DiscoverySource;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util::{self, prompt_err};

fn target_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config::config_path)
}

fn render_toml(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|err| format!("# cannot render config: {err}"))
}

/// Walk the operator through the settings that differ between hosts.
fn prompt_config() -> Result<Config, CliError> {
    let mut cfg = Config::default();

    cfg.service.unit = Input::new()
        .with_prompt("sing-box systemd unit")
        .default(cfg.service.unit.clone())
        .interact_text()
        .map_err(prompt_err)?;

    cfg.service.sudo = Confirm::new()
        .with_prompt("Run systemctl, nft and privileged writes through sudo?")
        .default(cfg.service.sudo)
        .interact()
        .map_err(prompt_err)?;

    let proxy_config: String = Input::new()
        .with_prompt("sing-box config.json")
        .default(cfg.paths.proxy_config.display().to_string())
        .interact_text()
        .map_err(prompt_err)?;
    cfg.paths.proxy_config = proxy_config.into();

    let sources = &["dnsmasq leases", "Pi-hole API"];
    let selection = Select::new()
        .with_prompt("Where to discover LAN clients")
        .items(sources)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        let leases: String = Input::new()
            .with_prompt("Lease file")
            .default(cfg.paths.dhcp_leases.display().to_string())
            .interact_text()
            .map_err(prompt_err)?;
        cfg.paths.dhcp_leases = leases.into();
    } else {
        cfg.discovery.source = DiscoverySource::Pihole;
        cfg.discovery.pihole_url = Input::new()
            .with_prompt("Pi-hole API URL")
            .default(cfg.discovery.pihole_url.clone())
            .interact_text()
            .map_err(prompt_err)?;
    }

    cfg.validate()?;
    Ok(cfg)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load_config(global.config.as_deref())?;
            let out = output::render_single(&global.output, &cfg, render_toml, |_| {
                target_path(global).display().to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&target_path(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init => {
            let path = target_path(global);
            if path.exists()
                && !util::confirm(&format!("Overwrite {}?", path.display()), global.yes)?
            {
                return Ok(());
            }

            // --yes writes the stock layout without asking
            let cfg = if global.yes {
                Config::default()
            } else {
                eprintln!("sbpolicy configuration");
                eprintln!("   Config path: {}\n", path.display());
                prompt_config()?
            };

            if global.dry_run {
                output::print_output(&render_toml(&cfg), global.quiet);
                return Ok(());
            }

            let written = config::save_config(&cfg, Some(&path))?;
            if !global.quiet {
                eprintln!("Configuration written to {}", written.display());
                eprintln!("\n  Check it: sbpolicy vpn status");
            }
            Ok(())
        }
    }
}
