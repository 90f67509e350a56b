//! Client override command handlers.

use chrono::DateTime;
use serde::Serialize;
use tabled::Tabled;

use sbpolicy_core::{ClientPatch, ClientRecord};
use sbpolicy_host::DiscoveredClient;

use crate::cli::{ClientsArgs, ClientsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{HostReconciler, util};

// ── Table rows ──────────────────────────────────────────────────────

/// A stored client keyed by its id, flattened for listing.
#[derive(Debug, Serialize)]
struct ClientEntry {
    id: String,
    #[serde(flatten)]
    record: ClientRecord,
}

#[derive(Tabled)]
struct ClientRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Force VPN")]
    force_vpn: String,
    #[tabled(rename = "Force UDP")]
    force_udp_vpn: String,
}

impl From<&ClientEntry> for ClientRow {
    fn from(c: &ClientEntry) -> Self {
        Self {
            id: c.id.clone(),
            name: c.record.name.clone().unwrap_or_default(),
            ip: c.record.ip.clone().unwrap_or_default(),
            force_vpn: util::yes_no(c.record.forces_vpn()),
            force_udp_vpn: util::yes_no(c.record.forces_udp_vpn()),
        }
    }
}

#[derive(Tabled)]
struct DiscoveredRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "Lease Expires")]
    expires: String,
}

impl From<&DiscoveredClient> for DiscoveredRow {
    fn from(c: &DiscoveredClient) -> Self {
        Self {
            mac: c.mac.clone(),
            ip: c.ip.clone(),
            hostname: c.hostname.clone(),
            expires: c
                .expires
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .map_or_else(|| "-".into(), |dt| dt.format("%Y-%m-%d %H:%M").to_string()),
        }
    }
}

fn record_detail(entry: &ClientEntry) -> String {
    let r = &entry.record;
    [
        format!("ID:        {}", entry.id),
        format!("Name:      {}", r.name.as_deref().unwrap_or("-")),
        format!("IP:        {}", r.ip.as_deref().unwrap_or("-")),
        format!("Force VPN: {}", util::yes_no(r.forces_vpn())),
        format!("Force UDP: {}", util::yes_no(r.forces_udp_vpn())),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    reconciler: &HostReconciler,
    args: ClientsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = match args.command {
        ClientsCommand::List => {
            let policy = reconciler.clients().await?;
            let entries: Vec<ClientEntry> = policy
                .clients
                .into_iter()
                .map(|(id, record)| ClientEntry { id, record })
                .collect();
            output::render_list(
                &global.output,
                &entries,
                |c| ClientRow::from(c),
                |c| c.id.clone(),
            )
        }

        ClientsCommand::Discover => {
            let clients = reconciler.discover().await?;
            output::render_list(
                &global.output,
                &clients,
                |c| DiscoveredRow::from(c),
                |c| c.ip.clone(),
            )
        }

        ClientsCommand::Set {
            id,
            name,
            ip,
            force_vpn,
            force_udp_vpn,
        } => {
            let patch = ClientPatch {
                name,
                ip,
                force_vpn,
                force_udp_vpn,
            };
            if patch.is_empty() {
                return Err(CliError::Validation {
                    field: "client".into(),
                    reason: "pass at least one of --name, --ip, --force-vpn, --force-udp-vpn"
                        .into(),
                });
            }
            let record = reconciler.update_client(&id, patch).await?;
            let entry = ClientEntry {
                id: id.trim().to_owned(),
                record,
            };
            output::render_single(&global.output, &entry, record_detail, |c| c.id.clone())
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
