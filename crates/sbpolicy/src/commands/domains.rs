//! Domain group command handlers.

use serde::Serialize;
use tabled::Tabled;

use sbpolicy_core::{DomainGroup, DomainPolicy, FlatRuleset, domains};
use sbpolicy_host::DomainsApplied;

use crate::cli::{DomainsArgs, DomainsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{HostReconciler, util};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Domains")]
    domains: usize,
}

impl From<&DomainGroup> for GroupRow {
    fn from(g: &DomainGroup) -> Self {
        Self {
            id: g.id.clone(),
            name: g.name.clone(),
            enabled: util::yes_no(g.enabled),
            domains: g.domains.len(),
        }
    }
}

/// What a policy change left behind.
#[derive(Debug, Serialize)]
struct Summary {
    groups: usize,
    enabled_groups: usize,
    domains: usize,
}

impl Summary {
    fn new(policy: &DomainPolicy, ruleset: &FlatRuleset) -> Self {
        Self {
            groups: policy.groups.len(),
            enabled_groups: policy.groups.iter().filter(|g| g.enabled).count(),
            domains: ruleset.domain_count(),
        }
    }
}

impl From<&DomainsApplied> for Summary {
    fn from(applied: &DomainsApplied) -> Self {
        Self::new(&applied.policy, &applied.ruleset)
    }
}

fn summary_detail(s: &Summary) -> String {
    format!(
        "{} of {} groups enabled, {} domains in vpn-domains",
        s.enabled_groups, s.groups, s.domains
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    reconciler: &HostReconciler,
    args: DomainsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = match args.command {
        DomainsCommand::Show => {
            let policy = reconciler.domains().await?;
            output::render_list(
                &global.output,
                &policy.groups,
                |g| GroupRow::from(g),
                |g| g.id.clone(),
            )
        }

        DomainsCommand::Apply { file } => {
            let document = util::read_json_file(&file)?;
            let applied = reconciler.apply_domains(&document).await?;
            let summary = Summary::from(&applied);
            output::render_single(&global.output, &summary, summary_detail, |s| {
                s.domains.to_string()
            })
        }

        DomainsCommand::Compile { file } => {
            let document = util::read_json_file(&file)?;
            let ruleset = domains::compile(&domains::prepare(&document)?);
            output::render_single(&global.output, &ruleset, join_domains, join_domains)
        }

        DomainsCommand::Enable { id } => toggle(reconciler, &id, true, global).await?,
        DomainsCommand::Disable { id } => toggle(reconciler, &id, false, global).await?,
    };

    output::print_output(&out, global.quiet);
    Ok(())
}

async fn toggle(
    reconciler: &HostReconciler,
    id: &str,
    enabled: bool,
    global: &GlobalOpts,
) -> Result<String, CliError> {
    let applied = reconciler.set_group_enabled(id, enabled).await?;
    let summary = Summary::from(&applied);
    let color = output::should_color(&global.color);
    Ok(output::render_single(
        &global.output,
        &summary,
        |s| {
            format!(
                "{id}: {}\n{}",
                output::flag(enabled, "enabled", "disabled", color),
                summary_detail(s)
            )
        },
        |_| id.to_owned(),
    ))
}

fn join_domains(ruleset: &FlatRuleset) -> String {
    ruleset.domains().collect::<Vec<_>>().join("\n")
}
