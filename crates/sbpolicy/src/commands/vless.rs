//! VPN endpoint and link template command handlers.

use serde::Serialize;
use tabled::Tabled;

use sbpolicy_core::{EndpointPatch, OutboundSummary, link};
use sbpolicy_host::{LinkSource, TemplateEntry};

use crate::cli::{GlobalOpts, TemplatesArgs, TemplatesCommand, VlessArgs, VlessCommand};
use crate::error::CliError;
use crate::output;

use super::{HostReconciler, util};

// ── Rendering ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Saved")]
    created_at: String,
}

impl From<&TemplateEntry> for TemplateRow {
    fn from(t: &TemplateEntry) -> Self {
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            created_at: t
                .created_at
                .map_or_else(|| "-".into(), |dt| dt.format("%Y-%m-%d %H:%M").to_string()),
        }
    }
}

/// A saved link together with what it decodes to.
#[derive(Debug, Serialize)]
struct TemplateView {
    id: String,
    name: String,
    vless: String,
    endpoint: EndpointPatch,
}

fn endpoint_lines(p: &EndpointPatch) -> Vec<String> {
    let mut lines = vec![
        format!("Server:      {}:{}", p.server, p.server_port),
        format!("UUID:        {}", p.uuid),
        format!("Flow:        {}", p.flow.as_deref().unwrap_or("-")),
    ];
    let security = match &p.tls {
        None => "none".to_owned(),
        Some(tls) if tls.reality.is_some() => "reality".to_owned(),
        Some(_) => "tls".to_owned(),
    };
    lines.push(format!("Security:    {security}"));
    if let Some(tls) = &p.tls {
        if let Some(sni) = &tls.server_name {
            lines.push(format!("SNI:         {sni}"));
        }
        if let Some(utls) = &tls.utls {
            lines.push(format!("Fingerprint: {}", utls.fingerprint));
        }
        if let Some(reality) = &tls.reality {
            lines.push(format!("Public key:  {}", reality.public_key));
            lines.push(format!("Short id:    {}", reality.short_id));
        }
    }
    lines
}

fn endpoint_detail(p: &EndpointPatch) -> String {
    endpoint_lines(p).join("\n")
}

fn summary_detail(s: &OutboundSummary) -> String {
    let server = match (&s.server, s.server_port) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.clone(),
        _ => "-".into(),
    };
    let security = match &s.tls {
        None => "none",
        Some(tls) if tls.get("reality").is_some() => "reality",
        Some(_) => "tls",
    };
    [
        format!("Tag:         {}", s.tag),
        format!("Type:        {}", s.kind.as_deref().unwrap_or("-")),
        format!("Server:      {server}"),
        format!("UUID:        {}", s.uuid.as_deref().unwrap_or("-")),
        format!("Flow:        {}", s.flow.as_deref().unwrap_or("-")),
        format!("Security:    {security}"),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    reconciler: &HostReconciler,
    args: VlessArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = match args.command {
        VlessCommand::Show => {
            let summary = reconciler.vless().await?;
            output::render_single(&global.output, &summary, summary_detail, |s| {
                s.server.clone().unwrap_or_default()
            })
        }

        VlessCommand::Parse { uri } => {
            let patch = link::decode(&uri)?;
            output::render_single(&global.output, &patch, endpoint_detail, |p| {
                p.server.clone()
            })
        }

        VlessCommand::Apply { uri, template } => {
            let source = match (uri, template) {
                (_, Some(id)) => LinkSource::Template(id),
                (Some(uri), None) => LinkSource::Uri(uri),
                (None, None) => {
                    return Err(CliError::Validation {
                        field: "uri".into(),
                        reason: "pass a vless:// link or --template <id>".into(),
                    });
                }
            };
            let patch = reconciler.apply_vless(&source).await?;
            output::render_single(&global.output, &patch, endpoint_detail, |p| {
                p.server.clone()
            })
        }

        VlessCommand::Templates(args) => templates(reconciler, args, global).await?,
    };

    output::print_output(&out, global.quiet);
    Ok(())
}

async fn templates(
    reconciler: &HostReconciler,
    args: TemplatesArgs,
    global: &GlobalOpts,
) -> Result<String, CliError> {
    let store = reconciler.templates();
    let out = match args.command {
        TemplatesCommand::List => {
            let entries = store.list().await?;
            output::render_list(
                &global.output,
                &entries,
                |t| TemplateRow::from(t),
                |t| t.id.clone(),
            )
        }

        TemplatesCommand::Show { id } => {
            let template = store.read(&id).await?;
            let view = TemplateView {
                endpoint: link::decode(&template.vless)?,
                id: template.id,
                name: template.name,
                vless: template.vless,
            };
            output::render_single(
                &global.output,
                &view,
                |v| {
                    let mut lines = vec![
                        format!("ID:          {}", v.id),
                        format!("Name:        {}", v.name),
                    ];
                    lines.extend(endpoint_lines(&v.endpoint));
                    lines.join("\n")
                },
                |v| v.vless.clone(),
            )
        }

        TemplatesCommand::Save { uri, name } => {
            let entry = store.save(name.as_deref(), &uri).await?;
            output::render_single(
                &global.output,
                &entry,
                |t| format!("Saved {} as {}", t.name, t.id),
                |t| t.id.clone(),
            )
        }

        TemplatesCommand::Delete { id } => {
            if !util::confirm(&format!("Delete template {id}?"), global.yes)? {
                return Ok(String::new());
            }
            store.delete(&id).await?;
            if global.quiet {
                String::new()
            } else {
                format!("Deleted {id}")
            }
        }
    };
    Ok(out)
}
