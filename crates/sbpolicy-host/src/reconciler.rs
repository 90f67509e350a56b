// ── Reconciler ──
//
// Sequences every operator action as read → compile → write → reload.
// Mutations are serialized through one async mutex, and every external
// reload/restart happens only after all of its writes succeeded.

use std::path::{Path, PathBuf};

use sbpolicy_core::merge::{outbound_summary, patch_outbound};
use sbpolicy_core::{
    ClientPatch, ClientPolicy, ClientRecord, CoreError, DomainPolicy, EndpointPatch, FlatRuleset,
    OutboundSummary, ProxyConfig, VPN_OUTBOUND, VpnPolicy, VpnState, defaults, domains, firewall,
    link, overrides, routing,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::discovery::{ClientDiscovery, DiscoveredClient};
use crate::error::HostError;
use crate::firewall::FirewallReload;
use crate::service::{ServiceControl, ServiceStatus};
use crate::store::DocumentStore;
use crate::templates::TemplateStore;

/// Every file the reconciler reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paths {
    pub proxy_config: PathBuf,
    pub domain_policy: PathBuf,
    pub flat_ruleset: PathBuf,
    pub client_policy: PathBuf,
    pub firewall: PathBuf,
    pub templates_dir: PathBuf,
}

impl Paths {
    /// All files under one directory, named after their stock counterparts.
    pub fn rooted(root: &Path) -> Self {
        Self {
            proxy_config: root.join("config.json"),
            domain_policy: root.join("vpn_domains_ui.json"),
            flat_ruleset: root.join("vpn_domains.json"),
            client_policy: root.join("clients_policy.json"),
            firewall: root.join("nftables.conf"),
            templates_dir: root.join("vless_templates"),
        }
    }
}

/// Where a link for the `vpn` outbound comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSource {
    Uri(String),
    Template(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainsApplied {
    pub policy: DomainPolicy,
    pub ruleset: FlatRuleset,
}

impl DomainsApplied {
    pub fn flat_count(&self) -> usize {
        self.ruleset.domain_count()
    }
}

/// Decoded VPN state together with the daemon's active state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnReport {
    pub enabled: bool,
    pub policy: VpnPolicy,
    pub active: bool,
    pub status: String,
}

impl VpnReport {
    fn new(state: VpnState, service: ServiceStatus) -> Self {
        Self {
            enabled: state.enabled,
            policy: state.policy,
            active: service.active,
            status: service.status,
        }
    }
}

pub struct Reconciler<S, F, D> {
    paths: Paths,
    store: DocumentStore,
    templates: TemplateStore,
    service: S,
    firewall: F,
    discovery: D,
    lock: Mutex<()>,
}

impl<S, F, D> Reconciler<S, F, D>
where
    S: ServiceControl,
    F: FirewallReload,
    D: ClientDiscovery,
{
    pub fn new(paths: Paths, store: DocumentStore, service: S, firewall: F, discovery: D) -> Self {
        let templates = TemplateStore::new(paths.templates_dir.clone(), store);
        Self {
            paths,
            store,
            templates,
            service,
            firewall,
            discovery,
            lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn is_dry_run(&self) -> bool {
        self.store.is_dry_run()
    }

    // ── Documents ────────────────────────────────────────────────────

    /// Persisted domain policy, seeding the stock groups (and their
    /// compiled rule set) on first use.
    pub async fn load_domain_policy(&self) -> Result<DomainPolicy, HostError> {
        let (policy, seeded) = self
            .store
            .load_or_seed(&self.paths.domain_policy, defaults::domain_policy)
            .await?;
        if seeded {
            self.store
                .write_json(&self.paths.flat_ruleset, &domains::compile(&policy))
                .await?;
        }
        Ok(policy)
    }

    pub async fn load_client_policy(&self) -> Result<ClientPolicy, HostError> {
        let (policy, _) = self
            .store
            .load_or_seed(&self.paths.client_policy, defaults::client_policy)
            .await?;
        Ok(policy)
    }

    async fn read_proxy_config(&self) -> Result<ProxyConfig, HostError> {
        self.store
            .read_json(&self.paths.proxy_config)
            .await?
            .ok_or_else(|| HostError::Missing {
                path: self.paths.proxy_config.clone(),
            })
    }

    async fn restart_service(&self) -> Result<(), HostError> {
        if self.is_dry_run() {
            info!("dry run: skipping service restart");
            return Ok(());
        }
        self.service.restart().await
    }

    // ── Domains ──────────────────────────────────────────────────────

    pub async fn domains(&self) -> Result<DomainPolicy, HostError> {
        let _guard = self.lock.lock().await;
        self.load_domain_policy().await
    }

    /// Replace the domain policy wholesale with a submitted document.
    pub async fn apply_domains(&self, document: &Value) -> Result<DomainsApplied, HostError> {
        let policy = domains::prepare(document)?;
        let _guard = self.lock.lock().await;
        self.commit_domains(policy).await
    }

    pub async fn set_group_enabled(
        &self,
        id: &str,
        enabled: bool,
    ) -> Result<DomainsApplied, HostError> {
        let _guard = self.lock.lock().await;
        let mut policy = self.load_domain_policy().await?;
        policy
            .group_mut(id)
            .ok_or_else(|| CoreError::not_found("domain group", id))?
            .enabled = enabled;
        self.commit_domains(policy).await
    }

    async fn commit_domains(&self, policy: DomainPolicy) -> Result<DomainsApplied, HostError> {
        let ruleset = domains::compile(&policy);
        self.store
            .write_json(&self.paths.domain_policy, &policy)
            .await?;
        self.store
            .write_json(&self.paths.flat_ruleset, &ruleset)
            .await?;
        info!(
            groups = policy.groups.len(),
            domains = ruleset.domain_count(),
            "domain policy saved"
        );
        self.restart_service().await?;
        Ok(DomainsApplied { policy, ruleset })
    }

    // ── VPN state ────────────────────────────────────────────────────

    pub async fn vpn_state(&self) -> Result<VpnReport, HostError> {
        let config = self.read_proxy_config().await?;
        let state = routing::decode(&config);
        Ok(VpnReport::new(state, self.service.status().await))
    }

    pub async fn set_vpn(&self, enabled: bool, policy: VpnPolicy) -> Result<VpnReport, HostError> {
        let state = {
            let _guard = self.lock.lock().await;
            let mut config = self.read_proxy_config().await?;
            routing::encode(&mut config, enabled, policy);
            self.store
                .write_json(&self.paths.proxy_config, &config)
                .await?;
            info!(enabled, %policy, "vpn state saved");
            self.restart_service().await?;
            routing::decode(&config)
        };
        Ok(VpnReport::new(state, self.service.status().await))
    }

    // ── VPN endpoint ─────────────────────────────────────────────────

    pub async fn vless(&self) -> Result<OutboundSummary, HostError> {
        let config = self.read_proxy_config().await?;
        Ok(outbound_summary(&config, VPN_OUTBOUND)?)
    }

    /// Point the `vpn` outbound at a new endpoint.
    pub async fn apply_vless(&self, source: &LinkSource) -> Result<EndpointPatch, HostError> {
        let uri = match source {
            LinkSource::Uri(uri) => uri.clone(),
            LinkSource::Template(id) => self.templates.read(id).await?.vless,
        };
        let patch = link::decode(&uri)?;

        let _guard = self.lock.lock().await;
        let mut config = self.read_proxy_config().await?;
        patch_outbound(&mut config, VPN_OUTBOUND, &patch)?;
        self.store
            .write_json(&self.paths.proxy_config, &config)
            .await?;
        info!(server = %patch.server, port = patch.server_port, "vpn outbound updated");
        self.restart_service().await?;
        Ok(patch)
    }

    // ── Clients ──────────────────────────────────────────────────────

    pub async fn clients(&self) -> Result<ClientPolicy, HostError> {
        let _guard = self.lock.lock().await;
        self.load_client_policy().await
    }

    pub async fn discover(&self) -> Result<Vec<DiscoveredClient>, HostError> {
        let clients = self.discovery.clients().await?;
        debug!(count = clients.len(), "discovered clients");
        Ok(clients)
    }

    /// Update one client's overrides and recompile the force-VPN rule and
    /// the force-UDP firewall set. Everything is computed before the first
    /// write, so a missing firewall marker leaves all files untouched.
    pub async fn update_client(
        &self,
        id: &str,
        patch: ClientPatch,
    ) -> Result<ClientRecord, HostError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(CoreError::validation("Client id required").into());
        }

        let _guard = self.lock.lock().await;
        // no seeding here: the policy file is written below or not at all
        let mut policy = self
            .store
            .read_json(&self.paths.client_policy)
            .await?
            .unwrap_or_else(defaults::client_policy);
        let record = policy.upsert(id, patch).clone();

        let mut config = self.read_proxy_config().await?;
        let forced = overrides::apply_force_vpn(&mut config, &policy);
        if !forced.is_empty() && !overrides::has_domains_rule(&config.route()) {
            warn!("no vpn-domains rule set rule; force-vpn rule appended at the end");
        }
        let udp = overrides::force_udp_cidrs(&policy);
        let firewall_text = self.render_firewall(&udp).await?;

        self.store
            .write_json(&self.paths.client_policy, &policy)
            .await?;
        self.store
            .write_json(&self.paths.proxy_config, &config)
            .await?;
        if let Some(text) = firewall_text {
            self.store.write_text(&self.paths.firewall, &text).await?;
            if self.is_dry_run() {
                info!("dry run: skipping firewall reload");
            } else {
                self.firewall.reload(&self.paths.firewall).await?;
            }
        }
        info!(
            id,
            force_vpn = forced.len(),
            force_udp = udp.len(),
            "client overrides saved"
        );
        self.restart_service().await?;
        Ok(record)
    }

    /// New firewall file text, or `None` when it already holds this set.
    ///
    /// The templated block is required on every client update. A missing
    /// file counts as missing markers.
    async fn render_firewall(&self, cidrs: &[String]) -> Result<Option<String>, HostError> {
        let text = match self.store.read_text(&self.paths.firewall).await {
            Ok(text) => text,
            Err(HostError::Missing { path }) => {
                return Err(CoreError::precondition(format!(
                    "nftables markers not found: {} does not exist",
                    path.display()
                ))
                .into());
            }
            Err(err) => return Err(err),
        };
        let updated = firewall::splice(&text, cidrs)?;
        Ok((updated != text).then_some(updated))
    }

    // ── Service ──────────────────────────────────────────────────────

    pub async fn restart(&self) -> Result<(), HostError> {
        let _guard = self.lock.lock().await;
        self.restart_service().await
    }

    pub async fn status(&self) -> ServiceStatus {
        self.service.status().await
    }
}
