#![allow(clippy::unwrap_used)]
// Integration tests for `Reconciler` against a temp directory and fake
// collaborators.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use sbpolicy_core::{ClientPatch, CoreError, VpnPolicy};
use sbpolicy_host::{
    ClientDiscovery, DiscoveredClient, DiscoverySource, DocumentStore, FirewallReload, HostError,
    LinkSource, Paths, Reconciler, ServiceControl, ServiceStatus,
};

const UUID: &str = "b831381d-6324-4d53-ad4f-8cda48b30811";
const PBK: &str = "jNXHt1yRo0vDuchQlIP6Z0ZvjT3KtzVI-T4E7RoLJS0";

// ── Fakes ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Records each restart together with the proxy config as it was on disk
/// at that moment.
struct FakeService {
    journal: Journal,
    watched: PathBuf,
}

impl ServiceControl for FakeService {
    async fn restart(&self) -> Result<(), HostError> {
        let snapshot = std::fs::read_to_string(&self.watched).unwrap_or_default();
        self.journal.push(format!("restart {}", snapshot.len()));
        Ok(())
    }

    async fn status(&self) -> ServiceStatus {
        ServiceStatus {
            active: true,
            status: "active".into(),
        }
    }
}

struct FakeFirewall(Journal);

impl FirewallReload for FakeFirewall {
    async fn reload(&self, path: &Path) -> Result<(), HostError> {
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("set force_udp_vpn_clients"));
        self.0.push("reload");
        Ok(())
    }
}

struct FakeDiscovery;

impl ClientDiscovery for FakeDiscovery {
    async fn clients(&self) -> Result<Vec<DiscoveredClient>, HostError> {
        Ok(vec![DiscoveredClient {
            mac: "aa:aa:aa:aa:aa:aa".into(),
            ip: "192.168.1.5".into(),
            hostname: "laptop".into(),
            client_id: None,
            expires: None,
            source: DiscoverySource::Leases,
        }])
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

const FIREWALL: &str = "\
table inet sbproxy {
# === SB-WEBUI:BEGIN force_udp_vpn_clients ===
  set force_udp_vpn_clients {
    type ipv4_addr
    flags interval
    # SB-WEBUI-ELEMENTS
  }
# === SB-WEBUI:END force_udp_vpn_clients ===
}
";

fn proxy_config() -> Value {
    json!({
        "log": {"level": "warn"},
        "inbounds": [{"type": "socks", "tag": "socks-in", "listen_port": 1080}],
        "outbounds": [
            {"type": "direct", "tag": "direct"},
            {
                "type": "vless",
                "tag": "vpn",
                "server": "old.example.com",
                "server_port": 443,
                "uuid": "00000000-0000-4000-8000-000000000000",
                "packet_encoding": "xudp"
            }
        ],
        "route": {
            "rule_set": [{"tag": "vpn-domains", "type": "local", "path": "/etc/sing-box/rules/vpn_domains.json"}],
            "rules": [
                {"inbound": "socks-in", "outbound": "direct"},
                {"rule_set": ["vpn-domains"], "outbound": "direct"}
            ],
            "final": "direct"
        }
    })
}

struct Fixture {
    _dir: tempfile::TempDir,
    paths: Paths,
    journal: Journal,
    reconciler: Reconciler<FakeService, FakeFirewall, FakeDiscovery>,
}

fn setup_with(firewall: Option<&str>, dry_run: bool) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::rooted(dir.path());
    std::fs::write(
        &paths.proxy_config,
        serde_json::to_string_pretty(&proxy_config()).unwrap(),
    )
    .unwrap();
    if let Some(text) = firewall {
        std::fs::write(&paths.firewall, text).unwrap();
    }

    let journal = Journal::default();
    let reconciler = Reconciler::new(
        paths.clone(),
        DocumentStore::new(false).dry_run(dry_run),
        FakeService {
            journal: journal.clone(),
            watched: paths.proxy_config.clone(),
        },
        FakeFirewall(journal.clone()),
        FakeDiscovery,
    );
    Fixture {
        _dir: dir,
        paths,
        journal,
        reconciler,
    }
}

fn setup() -> Fixture {
    setup_with(Some(FIREWALL), false)
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn restarts(journal: &Journal) -> usize {
    journal
        .events()
        .iter()
        .filter(|event| event.starts_with("restart"))
        .count()
}

// ── Domain policy ───────────────────────────────────────────────────

#[tokio::test]
async fn test_domains_seed_on_first_read() {
    let fx = setup();

    let policy = fx.reconciler.domains().await.unwrap();
    assert_eq!(policy.groups.len(), 12);
    assert!(fx.paths.domain_policy.exists());

    let ruleset = read_json(&fx.paths.flat_ruleset);
    let domains = ruleset["rules"][0]["domain_suffix"].as_array().unwrap();
    assert!(domains.iter().any(|domain| domain == "youtube.com"));
    assert_eq!(restarts(&fx.journal), 0);
}

#[tokio::test]
async fn test_apply_domains_writes_both_files_then_restarts() {
    let fx = setup();

    let applied = fx
        .reconciler
        .apply_domains(&json!({
            "version": 1,
            "groups": [
                {"id": "media", "name": "Media", "domains": ["B.com", "a.com", "a.com"]},
                {"id": "off", "name": "Off", "enabled": false, "domains": ["z.com"]}
            ]
        }))
        .await
        .unwrap();

    assert_eq!(applied.flat_count(), 2);
    assert_eq!(
        read_json(&fx.paths.flat_ruleset),
        json!({"version": 1, "rules": [{"domain_suffix": ["a.com", "b.com"]}]})
    );
    let policy = read_json(&fx.paths.domain_policy);
    assert_eq!(policy["groups"][0]["domains"], json!(["b.com", "a.com"]));
    assert_eq!(restarts(&fx.journal), 1);
}

#[tokio::test]
async fn test_invalid_domain_document_writes_nothing() {
    let fx = setup();

    let err = fx
        .reconciler
        .apply_domains(&json!({"version": 1, "groups": [{"id": "g", "domains": ["nope"]}]}))
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::Core(CoreError::Validation { .. })));
    assert!(!fx.paths.domain_policy.exists());
    assert!(!fx.paths.flat_ruleset.exists());
    assert_eq!(restarts(&fx.journal), 0);
}

#[tokio::test]
async fn test_toggle_group() {
    let fx = setup();

    let applied = fx
        .reconciler
        .set_group_enabled("youtube", false)
        .await
        .unwrap();
    assert!(!applied.ruleset.domains().any(|domain| domain == "youtube.com"));

    let err = fx
        .reconciler
        .set_group_enabled("missing", true)
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::Core(CoreError::NotFound { .. })));
}

// ── VPN state ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_vpn_writes_before_restart() {
    let fx = setup();
    let before = std::fs::read_to_string(&fx.paths.proxy_config).unwrap().len();

    let report = fx.reconciler.set_vpn(true, VpnPolicy::All).await.unwrap();
    assert!(report.enabled);
    assert_eq!(report.policy, VpnPolicy::All);
    assert!(report.active);

    let config = read_json(&fx.paths.proxy_config);
    assert_eq!(config["route"]["final"], "vpn");
    assert_eq!(config["route"]["rules"][0]["ip_cidr"], json!(["10.0.0.0/8"]));
    assert_eq!(config["outbounds"][1]["packet_encoding"], "xudp");
    assert_eq!(config["log"]["level"], "warn");

    // The restart saw the rewritten file, not the original.
    let after = std::fs::read_to_string(&fx.paths.proxy_config).unwrap().len();
    assert_ne!(before, after);
    assert_eq!(fx.journal.events(), [format!("restart {after}")]);

    let state = fx.reconciler.vpn_state().await.unwrap();
    assert!(state.enabled);
    assert_eq!(state.policy, VpnPolicy::All);
}

#[tokio::test]
async fn test_vpn_off_loses_policy() {
    let fx = setup();
    fx.reconciler.set_vpn(true, VpnPolicy::All).await.unwrap();
    let report = fx
        .reconciler
        .set_vpn(false, VpnPolicy::All)
        .await
        .unwrap();
    assert!(!report.enabled);
    assert_eq!(report.policy, VpnPolicy::Domains);
}

// ── VPN endpoint ────────────────────────────────────────────────────

#[tokio::test]
async fn test_apply_vless_link_patches_vpn_outbound() {
    let fx = setup();
    let link = format!(
        "vless://{UUID}@vpn.example.com:8443?security=reality&sni=www.microsoft.com&pbk={PBK}&sid=6ba85179e30d4fc2"
    );

    fx.reconciler
        .apply_vless(&LinkSource::Uri(link))
        .await
        .unwrap();

    let summary = fx.reconciler.vless().await.unwrap();
    assert_eq!(summary.server.as_deref(), Some("vpn.example.com"));
    assert_eq!(summary.server_port, Some(8443));
    assert_eq!(summary.uuid.as_deref(), Some(UUID));

    let config = read_json(&fx.paths.proxy_config);
    assert_eq!(config["outbounds"][1]["packet_encoding"], "xudp");
    assert_eq!(config["outbounds"][1]["tls"]["reality"]["short_id"], "6ba85179e30d4fc2");
    assert_eq!(restarts(&fx.journal), 1);
}

#[tokio::test]
async fn test_apply_vless_from_template() {
    let fx = setup();
    let saved = fx
        .reconciler
        .templates()
        .save(None, &format!("vless://{UUID}@nl.example.com:443#Amsterdam"))
        .await
        .unwrap();
    assert_eq!(saved.id, "Amsterdam.json");

    let patch = fx
        .reconciler
        .apply_vless(&LinkSource::Template(saved.id))
        .await
        .unwrap();
    assert_eq!(patch.server, "nl.example.com");
}

#[tokio::test]
async fn test_invalid_link_leaves_config_untouched() {
    let fx = setup();
    let before = std::fs::read_to_string(&fx.paths.proxy_config).unwrap();

    let err = fx
        .reconciler
        .apply_vless(&LinkSource::Uri("vless://bad@host:0".into()))
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::Core(CoreError::Validation { .. })));
    assert_eq!(std::fs::read_to_string(&fx.paths.proxy_config).unwrap(), before);
    assert!(fx.journal.events().is_empty());
}

// ── Clients ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_client_compiles_rule_and_firewall_set() {
    let fx = setup();

    let record = fx
        .reconciler
        .update_client(
            "aa:aa:aa:aa:aa:aa",
            ClientPatch {
                name: Some("laptop".into()),
                ip: Some("192.168.1.5".into()),
                force_vpn: Some(true),
                force_udp_vpn: Some(true),
            },
        )
        .await
        .unwrap();
    assert!(record.forces_vpn());

    let config = read_json(&fx.paths.proxy_config);
    assert_eq!(
        config["route"]["rules"],
        json!([
            {"inbound": "socks-in", "outbound": "direct"},
            {"source_ip_cidr": ["192.168.1.5/32"], "outbound": "vpn"},
            {"rule_set": ["vpn-domains"], "outbound": "direct"}
        ])
    );

    let firewall = std::fs::read_to_string(&fx.paths.firewall).unwrap();
    assert!(firewall.contains("    elements = { 192.168.1.5/32 }\n"));
    assert!(firewall.starts_with("table inet sbproxy {\n"));
    assert!(firewall.ends_with("# === SB-WEBUI:END force_udp_vpn_clients ===\n}\n"));

    let events = fx.journal.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], "reload");
    assert!(events[1].starts_with("restart"));

    let policy = read_json(&fx.paths.client_policy);
    assert_eq!(policy["clients"]["aa:aa:aa:aa:aa:aa"]["name"], "laptop");
}

#[tokio::test]
async fn test_forced_udp_without_markers_fails_before_writing() {
    let fx = setup_with(Some("table inet filter {}\n"), false);
    let before = std::fs::read_to_string(&fx.paths.proxy_config).unwrap();

    let err = fx
        .reconciler
        .update_client(
            "aa",
            ClientPatch {
                ip: Some("192.168.1.5".into()),
                force_udp_vpn: Some(true),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::Core(CoreError::Precondition { .. })));
    assert_eq!(std::fs::read_to_string(&fx.paths.proxy_config).unwrap(), before);
    assert!(!fx.paths.client_policy.exists());
    assert!(fx.journal.events().is_empty());
}

#[tokio::test]
async fn test_missing_firewall_file_is_a_precondition() {
    let fx = setup_with(None, false);
    let before = std::fs::read_to_string(&fx.paths.proxy_config).unwrap();

    let err = fx
        .reconciler
        .update_client(
            "aa",
            ClientPatch {
                ip: Some("192.168.1.5".into()),
                force_vpn: Some(true),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::Core(CoreError::Precondition { .. })));
    assert_eq!(std::fs::read_to_string(&fx.paths.proxy_config).unwrap(), before);
    assert!(!fx.paths.client_policy.exists());
    assert!(!fx.paths.firewall.exists());
    assert!(fx.journal.events().is_empty());
}

#[tokio::test]
async fn test_untemplated_firewall_fails_without_forced_udp() {
    let fx = setup_with(Some("table inet filter {}\n"), false);

    let err = fx
        .reconciler
        .update_client(
            "aa",
            ClientPatch {
                name: Some("tv".into()),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::Core(CoreError::Precondition { .. })));
    assert!(!fx.paths.client_policy.exists());
    assert!(fx.journal.events().is_empty());
}

#[tokio::test]
async fn test_concurrent_client_updates_are_not_lost() {
    let fx = setup();
    let patch = |ip: &str| ClientPatch {
        ip: Some(ip.into()),
        force_vpn: Some(true),
        ..ClientPatch::default()
    };

    let (first, second) = tokio::join!(
        fx.reconciler.update_client("aa", patch("192.168.1.5")),
        fx.reconciler.update_client("bb", patch("192.168.1.6")),
    );
    first.unwrap();
    second.unwrap();

    let clients = fx.reconciler.clients().await.unwrap();
    assert_eq!(clients.clients.len(), 2);
    let config = read_json(&fx.paths.proxy_config);
    assert_eq!(
        config["route"]["rules"][1]["source_ip_cidr"],
        json!(["192.168.1.5/32", "192.168.1.6/32"])
    );
}

#[tokio::test]
async fn test_discover_passes_through() {
    let fx = setup();
    let clients = fx.reconciler.discover().await.unwrap();
    assert_eq!(clients[0].hostname, "laptop");
}

// ── Dry run ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let fx = setup_with(Some(FIREWALL), true);
    let before = std::fs::read_to_string(&fx.paths.proxy_config).unwrap();

    let report = fx.reconciler.set_vpn(true, VpnPolicy::All).await.unwrap();
    assert!(report.enabled);
    fx.reconciler
        .update_client(
            "aa",
            ClientPatch {
                ip: Some("192.168.1.5".into()),
                force_udp_vpn: Some(true),
                ..ClientPatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&fx.paths.proxy_config).unwrap(), before);
    assert_eq!(std::fs::read_to_string(&fx.paths.firewall).unwrap(), FIREWALL);
    assert!(!fx.paths.client_policy.exists());
    assert!(fx.journal.events().is_empty());
}

#[tokio::test]
async fn test_missing_proxy_config() {
    let fx = setup();
    std::fs::remove_file(&fx.paths.proxy_config).unwrap();

    let err = fx.reconciler.vpn_state().await.unwrap_err();
    assert!(matches!(err, HostError::Missing { .. }));
}
