//! Configuration for sbpolicy.
//!
//! Built-in defaults, then a TOML file, then `SBPOLICY_*` environment
//! variables (`__` separates sections, e.g. `SBPOLICY_SERVICE__UNIT`).
//! [`Config::reconciler`] turns a loaded config into the host-side
//! [`Reconciler`] the CLI drives.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use sbpolicy_host::{
    DhcpLeases, Discovery, DiscoverySource, DocumentStore, Nft, Paths, PiHole, Reconciler, Runner,
    Systemd,
};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "SBPOLICY_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Output defaults the CLI falls back to when no flag is given.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PathsConfig {
    /// sing-box configuration.
    pub proxy_config: PathBuf,
    /// Operator-edited domain groups.
    pub domain_policy: PathBuf,
    /// Compiled `vpn-domains` rule set.
    pub flat_ruleset: PathBuf,
    pub client_policy: PathBuf,
    /// nftables file holding the force-UDP set markers.
    pub firewall: PathBuf,
    pub templates_dir: PathBuf,
    pub dhcp_leases: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            proxy_config: "/etc/sing-box/config.json".into(),
            domain_policy: "/etc/sing-box/rules/vpn_domains_ui.json".into(),
            flat_ruleset: "/etc/sing-box/rules/vpn_domains.json".into(),
            client_policy: "/etc/sing-box/clients_policy.json".into(),
            firewall: "/etc/nftables.conf".into(),
            templates_dir: default_templates_dir(),
            dhcp_leases: "/var/lib/misc/dnsmasq.leases".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// systemd unit of the proxy daemon.
    #[serde(default = "default_unit")]
    pub unit: String,

    /// Run `systemctl`/`nft`, and privileged installs, through `sudo`.
    #[serde(default = "default_sudo")]
    pub sudo: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            sudo: default_sudo(),
        }
    }
}

fn default_unit() -> String {
    "sing-box".into()
}
fn default_sudo() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub source: DiscoverySource,

    #[serde(default = "default_pihole_url")]
    pub pihole_url: String,

    /// Pi-hole request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            source: DiscoverySource::default(),
            pihole_url: default_pihole_url(),
            timeout: default_timeout(),
        }
    }
}

fn default_pihole_url() -> String {
    "http://127.0.0.1/admin/api.php?getQuerySources".into()
}
fn default_timeout() -> u64 {
    10
}

// ── Config file path ────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "sbpolicy", "sbpolicy")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from("/etc/sbpolicy/config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn default_templates_dir() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from("/var/lib/sbpolicy/vless-templates"),
        |dirs| dirs.data_dir().join("vless-templates"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full config from defaults, the TOML file and the environment.
/// `path` overrides the platform config location; a missing file is fine.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path` (or the platform path).
pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(path)
}

// ── Validation and wiring ───────────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.unit.trim().is_empty() {
            return Err(invalid("service.unit", "must not be empty"));
        }
        if self.discovery.timeout == 0 {
            return Err(invalid("discovery.timeout", "must be at least 1 second"));
        }
        self.pihole_url()?;

        let paths = [
            ("paths.proxy_config", &self.paths.proxy_config),
            ("paths.domain_policy", &self.paths.domain_policy),
            ("paths.flat_ruleset", &self.paths.flat_ruleset),
            ("paths.client_policy", &self.paths.client_policy),
            ("paths.firewall", &self.paths.firewall),
            ("paths.templates_dir", &self.paths.templates_dir),
            ("paths.dhcp_leases", &self.paths.dhcp_leases),
        ];
        for (field, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }
        Ok(())
    }

    fn pihole_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.discovery.pihole_url)
            .map_err(|err| invalid("discovery.pihole_url", err.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("discovery.pihole_url", "expected an http(s) URL"));
        }
        Ok(url)
    }

    pub fn paths(&self) -> Paths {
        Paths {
            proxy_config: self.paths.proxy_config.clone(),
            domain_policy: self.paths.domain_policy.clone(),
            flat_ruleset: self.paths.flat_ruleset.clone(),
            client_policy: self.paths.client_policy.clone(),
            firewall: self.paths.firewall.clone(),
            templates_dir: self.paths.templates_dir.clone(),
        }
    }

    pub fn discovery(&self) -> Result<Discovery, ConfigError> {
        match self.discovery.source {
            DiscoverySource::Leases => Ok(Discovery::Leases(DhcpLeases::new(
                self.paths.dhcp_leases.clone(),
            ))),
            DiscoverySource::Pihole => {
                let timeout = Duration::from_secs(self.discovery.timeout);
                PiHole::new(self.pihole_url()?, timeout)
                    .map(Discovery::PiHole)
                    .map_err(|err| invalid("discovery.pihole_url", err.to_string()))
            }
        }
    }

    /// Wire the configured collaborators into a reconciler.
    pub fn reconciler(
        &self,
        dry_run: bool,
    ) -> Result<Reconciler<Systemd, Nft, Discovery>, ConfigError> {
        let runner = Runner::new(self.service.sudo);
        Ok(Reconciler::new(
            self.paths(),
            DocumentStore::new(self.service.sudo).dry_run(dry_run),
            Systemd::new(self.service.unit.trim(), runner),
            Nft::new(runner),
            self.discovery()?,
        ))
    }
}
