// ── Per-client overrides ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::POLICY_VERSION;

fn policy_version() -> u32 {
    POLICY_VERSION
}

/// Per-client overrides keyed by an opaque client id (a MAC in practice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPolicy {
    #[serde(default = "policy_version")]
    pub version: u32,
    #[serde(default)]
    pub clients: BTreeMap<String, ClientRecord>,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION,
            clients: BTreeMap::new(),
        }
    }
}

impl ClientPolicy {
    /// Create or update the record for `id`. Records are never removed.
    pub fn upsert(&mut self, id: &str, patch: ClientPatch) -> &ClientRecord {
        let record = self.clients.entry(id.to_owned()).or_default();
        record.apply(patch);
        record
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_vpn: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_udp_vpn: Option<bool>,
}

impl ClientRecord {
    pub fn apply(&mut self, patch: ClientPatch) {
        if let Some(name) = patch.name {
            self.name = Some(name);
        }
        if let Some(ip) = patch.ip {
            self.ip = Some(ip);
        }
        if let Some(force_vpn) = patch.force_vpn {
            self.force_vpn = Some(force_vpn);
        }
        if let Some(force_udp_vpn) = patch.force_udp_vpn {
            self.force_udp_vpn = Some(force_udp_vpn);
        }
    }

    pub fn forces_vpn(&self) -> bool {
        self.force_vpn == Some(true)
    }

    pub fn forces_udp_vpn(&self) -> bool {
        self.force_udp_vpn == Some(true)
    }
}

/// Partial update for a [`ClientRecord`]; `None` fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_vpn: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_udp_vpn: Option<bool>,
}

impl ClientPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.ip.is_none()
            && self.force_vpn.is_none()
            && self.force_udp_vpn.is_none()
    }
}
