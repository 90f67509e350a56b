// ── Domain policy documents ──

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema version carried by every persisted policy document.
pub const POLICY_VERSION: u32 = 1;

fn policy_version() -> u32 {
    POLICY_VERSION
}

fn enabled_by_default() -> bool {
    true
}

/// The operator-edited list of domain groups routed through the VPN.
///
/// Reading is lenient since the file is hand-edited: non-object groups are
/// skipped and mistyped fields read as empty. Writes go through the strict
/// [`crate::domains::prepare`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct DomainPolicy {
    pub version: u32,
    pub groups: Vec<DomainGroup>,
}

impl From<Value> for DomainPolicy {
    fn from(value: Value) -> Self {
        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|version| u32::try_from(version).ok())
            .unwrap_or_else(policy_version);
        let groups = value
            .get("groups")
            .and_then(Value::as_array)
            .map(|groups| groups.iter().filter_map(DomainGroup::lenient).collect())
            .unwrap_or_default();
        Self { version, groups }
    }
}

impl DomainPolicy {
    pub fn new(groups: Vec<DomainGroup>) -> Self {
        Self {
            version: POLICY_VERSION,
            groups,
        }
    }

    pub fn group_mut(&mut self, id: &str) -> Option<&mut DomainGroup> {
        self.groups.iter_mut().find(|group| group.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainGroup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub domains: Vec<String>,
}

impl DomainGroup {
    /// Best-effort read of one persisted group; `None` for non-objects.
    fn lenient(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let text = |key: &str| match map.get(key) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Number(number)) => number.to_string(),
            _ => String::new(),
        };
        let domains = map
            .get("domains")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| match entry {
                        Value::String(text) => Some(text.clone()),
                        Value::Number(number) => Some(number.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            id: text("id"),
            name: text("name"),
            enabled: !matches!(map.get("enabled"), Some(Value::Bool(false))),
            domains,
        })
    }

    pub fn new(id: &str, name: &str, domains: &[&str]) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            enabled: true,
            domains: domains.iter().map(|domain| (*domain).to_owned()).collect(),
        }
    }
}

/// Compiled rule-set file consumed by sing-box as the `vpn-domains` rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRuleset {
    pub version: u32,
    pub rules: Vec<SuffixRule>,
}

impl FlatRuleset {
    pub fn new(domain_suffix: Vec<String>) -> Self {
        Self {
            version: POLICY_VERSION,
            rules: vec![SuffixRule { domain_suffix }],
        }
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .flat_map(|rule| rule.domain_suffix.iter().map(String::as_str))
    }

    pub fn domain_count(&self) -> usize {
        self.rules.iter().map(|rule| rule.domain_suffix.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixRule {
    pub domain_suffix: Vec<String>,
}
