//! Domain suffix normalization and the flat rule-set compiler.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use crate::error::CoreError;
use crate::model::{DomainGroup, DomainPolicy, FlatRuleset, POLICY_VERSION};

/// Longest name DNS allows.
pub const MAX_DOMAIN_LEN: usize = 253;

/// Trim, lowercase, strip every leading dot and one trailing dot.
pub fn normalize(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    let stripped = lowered.trim_start_matches('.');
    stripped.strip_suffix('.').unwrap_or(stripped).to_owned()
}

/// Whether an already-normalized string is an acceptable domain suffix.
pub fn validate(domain: &str) -> bool {
    !domain.is_empty()
        && domain.len() <= MAX_DOMAIN_LEN
        && domain.contains('.')
        && !domain.contains("..")
        && domain
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
}

/// Pool the domains of every enabled group into one sorted, deduplicated
/// suffix rule. Invalid entries are dropped silently.
pub fn compile(policy: &DomainPolicy) -> FlatRuleset {
    let domains: BTreeSet<String> = policy
        .groups
        .iter()
        .filter(|group| group.enabled)
        .flat_map(|group| group.domains.iter().map(|domain| normalize(domain)))
        .filter(|domain| validate(domain))
        .collect();
    FlatRuleset::new(domains.into_iter().collect())
}

/// Validate and normalize a policy document submitted for a write.
///
/// The whole document is rejected on the first problem; nothing is
/// partially accepted.
pub fn prepare(document: &Value) -> Result<DomainPolicy, CoreError> {
    let groups = match document {
        Value::Object(map)
            if map.get("version").and_then(Value::as_u64) == Some(u64::from(POLICY_VERSION)) =>
        {
            map.get("groups").and_then(Value::as_array)
        }
        _ => None,
    }
    .ok_or_else(|| CoreError::validation("Invalid format: expected {version:1, groups:[...]}"))?;

    let groups = groups
        .iter()
        .map(prepare_group)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DomainPolicy::new(groups))
}

fn prepare_group(group: &Value) -> Result<DomainGroup, CoreError> {
    let id = match group.get("id") {
        Some(Value::String(id)) => id.trim().to_owned(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };
    if id.is_empty() {
        return Err(CoreError::validation("Group must have id"));
    }

    let name = match group.get("name") {
        Some(Value::String(name)) => name.clone(),
        _ => String::new(),
    };
    let enabled = !matches!(group.get("enabled"), Some(Value::Bool(false)));

    let entries = group
        .get("domains")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut domains = Vec::new();
    for entry in entries {
        let raw = match entry {
            Value::Null => continue,
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let domain = normalize(&raw);
        if domain.is_empty() || !seen.insert(domain.clone()) {
            continue;
        }
        if !validate(&domain) {
            return Err(CoreError::validation(format!("Invalid domain: {raw}")));
        }
        domains.push(domain);
    }

    Ok(DomainGroup {
        id,
        name,
        enabled,
        domains,
    })
}
