//! Per-client overrides compiled into routing rules and firewall elements.

use std::collections::BTreeSet;

use crate::model::{CidrRule, ClientPolicy, ClientRecord, ProxyConfig, Route, Rule, VPN_OUTBOUND};
use crate::routing::is_domains_rule;

/// Every CIDR of an injected force-VPN rule starts with this prefix.
pub const FORCED_SUBNET_PREFIX: &str = "192.168.";

/// Trimmed address as a CIDR; a bare address becomes a `/32`.
pub fn host_cidr(ip: &str) -> Option<String> {
    let ip = ip.trim();
    if ip.is_empty() {
        None
    } else if ip.contains('/') {
        Some(ip.to_owned())
    } else {
        Some(format!("{ip}/32"))
    }
}

fn collect_cidrs(policy: &ClientPolicy, selected: impl Fn(&ClientRecord) -> bool) -> Vec<String> {
    policy
        .clients
        .values()
        .filter(|&record| selected(record))
        .filter_map(|record| record.ip.as_deref().and_then(host_cidr))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted, deduplicated CIDRs of clients forced through the VPN.
pub fn force_vpn_cidrs(policy: &ClientPolicy) -> Vec<String> {
    collect_cidrs(policy, ClientRecord::forces_vpn)
}

/// Sorted, deduplicated CIDRs of clients whose UDP is forced through the VPN.
pub fn force_udp_cidrs(policy: &ClientPolicy) -> Vec<String> {
    collect_cidrs(policy, ClientRecord::forces_udp_vpn)
}

/// Whether a rule looks like one [`apply_force_vpn`] injected.
pub fn is_force_vpn_rule(rule: &Rule) -> bool {
    rule.outbound() == Some(VPN_OUTBOUND)
        && rule.source_ip_cidr().is_some_and(|cidrs| {
            cidrs
                .iter()
                .all(|cidr| cidr.starts_with(FORCED_SUBNET_PREFIX))
        })
}

/// Replace the injected force-VPN rule in the config. Returns the CIDRs of
/// the new rule; empty when no client is forced and the rule was removed.
pub fn apply_force_vpn(config: &mut ProxyConfig, policy: &ClientPolicy) -> Vec<String> {
    let mut route = config.route();
    let cidrs = apply_force_vpn_route(&mut route, policy);
    config.set_route(route);
    cidrs
}

pub fn apply_force_vpn_route(route: &mut Route, policy: &ClientPolicy) -> Vec<String> {
    route.rules.retain(|rule| !is_force_vpn_rule(rule));

    let cidrs = force_vpn_cidrs(policy);
    if cidrs.is_empty() {
        return cidrs;
    }

    let rule = Rule::SourceIpCidr(CidrRule::new(cidrs.clone(), VPN_OUTBOUND));
    // ahead of the first rule that routes by rule set
    match route.rules.iter().position(|rule| rule.rule_set().is_some()) {
        Some(index) => route.rules.insert(index, rule),
        None => route.rules.push(rule),
    }
    cidrs
}

/// Whether the rule set rule this system manages exists in the route.
pub fn has_domains_rule(route: &Route) -> bool {
    route.rules.iter().any(is_domains_rule)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::ClientPatch;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn policy_with(entries: &[(&str, &str, bool, bool)]) -> ClientPolicy {
        let mut policy = ClientPolicy::default();
        for (id, ip, vpn, udp) in entries {
            policy.upsert(
                id,
                ClientPatch {
                    ip: Some((*ip).to_owned()),
                    force_vpn: Some(*vpn),
                    force_udp_vpn: Some(*udp),
                    ..ClientPatch::default()
                },
            );
        }
        policy
    }

    fn base_config() -> ProxyConfig {
        serde_json::from_value(json!({
            "route": {
                "rules": [
                    {"inbound": "socks-in", "outbound": "vpn"},
                    {"rule_set": ["vpn-domains"], "outbound": "vpn"}
                ],
                "final": "direct"
            }
        }))
        .unwrap()
    }

    #[test]
    fn host_cidr_examples() {
        assert_eq!(host_cidr(" 192.168.1.5 ").as_deref(), Some("192.168.1.5/32"));
        assert_eq!(host_cidr("192.168.2.0/24").as_deref(), Some("192.168.2.0/24"));
        assert_eq!(host_cidr("   "), None);
    }

    #[test]
    fn forced_client_rule_lands_before_rule_set() {
        let mut config = base_config();
        let policy = policy_with(&[("aa", "192.168.1.5", true, false)]);

        let cidrs = apply_force_vpn(&mut config, &policy);
        assert_eq!(cidrs, ["192.168.1.5/32"]);
        assert_eq!(
            config.as_map()["route"]["rules"],
            json!([
                {"inbound": "socks-in", "outbound": "vpn"},
                {"source_ip_cidr": ["192.168.1.5/32"], "outbound": "vpn"},
                {"rule_set": ["vpn-domains"], "outbound": "vpn"}
            ])
        );
    }

    #[test]
    fn clearing_the_flag_removes_the_rule() {
        let mut config = base_config();
        apply_force_vpn(&mut config, &policy_with(&[("aa", "192.168.1.5", true, false)]));
        let cidrs = apply_force_vpn(&mut config, &policy_with(&[("aa", "192.168.1.5", false, false)]));

        assert!(cidrs.is_empty());
        assert_eq!(config.route(), base_config().route());
    }

    #[test]
    fn clearing_the_last_flag_of_two_clients() {
        let mut config = base_config();
        apply_force_vpn(
            &mut config,
            &policy_with(&[("aa", "192.168.1.5", true, false), ("bb", "192.168.1.6", false, false)]),
        );
        assert_eq!(
            config.as_map()["route"]["rules"][1],
            json!({"source_ip_cidr": ["192.168.1.5/32"], "outbound": "vpn"})
        );

        let cidrs = apply_force_vpn(
            &mut config,
            &policy_with(&[("aa", "192.168.1.5", false, false), ("bb", "192.168.1.6", false, false)]),
        );
        assert!(cidrs.is_empty());
        assert_eq!(config.route(), base_config().route());
    }

    #[test]
    fn mixed_selector_rules_are_recognised() {
        let mut config: ProxyConfig = serde_json::from_value(json!({
            "route": {
                "rules": [
                    {"inbound": "socks-in", "outbound": "vpn"},
                    {"inbound": "tun-in", "source_ip_cidr": ["192.168.1.9/32"], "outbound": "vpn"},
                    {"inbound": "tun-in", "rule_set": ["geoip-ru"], "outbound": "direct"}
                ]
            }
        }))
        .unwrap();
        apply_force_vpn(&mut config, &policy_with(&[("aa", "192.168.1.5", true, false)]));

        assert_eq!(
            config.as_map()["route"]["rules"],
            json!([
                {"inbound": "socks-in", "outbound": "vpn"},
                {"source_ip_cidr": ["192.168.1.5/32"], "outbound": "vpn"},
                {"inbound": "tun-in", "outbound": "direct", "rule_set": ["geoip-ru"]}
            ])
        );
    }

    #[test]
    fn reapplying_replaces_not_duplicates() {
        let mut config = base_config();
        let policy = policy_with(&[
            ("bb", "192.168.1.9", true, false),
            ("aa", "192.168.1.5", true, false),
            ("cc", "192.168.1.5/32", true, false),
        ]);
        apply_force_vpn(&mut config, &policy);
        apply_force_vpn(&mut config, &policy);

        let forced: Vec<_> = config
            .route()
            .rules
            .into_iter()
            .filter(is_force_vpn_rule)
            .collect();
        assert_eq!(forced.len(), 1);
        let Rule::SourceIpCidr(rule) = &forced[0] else {
            panic!("expected a source_ip_cidr rule");
        };
        assert_eq!(rule.cidrs, ["192.168.1.5/32", "192.168.1.9/32"]);
    }

    #[test]
    fn appends_without_rule_set() {
        let mut config = ProxyConfig::default();
        apply_force_vpn(&mut config, &policy_with(&[("aa", "192.168.1.5", true, false)]));
        let route = config.route();
        assert_eq!(route.rules.len(), 1);
        assert!(!has_domains_rule(&route));
    }

    #[test]
    fn foreign_source_rules_are_left_alone() {
        let mut config: ProxyConfig = serde_json::from_value(json!({
            "route": {"rules": [{"source_ip_cidr": ["10.8.0.0/24"], "outbound": "vpn"}]}
        }))
        .unwrap();
        apply_force_vpn(&mut config, &ClientPolicy::default());
        assert_eq!(config.route().rules.len(), 1);
    }

    #[test]
    fn udp_cidrs_skip_clients_without_ip() {
        let mut policy = policy_with(&[("aa", "192.168.1.20", false, true)]);
        policy.upsert(
            "bb",
            ClientPatch {
                force_udp_vpn: Some(true),
                ..ClientPatch::default()
            },
        );
        assert_eq!(force_udp_cidrs(&policy), ["192.168.1.20/32"]);
        assert!(force_vpn_cidrs(&policy).is_empty());
    }

    #[test]
    fn udp_cidrs_collapse_shared_addresses() {
        let policy = policy_with(&[
            ("cc", "192.168.1.30", false, true),
            ("aa", "192.168.1.20", false, true),
            ("bb", "192.168.1.20", false, true),
        ]);
        assert_eq!(
            force_udp_cidrs(&policy),
            ["192.168.1.20/32", "192.168.1.30/32"]
        );
    }
}
