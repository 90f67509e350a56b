//! VPN on/off and routing mode, encoded into `route.rules` and `route.final`.
//!
//! The state is never stored on its own. Three rule slots carry it, each
//! identified structurally rather than by position:
//!
//! - the `inbound == "socks-in"` rule, whose outbound mirrors `enabled`;
//! - the rule whose `rule_set` names `vpn-domains`, same outbound;
//! - the LAN-bypass `ip_cidr` rules, present while everything is tunnelled.
//!
//! `route.final` is `vpn` only when the VPN is on with [`VpnPolicy::All`].
//! Once the VPN is off the policy cannot be recovered.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{
    CidrRule, DIRECT_OUTBOUND, InboundRule, ProxyConfig, Route, Rule, RuleSetRule, VPN_OUTBOUND,
};

/// Inbound whose traffic follows the VPN switch.
pub const SOCKS_INBOUND: &str = "socks-in";
/// Rule set compiled from the enabled domain groups.
pub const VPN_DOMAINS_RULE_SET: &str = "vpn-domains";
/// Private and link-local ranges kept off the tunnel in full-tunnel mode.
pub const LAN_BYPASS_CIDRS: [&str; 5] = [
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "127.0.0.0/8",
    "169.254.0.0/16",
];

/// What goes through the tunnel when the VPN is on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VpnPolicy {
    /// Only the domains of the `vpn-domains` rule set.
    #[default]
    Domains,
    /// Everything except the LAN-bypass ranges.
    All,
}

impl VpnPolicy {
    /// Lenient parse: anything other than `all` means [`VpnPolicy::Domains`].
    pub fn coerce(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnState {
    pub enabled: bool,
    pub policy: VpnPolicy,
}

/// Rewrite the config's routing rules for the given VPN state.
pub fn encode(config: &mut ProxyConfig, enabled: bool, policy: VpnPolicy) {
    let mut route = config.route();
    encode_route(&mut route, enabled, policy);
    config.set_route(route);
}

/// Recover the VPN state from the config's routing rules.
pub fn decode(config: &ProxyConfig) -> VpnState {
    decode_route(&config.route())
}

pub fn encode_route(route: &mut Route, enabled: bool, policy: VpnPolicy) {
    let target = if enabled { VPN_OUTBOUND } else { DIRECT_OUTBOUND };

    match route.rules.iter_mut().find(|rule| is_socks_rule(rule)) {
        Some(rule) => rule.set_outbound(target),
        None => route.rules.insert(
            0,
            Rule::Inbound(InboundRule::new(SOCKS_INBOUND, target)),
        ),
    }

    match route.rules.iter_mut().find(|rule| is_domains_rule(rule)) {
        Some(rule) => rule.set_outbound(target),
        None => route
            .rules
            .push(Rule::RuleSet(RuleSetRule::new(VPN_DOMAINS_RULE_SET, target))),
    }

    let full_tunnel = enabled && policy == VpnPolicy::All;
    route.final_outbound = Some(
        if full_tunnel {
            VPN_OUTBOUND
        } else {
            DIRECT_OUTBOUND
        }
        .to_owned(),
    );

    if full_tunnel {
        ensure_lan_bypass(&mut route.rules);
    }
}

pub fn decode_route(route: &Route) -> VpnState {
    let enabled = route
        .rules
        .iter()
        .find(|rule| is_domains_rule(rule))
        .is_some_and(|rule| rule.outbound() == Some(VPN_OUTBOUND));
    let policy = if route.final_outbound.as_deref() == Some(VPN_OUTBOUND) {
        VpnPolicy::All
    } else {
        VpnPolicy::Domains
    };
    VpnState { enabled, policy }
}

/// The rule whose `rule_set` names the domain list, whatever other
/// selectors it also carries.
pub fn is_domains_rule(rule: &Rule) -> bool {
    rule.rule_set()
        .is_some_and(|names| names.contains(&VPN_DOMAINS_RULE_SET))
}

fn is_socks_rule(rule: &Rule) -> bool {
    rule.inbound() == Some(SOCKS_INBOUND)
}

fn bypass_cidr(rule: &Rule) -> Option<&str> {
    rule.ip_cidr()?.first().copied()
}

/// Prepend every missing bypass rule, in the fixed order, ahead of all
/// existing rules. A bypass rule counts as present when some `ip_cidr`
/// rule lists its CIDR first.
fn ensure_lan_bypass(rules: &mut Vec<Rule>) {
    let missing: Vec<Rule> = LAN_BYPASS_CIDRS
        .iter()
        .filter(|cidr| !rules.iter().any(|rule| bypass_cidr(rule) == Some(**cidr)))
        .map(|cidr| Rule::IpCidr(CidrRule::new(vec![(*cidr).to_owned()], DIRECT_OUTBOUND)))
        .collect();
    let existing = std::mem::replace(rules, missing);
    rules.extend(existing);
}
