// ── sing-box config document ──
//
// `ProxyConfig` is the raw JSON object; `Route` and `Rule` are typed views
// over the one subtree this system rewrites. Unknown keys are carried
// through in their original positions wherever the structure allows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Outbound tag of the VPN tunnel.
pub const VPN_OUTBOUND: &str = "vpn";
/// Outbound tag of the direct (non-tunnelled) path.
pub const DIRECT_OUTBOUND: &str = "direct";

/// The sing-box configuration document, externally owned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProxyConfig(Map<String, Value>);

impl ProxyConfig {
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(CoreError::validation("Proxy config must be a JSON object")),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Typed view of `route`. A missing or non-object `route` reads as an
    /// empty one.
    pub fn route(&self) -> Route {
        match self.0.get("route") {
            Some(Value::Object(map)) => Route::from_map(map.clone()),
            _ => Route::default(),
        }
    }

    /// Write a route back, keeping `route`'s position among the top-level keys.
    pub fn set_route(&mut self, route: Route) {
        self.0
            .insert("route".to_owned(), Value::Object(route.into_map()));
    }

    /// `None` when `outbounds` is missing or not an array.
    pub fn outbounds(&self) -> Option<&Vec<Value>> {
        self.0.get("outbounds").and_then(Value::as_array)
    }

    pub fn outbounds_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.0.get_mut("outbounds").and_then(Value::as_array_mut)
    }
}

// ── Route ────────────────────────────────────────────────────────────

/// Typed view of the `route` object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    pub rules: Vec<Rule>,
    /// `route.final`.
    pub final_outbound: Option<String>,
    rest: Map<String, Value>,
}

impl Route {
    /// Build from a raw `route` object. A non-array `rules` reads as empty.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        // Leave a placeholder so `rules` keeps its slot on the way back out.
        let rules = match map.get_mut("rules").map(Value::take) {
            Some(Value::Array(items)) => items.into_iter().map(Rule::from).collect(),
            _ => Vec::new(),
        };
        let final_outbound = map
            .get("final")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Self {
            rules,
            final_outbound,
            rest: map,
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        let mut map = self.rest;
        map.insert(
            "rules".to_owned(),
            Value::Array(self.rules.into_iter().map(Value::from).collect()),
        );
        if let Some(final_outbound) = self.final_outbound {
            map.insert("final".to_owned(), Value::String(final_outbound));
        }
        map
    }
}

// ── Rule ─────────────────────────────────────────────────────────────

/// One entry of `route.rules`, classified by its selector field.
///
/// Classification order is `inbound` (string), `rule_set`,
/// `source_ip_cidr`, then `ip_cidr` (string arrays). The first match wins;
/// any other selector on the same rule rides along in `extra`. Anything
/// else is kept verbatim as [`Rule::Other`].
///
/// The variant only decides where the first selector is stored. Code that
/// looks for a slot goes through the selector accessors
/// ([`Rule::inbound`], [`Rule::rule_set`], [`Rule::source_ip_cidr`],
/// [`Rule::ip_cidr`]), which see a selector whichever variant holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Rule {
    Inbound(InboundRule),
    RuleSet(RuleSetRule),
    SourceIpCidr(CidrRule),
    IpCidr(CidrRule),
    Other(Value),
}

impl Rule {
    pub fn outbound(&self) -> Option<&str> {
        match self {
            Self::Inbound(rule) => rule.outbound.as_deref(),
            Self::RuleSet(rule) => rule.outbound.as_deref(),
            Self::SourceIpCidr(rule) | Self::IpCidr(rule) => rule.outbound.as_deref(),
            Self::Other(value) => value.get("outbound").and_then(Value::as_str),
        }
    }

    /// Point the rule at `tag`, whatever selector it carries.
    pub fn set_outbound(&mut self, tag: &str) {
        let (slot, extra) = match self {
            Self::Inbound(rule) => (&mut rule.outbound, &mut rule.extra),
            Self::RuleSet(rule) => (&mut rule.outbound, &mut rule.extra),
            Self::SourceIpCidr(rule) | Self::IpCidr(rule) => (&mut rule.outbound, &mut rule.extra),
            Self::Other(Value::Object(map)) => {
                map.insert("outbound".to_owned(), Value::String(tag.to_owned()));
                return;
            }
            Self::Other(_) => return,
        };
        // a non-string outbound was parked in `extra`
        extra.remove("outbound");
        *slot = Some(tag.to_owned());
    }

    /// `inbound`, when it is a single string.
    pub fn inbound(&self) -> Option<&str> {
        match self {
            Self::Inbound(rule) => Some(rule.inbound.as_str()),
            _ => self.untyped(INBOUND).and_then(Value::as_str),
        }
    }

    /// `rule_set`, when present as a string array.
    pub fn rule_set(&self) -> Option<Vec<&str>> {
        match self {
            Self::RuleSet(rule) => Some(rule.rule_set.iter().map(String::as_str).collect()),
            _ => self.untyped_strings(RULE_SET),
        }
    }

    /// `source_ip_cidr`, when present as a string array.
    pub fn source_ip_cidr(&self) -> Option<Vec<&str>> {
        match self {
            Self::SourceIpCidr(rule) => Some(rule.cidrs.iter().map(String::as_str).collect()),
            _ => self.untyped_strings(SOURCE_IP_CIDR),
        }
    }

    /// `ip_cidr`, when present as a string array.
    pub fn ip_cidr(&self) -> Option<Vec<&str>> {
        match self {
            Self::IpCidr(rule) => Some(rule.cidrs.iter().map(String::as_str).collect()),
            _ => self.untyped_strings(IP_CIDR),
        }
    }

    /// A field that is not this variant's own selector.
    fn untyped(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Inbound(rule) => rule.extra.get(key),
            Self::RuleSet(rule) => rule.extra.get(key),
            Self::SourceIpCidr(rule) | Self::IpCidr(rule) => rule.extra.get(key),
            Self::Other(value) => value.get(key),
        }
    }

    fn untyped_strings(&self, key: &str) -> Option<Vec<&str>> {
        let items = self.untyped(key)?.as_array()?;
        items.iter().map(Value::as_str).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundRule {
    pub inbound: String,
    pub outbound: Option<String>,
    pub extra: Map<String, Value>,
}

impl InboundRule {
    pub fn new(inbound: &str, outbound: &str) -> Self {
        Self {
            inbound: inbound.to_owned(),
            outbound: Some(outbound.to_owned()),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleSetRule {
    pub rule_set: Vec<String>,
    pub outbound: Option<String>,
    pub extra: Map<String, Value>,
}

impl RuleSetRule {
    pub fn new(rule_set: &str, outbound: &str) -> Self {
        Self {
            rule_set: vec![rule_set.to_owned()],
            outbound: Some(outbound.to_owned()),
            extra: Map::new(),
        }
    }
}

/// Shared shape of `ip_cidr` and `source_ip_cidr` rules.
#[derive(Debug, Clone, PartialEq)]
pub struct CidrRule {
    pub cidrs: Vec<String>,
    pub outbound: Option<String>,
    pub extra: Map<String, Value>,
}

impl CidrRule {
    pub fn new(cidrs: Vec<String>, outbound: &str) -> Self {
        Self {
            cidrs,
            outbound: Some(outbound.to_owned()),
            extra: Map::new(),
        }
    }
}

const INBOUND: &str = "inbound";
const RULE_SET: &str = "rule_set";
const SOURCE_IP_CIDR: &str = "source_ip_cidr";
const IP_CIDR: &str = "ip_cidr";

fn is_string_list(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Array(items)) if items.iter().all(Value::is_string))
}

fn into_strings(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Split a rule object into its selector value, a string `outbound`, and
/// everything else in original order.
fn split_fields(
    map: Map<String, Value>,
    selector: &str,
) -> (Value, Option<String>, Map<String, Value>) {
    let mut selected = Value::Null;
    let mut outbound = None;
    let mut extra = Map::new();
    for (key, value) in map {
        if key == selector {
            selected = value;
        } else if key == "outbound" {
            match value {
                Value::String(tag) => outbound = Some(tag),
                other => {
                    extra.insert(key, other);
                }
            }
        } else {
            extra.insert(key, value);
        }
    }
    (selected, outbound, extra)
}

fn assemble(
    selector: &str,
    selected: Value,
    outbound: Option<String>,
    extra: Map<String, Value>,
) -> Value {
    let mut map = Map::with_capacity(extra.len() + 2);
    map.insert(selector.to_owned(), selected);
    if let Some(outbound) = outbound {
        map.insert("outbound".to_owned(), Value::String(outbound));
    }
    map.extend(extra);
    Value::Object(map)
}

fn string_array(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}

impl From<Value> for Rule {
    fn from(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self::Other(value);
        };

        if matches!(map.get(INBOUND), Some(Value::String(_))) {
            let (selected, outbound, extra) = split_fields(map, INBOUND);
            let inbound = selected.as_str().unwrap_or_default().to_owned();
            return Self::Inbound(InboundRule {
                inbound,
                outbound,
                extra,
            });
        }
        if is_string_list(map.get(RULE_SET)) {
            let (selected, outbound, extra) = split_fields(map, RULE_SET);
            return Self::RuleSet(RuleSetRule {
                rule_set: into_strings(selected),
                outbound,
                extra,
            });
        }
        if is_string_list(map.get(SOURCE_IP_CIDR)) {
            let (selected, outbound, extra) = split_fields(map, SOURCE_IP_CIDR);
            return Self::SourceIpCidr(CidrRule {
                cidrs: into_strings(selected),
                outbound,
                extra,
            });
        }
        if is_string_list(map.get(IP_CIDR)) {
            let (selected, outbound, extra) = split_fields(map, IP_CIDR);
            return Self::IpCidr(CidrRule {
                cidrs: into_strings(selected),
                outbound,
                extra,
            });
        }
        Self::Other(Value::Object(map))
    }
}

impl From<Rule> for Value {
    fn from(rule: Rule) -> Self {
        match rule {
            Rule::Inbound(rule) => assemble(
                INBOUND,
                Value::String(rule.inbound),
                rule.outbound,
                rule.extra,
            ),
            Rule::RuleSet(rule) => assemble(
                RULE_SET,
                string_array(rule.rule_set),
                rule.outbound,
                rule.extra,
            ),
            Rule::SourceIpCidr(rule) => assemble(
                SOURCE_IP_CIDR,
                string_array(rule.cidrs),
                rule.outbound,
                rule.extra,
            ),
            Rule::IpCidr(rule) => {
                assemble(IP_CIDR, string_array(rule.cidrs), rule.outbound, rule.extra)
            }
            Rule::Other(value) => value,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn rules_classify_by_selector() {
        let rules: Vec<Rule> = serde_json::from_value(json!([
            {"inbound": "socks-in", "outbound": "direct"},
            {"rule_set": ["vpn-domains"], "outbound": "vpn"},
            {"source_ip_cidr": ["192.168.1.5/32"], "outbound": "vpn"},
            {"ip_cidr": ["10.0.0.0/8"], "outbound": "direct"},
            {"protocol": "dns", "action": "hijack-dns"},
            {"inbound": ["tun-in"], "outbound": "vpn"}
        ]))
        .unwrap();

        assert!(matches!(&rules[0], Rule::Inbound(rule) if rule.inbound == "socks-in"));
        assert!(matches!(&rules[1], Rule::RuleSet(rule) if rule.rule_set == ["vpn-domains"]));
        assert!(matches!(&rules[2], Rule::SourceIpCidr(_)));
        assert!(matches!(&rules[3], Rule::IpCidr(_)));
        assert!(matches!(&rules[4], Rule::Other(_)));
        assert!(matches!(&rules[5], Rule::Other(_)));
        assert_eq!(rules[1].outbound(), Some("vpn"));
    }

    #[test]
    fn selectors_are_visible_from_any_variant() {
        let rules: Vec<Rule> = serde_json::from_value(json!([
            {"inbound": "tun-in", "rule_set": ["vpn-domains"], "outbound": "vpn"},
            {"rule_set": ["geoip-ru"], "ip_cidr": ["10.0.0.0/8"], "outbound": "direct"},
            {"inbound": ["tun-in"], "source_ip_cidr": ["192.168.1.5/32"], "outbound": "vpn"},
            {"rule_set": ["a", 1], "outbound": "vpn"}
        ]))
        .unwrap();

        assert!(matches!(&rules[0], Rule::Inbound(_)));
        assert_eq!(rules[0].inbound(), Some("tun-in"));
        assert_eq!(rules[0].rule_set(), Some(vec!["vpn-domains"]));
        assert_eq!(rules[1].ip_cidr(), Some(vec!["10.0.0.0/8"]));
        assert_eq!(rules[1].rule_set(), Some(vec!["geoip-ru"]));
        assert_eq!(rules[2].inbound(), None);
        assert_eq!(rules[2].source_ip_cidr(), Some(vec!["192.168.1.5/32"]));
        assert_eq!(rules[3].rule_set(), None);
        assert_eq!(rules[3].ip_cidr(), None);
    }

    #[test]
    fn set_outbound_on_a_mixed_rule() {
        let mut rule: Rule = serde_json::from_value(
            json!({"inbound": "tun-in", "rule_set": ["vpn-domains"], "outbound": "vpn"}),
        )
        .unwrap();
        rule.set_outbound("direct");
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!({"inbound": "tun-in", "outbound": "direct", "rule_set": ["vpn-domains"]})
        );

        let mut rule: Rule =
            serde_json::from_value(json!({"protocol": "dns", "outbound": 3})).unwrap();
        rule.set_outbound("vpn");
        assert_eq!(rule.outbound(), Some("vpn"));
    }

    #[test]
    fn unknown_rule_keys_survive() {
        let raw = json!({"rule_set": ["vpn-domains"], "outbound": "vpn", "invert": false});
        let rule: Rule = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&rule).unwrap(), raw);
    }

    #[test]
    fn route_keeps_key_positions() {
        let config: ProxyConfig = serde_json::from_value(json!({
            "log": {"level": "info"},
            "route": {"rule_set": [], "rules": [], "final": "direct", "auto_detect_interface": true},
            "experimental": {}
        }))
        .unwrap();

        let mut route = config.route();
        route.final_outbound = Some("vpn".into());
        let mut updated = config.clone();
        updated.set_route(route);

        let keys: Vec<&str> = updated.as_map().keys().map(String::as_str).collect();
        assert_eq!(keys, ["log", "route", "experimental"]);
        let route_keys: Vec<&String> = updated.as_map()["route"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(route_keys, ["rule_set", "rules", "final", "auto_detect_interface"]);
        assert_eq!(updated.as_map()["route"]["final"], "vpn");
    }

    #[test]
    fn malformed_route_reads_as_empty() {
        let config: ProxyConfig =
            serde_json::from_value(json!({"route": {"rules": "nope"}})).unwrap();
        assert!(config.route().rules.is_empty());

        let config: ProxyConfig = serde_json::from_value(json!({"route": 7})).unwrap();
        assert_eq!(config.route(), Route::default());
    }

    #[test]
    fn non_object_config_is_rejected() {
        let err = ProxyConfig::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }
}
