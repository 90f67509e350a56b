// ── Policy documents and the proxy config shape ──
//
// Only the parts of the sing-box config this system touches are typed;
// everything else rides along as raw JSON so a read-modify-write cycle
// never loses keys it does not understand.

pub mod client;
pub mod domain;
pub mod outbound;
pub mod proxy;

pub use client::{ClientPatch, ClientPolicy, ClientRecord};
pub use domain::{DomainGroup, DomainPolicy, FlatRuleset, POLICY_VERSION, SuffixRule};
pub use outbound::{EndpointPatch, OutboundSummary, RealityPatch, TlsPatch, UtlsPatch};
pub use proxy::{
    CidrRule, DIRECT_OUTBOUND, InboundRule, ProxyConfig, Route, Rule, RuleSetRule, VPN_OUTBOUND,
};
