//! Policy-to-configuration compilers for a sing-box host.
//!
//! Everything in this crate is synchronous and side-effect free. Callers
//! hand in declarative policy documents and get back the exact artifacts
//! the proxy daemon and the firewall consume:
//!
//! - **[`link`]**: decodes a `vless://` URI into a validated
//!   [`EndpointPatch`] for the `vpn` outbound.
//! - **[`domains`]**: normalizes and validates domain suffixes, and compiles
//!   enabled [`DomainGroup`]s into a deduplicated, sorted [`FlatRuleset`].
//! - **[`routing`]**: encodes VPN on/off plus a [`VpnPolicy`] into the
//!   ordered `route.rules` list and `route.final`, and decodes them back.
//! - **[`overrides`]** / **[`firewall`]**: per-client overrides become a
//!   source-IP routing rule and the body of an nftables address set spliced
//!   between marker lines.
//! - **[`merge`]**: deep-merges a partial patch into an arbitrary JSON
//!   document without dropping unrelated keys.
//!
//! Reading files, restarting services and reloading the firewall live in
//! `sbpolicy-host`.

pub mod defaults;
pub mod domains;
pub mod error;
pub mod firewall;
pub mod link;
pub mod merge;
pub mod model;
pub mod overrides;
pub mod routing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::CoreError;
pub use routing::{VpnPolicy, VpnState};

pub use model::{
    CidrRule, ClientPatch, ClientPolicy, ClientRecord, DIRECT_OUTBOUND, DomainGroup, DomainPolicy,
    EndpointPatch, FlatRuleset, InboundRule, OutboundSummary, ProxyConfig, RealityPatch, Route,
    Rule, RuleSetRule, SuffixRule, TlsPatch, UtlsPatch, VPN_OUTBOUND,
};
