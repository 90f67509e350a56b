//! Host side of sbpolicy: files, the proxy daemon, the firewall and LAN
//! discovery.
//!
//! The pure compilers in `sbpolicy-core` never touch the system. This crate
//! wires them to it:
//!
//! - **[`DocumentStore`]**: JSON/text reads with missing-file tolerance,
//!   atomic writes with an optional `sudo install` fallback, and
//!   seed-on-first-read for the policy documents.
//! - **[`ServiceControl`]** / **[`FirewallReload`]**: restart and query the
//!   daemon ([`Systemd`]) and load nftables rules ([`Nft`]).
//! - **[`ClientDiscovery`]**: dnsmasq leases ([`DhcpLeases`]) or the
//!   Pi-hole API ([`PiHole`]).
//! - **[`TemplateStore`]**: saved `vless://` links.
//! - **[`Reconciler`]**: read → compile → write → restart for every
//!   operator action, one writer at a time.

pub mod command;
pub mod discovery;
pub mod error;
pub mod firewall;
pub mod reconciler;
pub mod service;
pub mod store;
pub mod templates;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::Runner;
pub use discovery::{
    ClientDiscovery, DhcpLeases, DiscoveredClient, Discovery, DiscoverySource, PiHole,
};
pub use error::HostError;
pub use firewall::{FirewallReload, Nft};
pub use reconciler::{DomainsApplied, LinkSource, Paths, Reconciler, VpnReport};
pub use service::{ServiceControl, ServiceStatus, Systemd};
pub use store::DocumentStore;
pub use templates::{Template, TemplateEntry, TemplateStore};
