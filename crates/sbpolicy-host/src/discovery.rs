// ── LAN client discovery ──
//
// Two sources feed the same `DiscoveredClient` list: a dnsmasq lease file
// and the Pi-hole query-sources API. Discovery is read-only and never
// touches the client policy.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::debug;
use url::Url;

use crate::error::HostError;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DiscoverySource {
    #[default]
    Leases,
    Pihole,
}

/// A client seen on the LAN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredClient {
    pub mac: String,
    pub ip: String,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Lease expiry as a unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    pub source: DiscoverySource,
}

pub trait ClientDiscovery: Send + Sync {
    fn clients(&self) -> impl Future<Output = Result<Vec<DiscoveredClient>, HostError>> + Send;
}

// ── dnsmasq leases ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DhcpLeases {
    path: PathBuf,
}

impl DhcpLeases {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ClientDiscovery for DhcpLeases {
    async fn clients(&self) -> Result<Vec<DiscoveredClient>, HostError> {
        debug!(path = %self.path.display(), "reading dhcp leases");
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| HostError::upstream(format!("Cannot read leases: {err}")))?;
        Ok(parse_leases(&raw))
    }
}

/// Parse dnsmasq's `expires mac ip hostname client-id` lines.
///
/// A later line for the same MAC replaces the earlier one but keeps its
/// position.
pub fn parse_leases(raw: &str) -> Vec<DiscoveredClient> {
    let mut clients: Vec<DiscoveredClient> = Vec::new();
    for line in raw.lines() {
        let mut fields = line.split_whitespace();
        let expires = fields.next();
        let (Some(mac), Some(ip)) = (fields.next(), fields.next()) else {
            continue;
        };
        let hostname = fields.next().filter(|name| *name != "*").unwrap_or_default();
        let client = DiscoveredClient {
            mac: mac.to_owned(),
            ip: ip.to_owned(),
            hostname: hostname.to_owned(),
            client_id: fields.next().map(str::to_owned),
            expires: expires.and_then(|expires| expires.parse().ok()),
            source: DiscoverySource::Leases,
        };
        match clients.iter_mut().find(|known| known.mac == client.mac) {
            Some(known) => *known = client,
            None => clients.push(client),
        }
    }
    clients
}

// ── Pi-hole ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PiHole {
    http: reqwest::Client,
    url: Url,
}

impl PiHole {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, HostError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sbpolicy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl ClientDiscovery for PiHole {
    async fn clients(&self) -> Result<Vec<DiscoveredClient>, HostError> {
        debug!("GET {}", self.url);
        let response = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(|err| HostError::upstream(format!("Pi-hole API failure: {err}")))?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(HostError::upstream(format!(
                "Pi-hole API returned {}",
                status.as_u16()
            )));
        }
        let body = response.text().await?;
        let json: Value = serde_json::from_str(&body).map_err(|err| {
            HostError::upstream(format!("Pi-hole API returned invalid JSON: {err}"))
        })?;
        Ok(parse_pihole(&json))
    }
}

/// First truthy field among `keys`, rendered as a trimmed string.
fn first_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key)? {
        Value::String(text) if !text.is_empty() => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

/// Entries come from `data[]` or a bare top-level array.
pub fn parse_pihole(json: &Value) -> Vec<DiscoveredClient> {
    let items = json
        .get("data")
        .and_then(Value::as_array)
        .or_else(|| json.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    items
        .iter()
        .filter_map(|item| {
            let ip = first_field(item, &["address", "ip", "client"]).filter(|ip| !ip.is_empty())?;
            let hostname = first_field(item, &["name", "hostname", "ip"])
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "unknown".to_owned());
            Some(DiscoveredClient {
                mac: first_field(item, &["mac", "hardware"]).unwrap_or_default(),
                ip,
                hostname,
                client_id: None,
                expires: None,
                source: DiscoverySource::Pihole,
            })
        })
        .collect()
}

// ── Configured source ────────────────────────────────────────────────

/// The discovery source selected in configuration.
#[derive(Debug, Clone)]
pub enum Discovery {
    Leases(DhcpLeases),
    PiHole(PiHole),
}

impl Discovery {
    pub fn source(&self) -> DiscoverySource {
        match self {
            Self::Leases(_) => DiscoverySource::Leases,
            Self::PiHole(_) => DiscoverySource::Pihole,
        }
    }
}

impl ClientDiscovery for Discovery {
    async fn clients(&self) -> Result<Vec<DiscoveredClient>, HostError> {
        match self {
            Self::Leases(leases) => leases.clients().await,
            Self::PiHole(pihole) => pihole.clients().await,
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
    fn leases_dedupe_by_mac_in_first_seen_order() {
        let raw = "\
1700000000 aa:aa:aa:aa:aa:aa 192.168.1.10 laptop 01:aa:aa:aa:aa:aa:aa

1700000100 bb:bb:bb:bb:bb:bb 192.168.1.11 * *
garbage
1700000200 aa:aa:aa:aa:aa:aa 192.168.1.12 laptop-renamed
";
        let clients = parse_leases(raw);
        assert_eq!(clients.len(), 2);

        assert_eq!(clients[0].mac, "aa:aa:aa:aa:aa:aa");
        assert_eq!(clients[0].ip, "192.168.1.12");
        assert_eq!(clients[0].hostname, "laptop-renamed");
        assert_eq!(clients[0].client_id, None);
        assert_eq!(clients[0].expires, Some(1_700_000_200));

        assert_eq!(clients[1].hostname, "");
        assert_eq!(clients[1].client_id.as_deref(), Some("*"));
        assert_eq!(clients[1].source, DiscoverySource::Leases);
    }

    #[test]
    fn pihole_field_fallbacks() {
        let clients = parse_pihole(&json!({
            "data": [
                {"address": "192.168.1.20", "name": "tv", "mac": "cc:cc:cc:cc:cc:cc"},
                {"ip": "192.168.1.21", "hardware": "dd:dd:dd:dd:dd:dd"},
                {"client": "192.168.1.22", "hostname": "  "},
                {"name": "no-address"}
            ]
        }));

        assert_eq!(clients.len(), 3);
        assert_eq!(clients[0].hostname, "tv");
        assert_eq!(clients[1].hostname, "192.168.1.21");
        assert_eq!(clients[1].mac, "dd:dd:dd:dd:dd:dd");
        assert_eq!(clients[2].hostname, "unknown");
        assert_eq!(clients[2].mac, "");
    }

    #[test]
    fn pihole_accepts_bare_array() {
        let clients = parse_pihole(&json!([{"ip": "10.0.0.2"}]));
        assert_eq!(clients.len(), 1);
        assert!(parse_pihole(&json!({"status": "ok"})).is_empty());
    }

    #[test]
    fn source_names() {
        assert_eq!(DiscoverySource::Pihole.to_string(), "pihole");
        assert_eq!("leases".parse::<DiscoverySource>().unwrap(), DiscoverySource::Leases);
    }
}
