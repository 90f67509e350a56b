// ── VPN outbound endpoint ──

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The endpoint fields a decoded `vless://` link contributes to the `vpn`
/// outbound. Field order matches the order sing-box documents them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPatch {
    pub server: String,
    pub server_port: u16,
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsPatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsPatch {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utls: Option<UtlsPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reality: Option<RealityPatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtlsPatch {
    pub enabled: bool,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealityPatch {
    pub enabled: bool,
    pub public_key: String,
    pub short_id: String,
}

/// Secret-free view of an outbound for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundSummary {
    pub tag: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Value>,
}

impl OutboundSummary {
    /// Pick the display subset out of a raw outbound object. Fields of an
    /// unexpected type are left out rather than rejected.
    pub fn from_outbound(tag: &str, outbound: &Value) -> Self {
        let text = |key: &str| outbound.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            tag: tag.to_owned(),
            kind: text("type"),
            server: text("server"),
            server_port: outbound.get("server_port").and_then(Value::as_u64),
            uuid: text("uuid"),
            flow: text("flow"),
            tls: outbound.get("tls").cloned(),
        }
    }
}
