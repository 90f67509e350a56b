//! `vless://` share-link decoding.
//!
//! A link has the shape
//! `vless://<uuid>@<host>:<port>?type=tcp&security=reality&sni=..&pbk=..&sid=..#<name>`.
//! Decoding checks every field and reports all violations at once, so an
//! operator pasting a broken link sees the full list in one go.

use percent_encoding::percent_decode_str;
use url::Url;
use uuid::{Uuid, Variant};

use crate::error::CoreError;
use crate::model::{EndpointPatch, RealityPatch, TlsPatch, UtlsPatch};

const SCHEME_PREFIX: &str = "vless://";

const PUBLIC_KEY_LEN: std::ops::RangeInclusive<usize> = 20..=200;
const SHORT_ID_LEN: std::ops::RangeInclusive<usize> = 8..=32;

/// Decode a share link into the endpoint fields of the `vpn` outbound.
pub fn decode(uri: &str) -> Result<EndpointPatch, CoreError> {
    let uri = uri.trim();
    if !uri.starts_with(SCHEME_PREFIX) {
        return Err(CoreError::Validation {
            message: "Not a vless:// link".into(),
            details: vec!["Must start with vless://".into()],
        });
    }

    let url = Url::parse(uri).map_err(|err| CoreError::Validation {
        message: "Invalid VLESS URL".into(),
        details: vec![err.to_string()],
    })?;
    let query = QueryParams::from_url(&url);

    let mut errors = Vec::new();

    let uuid = percent_decode_str(url.username())
        .decode_utf8()
        .map(|decoded| decoded.trim().to_owned())
        .unwrap_or_default();
    if !is_uuid(&uuid) {
        errors.push("Invalid UUID in vless://<uuid>@host".to_owned());
    }

    let server = url.host_str().unwrap_or_default().to_owned();
    if !is_hostname(&server) {
        errors.push("Invalid server hostname".to_owned());
    }

    let server_port = url.port().filter(|port| *port > 0);
    if server_port.is_none() {
        errors.push("Invalid server port".to_owned());
    }

    let transport = query.get("type").unwrap_or_default().to_lowercase();
    if !transport.is_empty() && transport != "tcp" {
        errors.push(format!("Unsupported type=\"{transport}\" (only tcp supported)"));
    }

    let encryption = query.get("encryption").unwrap_or_default().to_lowercase();
    if !encryption.is_empty() && encryption != "none" {
        errors.push(format!(
            "Unsupported encryption=\"{encryption}\" (expected none)"
        ));
    }

    let security = query.get("security").unwrap_or_default().to_lowercase();
    if !matches!(security.as_str(), "" | "tls" | "reality") {
        errors.push(format!(
            "Invalid security=\"{security}\" (expected \"reality\" or \"tls\")"
        ));
    }

    let server_name = query.first_of(&["sni", "serverName"]);
    let fingerprint = query.first_of(&["fp", "fingerprint"]);
    let public_key = query.first_of(&["pbk", "publicKey"]).map(str::trim);
    let short_id = query.first_of(&["sid", "shortId"]).map(str::trim);
    let flow = query.get("flow").filter(|flow| !flow.is_empty());

    let reality = security == "reality";
    if reality {
        if server_name.is_none() {
            errors.push("Missing sni for reality".to_owned());
        }
        if !public_key.is_some_and(is_public_key) {
            errors.push("Missing/invalid pbk (reality public key)".to_owned());
        }
        if !short_id.is_some_and(is_short_id) {
            errors.push("Missing/invalid sid (reality short id)".to_owned());
        }
    }

    let Some(server_port) = server_port else {
        return Err(invalid_link(errors));
    };
    if !errors.is_empty() {
        return Err(invalid_link(errors));
    }

    let tls = (reality || security == "tls").then(|| TlsPatch {
        enabled: true,
        server_name: server_name.map(str::to_owned),
        utls: fingerprint.map(|fingerprint| UtlsPatch {
            enabled: true,
            fingerprint: fingerprint.to_owned(),
        }),
        reality: reality.then(|| RealityPatch {
            enabled: true,
            public_key: public_key.unwrap_or_default().to_owned(),
            short_id: short_id.unwrap_or_default().to_owned(),
        }),
    });

    Ok(EndpointPatch {
        server,
        server_port,
        uuid,
        flow: flow.map(str::to_owned),
        tls,
    })
}

/// The link's `#fragment`, percent-decoded and trimmed, when non-empty.
pub fn display_name(uri: &str) -> Option<String> {
    let url = Url::parse(uri.trim()).ok()?;
    let fragment = url.fragment()?;
    let decoded = percent_decode_str(fragment).decode_utf8_lossy();
    let name = decoded.trim();
    (!name.is_empty()).then(|| name.to_owned())
}

fn invalid_link(details: Vec<String>) -> CoreError {
    CoreError::Validation {
        message: "Invalid VLESS link".into(),
        details,
    }
}

/// Hyphenated RFC 4122 UUID, versions 1 through 5.
fn is_uuid(value: &str) -> bool {
    value.len() == 36
        && Uuid::try_parse(value).is_ok_and(|uuid| {
            (1..=5).contains(&uuid.get_version_num()) && uuid.get_variant() == Variant::RFC4122
        })
}

fn is_hostname(host: &str) -> bool {
    !host.is_empty()
        && host.contains('.')
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
}

fn is_public_key(key: &str) -> bool {
    PUBLIC_KEY_LEN.contains(&key.len())
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn is_short_id(id: &str) -> bool {
    SHORT_ID_LEN.contains(&id.len()) && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Decoded query pairs in link order.
struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    fn from_url(url: &Url) -> Self {
        Self(
            url.query_pairs()
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
        )
    }

    /// First occurrence of `key`, empty or not.
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// First non-empty value among the aliases, in the order given.
    fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .find(|value| !value.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const UUID: &str = "b831381d-6324-4d53-ad4f-8cda48b30811";
    const PBK: &str = "jNXHt1yRo0vDuchQlIP6Z0ZvjT3KtzVI-T4E7RoLJS0";

    fn details(err: CoreError) -> Vec<String> {
        match err {
            CoreError::Validation { details, .. } => details,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn reality_link_decodes() {
        let link = format!(
            "vless://{UUID}@vpn.example.com:443?type=tcp&security=reality&sni=www.microsoft.com&fp=chrome&pbk={PBK}&sid=6ba85179e30d4fc2&flow=xtls-rprx-vision#Home"
        );
        let patch = decode(&link).unwrap();
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({
                "server": "vpn.example.com",
                "server_port": 443,
                "uuid": UUID,
                "flow": "xtls-rprx-vision",
                "tls": {
                    "enabled": true,
                    "server_name": "www.microsoft.com",
                    "utls": {"enabled": true, "fingerprint": "chrome"},
                    "reality": {
                        "enabled": true,
                        "public_key": PBK,
                        "short_id": "6ba85179e30d4fc2"
                    }
                }
            })
        );
    }

    #[test]
    fn missing_public_key_is_the_only_detail() {
        let link = format!(
            "vless://{UUID}@vpn.example.com:443?security=reality&sni=www.microsoft.com&sid=6ba85179e30d4fc2"
        );
        let err = decode(&link).unwrap_err();
        assert_eq!(err.to_string(), "Invalid VLESS link");
        assert_eq!(details(err), ["Missing/invalid pbk (reality public key)"]);
    }

    #[test]
    fn aliases_fall_back_when_primary_is_empty() {
        let link = format!(
            "vless://{UUID}@vpn.example.com:8443?security=reality&sni=&serverName=cdn.example.com&publicKey={PBK}&shortId=ABCDEF01"
        );
        let patch = decode(&link).unwrap();
        let tls = patch.tls.unwrap();
        assert_eq!(tls.server_name.as_deref(), Some("cdn.example.com"));
        assert_eq!(tls.reality.unwrap().short_id, "ABCDEF01");
        assert!(tls.utls.is_none());
    }

    #[test]
    fn plain_link_has_no_tls() {
        let patch = decode(&format!("  vless://{UUID}@1.2.3.4:80  ")).unwrap();
        assert_eq!(patch.server, "1.2.3.4");
        assert_eq!(patch.server_port, 80);
        assert!(patch.tls.is_none());
        assert!(patch.flow.is_none());
    }

    #[test]
    fn tls_link_keeps_server_name() {
        let patch =
            decode(&format!("vless://{UUID}@vpn.example.com:443?security=TLS&sni=vpn.example.com"))
                .unwrap();
        let tls = patch.tls.unwrap();
        assert!(tls.enabled);
        assert!(tls.reality.is_none());
        assert_eq!(tls.server_name.as_deref(), Some("vpn.example.com"));
    }

    #[test]
    fn every_violation_is_reported() {
        let err = decode("vless://not-a-uuid@localhost:0?type=ws&encryption=aes&security=xtls")
            .unwrap_err();
        assert_eq!(
            details(err),
            [
                "Invalid UUID in vless://<uuid>@host",
                "Invalid server hostname",
                "Invalid server port",
                "Unsupported type=\"ws\" (only tcp supported)",
                "Unsupported encryption=\"aes\" (expected none)",
                "Invalid security=\"xtls\" (expected \"reality\" or \"tls\")",
            ]
        );
    }

    #[test]
    fn wrong_scheme_fails_fast() {
        let err = decode("vmess://abc").unwrap_err();
        assert_eq!(err.to_string(), "Not a vless:// link");
        assert_eq!(details(err), ["Must start with vless://"]);
    }

    #[test]
    fn unparseable_url_fails_fast() {
        let err = decode(&format!("vless://{UUID}@vpn.example.com:99999")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid VLESS URL");
        assert_eq!(details(err).len(), 1);
    }

    #[test]
    fn uuid_version_and_variant_are_checked() {
        assert!(is_uuid(UUID));
        assert!(is_uuid(&UUID.to_uppercase()));
        assert!(!is_uuid("b831381d-6324-0d53-ad4f-8cda48b30811"));
        assert!(!is_uuid("b831381d-6324-4d53-cd4f-8cda48b30811"));
        assert!(!is_uuid("b831381d63244d53ad4f8cda48b30811"));
    }

    #[test]
    fn display_name_decodes_fragment() {
        assert_eq!(
            display_name(&format!("vless://{UUID}@a.example:1#My%20Node")).as_deref(),
            Some("My Node")
        );
        assert_eq!(display_name(&format!("vless://{UUID}@a.example:1#")), None);
        assert_eq!(display_name(&format!("vless://{UUID}@a.example:1")), None);
    }
}
