//! The one nftables block this system owns inside the firewall config.
//!
//! The firewall file is split into three opaque segments: everything up to
//! and including the begin-marker line, the owned body, and everything from
//! the end marker onward. Only the body is ever rewritten.

use crate::error::CoreError;

pub const SET_NAME: &str = "force_udp_vpn_clients";
pub const BEGIN_MARKER: &str = "# === SB-WEBUI:BEGIN force_udp_vpn_clients ===";
pub const END_MARKER: &str = "# === SB-WEBUI:END force_udp_vpn_clients ===";
/// Written in place of the `elements` line while the set is empty.
pub const ELEMENTS_PLACEHOLDER: &str = "    # SB-WEBUI-ELEMENTS";

/// Render the set definition for the given elements.
pub fn render_set(cidrs: &[String]) -> String {
    let elements = if cidrs.is_empty() {
        ELEMENTS_PLACEHOLDER.to_owned()
    } else {
        format!("    elements = {{ {} }}", cidrs.join(", "))
    };
    format!("\n  set {SET_NAME} {{\n    type ipv4_addr\n    flags interval\n{elements}\n  }}\n")
}

/// A firewall file cut at the marker lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkedFile<'a> {
    /// Up to and including the newline that ends the begin-marker line.
    pub prefix: &'a str,
    pub body: &'a str,
    /// From the start of the end marker to the end of the file.
    pub suffix: &'a str,
}

impl<'a> MarkedFile<'a> {
    pub fn locate(text: &'a str) -> Result<Self, CoreError> {
        let (Some(begin), Some(end)) = (text.find(BEGIN_MARKER), text.find(END_MARKER)) else {
            return Err(CoreError::precondition("nftables markers not found"));
        };
        let Some(newline) = text[begin..].find('\n') else {
            return Err(CoreError::precondition(
                "nftables BEGIN marker missing newline",
            ));
        };
        let body_start = begin + newline + 1;
        if end < body_start {
            return Err(CoreError::precondition(
                "nftables END marker precedes BEGIN marker",
            ));
        }
        Ok(Self {
            prefix: &text[..body_start],
            body: &text[body_start..end],
            suffix: &text[end..],
        })
    }

    pub fn with_body(&self, body: &str) -> String {
        let mut out = String::with_capacity(self.prefix.len() + body.len() + self.suffix.len());
        out.push_str(self.prefix);
        out.push_str(body);
        out.push_str(self.suffix);
        out
    }
}

/// Replace the owned block of `text` with the set for `cidrs`.
pub fn splice(text: &str, cidrs: &[String]) -> Result<String, CoreError> {
    Ok(MarkedFile::locate(text)?.with_body(&render_set(cidrs)))
}
