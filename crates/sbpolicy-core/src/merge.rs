//! Deep merge of a partial patch into an arbitrary JSON document.

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::{EndpointPatch, OutboundSummary, ProxyConfig};

/// Merge `src` into `dst`.
///
/// Objects merge key by key, recursively; keys missing from `src` keep
/// their value in `dst`. Anything else in `src` (scalars, arrays, nested
/// `null`) replaces the value in `dst` outright. A top-level `null` patch
/// leaves `dst` untouched.
pub fn merge(dst: &mut Value, src: Value) {
    match src {
        Value::Null => {}
        Value::Object(entries) => merge_object(dst, entries),
        other => *dst = other,
    }
}

fn merge_object(dst: &mut Value, entries: Map<String, Value>) {
    if !dst.is_object() {
        *dst = Value::Object(Map::new());
    }
    let Value::Object(target) = dst else {
        return;
    };
    for (key, value) in entries {
        match value {
            Value::Object(nested) => {
                merge_object(target.entry(key).or_insert(Value::Null), nested);
            }
            other => {
                target.insert(key, other);
            }
        }
    }
}

fn has_tag(outbound: &Value, tag: &str) -> bool {
    outbound.get("tag").and_then(Value::as_str) == Some(tag)
}

fn outbounds_invalid() -> CoreError {
    CoreError::validation("config.outbounds missing/invalid")
}

/// Merge a decoded link into the outbound tagged `tag`.
pub fn patch_outbound(
    config: &mut ProxyConfig,
    tag: &str,
    patch: &EndpointPatch,
) -> Result<(), CoreError> {
    let patch = serde_json::to_value(patch)?;
    let outbound = config
        .outbounds_mut()
        .ok_or_else(outbounds_invalid)?
        .iter_mut()
        .find(|outbound| has_tag(outbound, tag))
        .ok_or_else(|| CoreError::not_found("outbound", tag))?;
    merge(outbound, patch);
    Ok(())
}

/// Display-safe subset of the outbound tagged `tag`.
pub fn outbound_summary(config: &ProxyConfig, tag: &str) -> Result<OutboundSummary, CoreError> {
    let outbound = config
        .outbounds()
        .ok_or_else(outbounds_invalid)?
        .iter()
        .find(|outbound| has_tag(outbound, tag))
        .ok_or_else(|| CoreError::not_found("outbound", tag))?;
    Ok(OutboundSummary::from_outbound(tag, outbound))
}
