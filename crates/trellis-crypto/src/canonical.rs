//! Canonical JSON encoding.
//!
//! Object keys are written in byte-wise sorted order at every nesting level,
//! with no insignificant whitespace. The encoding does not depend on how the
//! `serde_json::Map` in hand happens to order its keys.

use serde_json::Value;
use trellis_types::ObjectId;

use crate::hasher::HasherError;

/// Encode `value` canonically.
pub fn to_canonical_vec(value: &Value) -> Result<Vec<u8>, HasherError> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), HasherError> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push(b'{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)
                    .map_err(|e| HasherError::Serialization(e.to_string()))?;
                out.push(b':');
                write_value(val, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        scalar => {
            serde_json::to_writer(&mut *out, scalar)
                .map_err(|e| HasherError::Serialization(e.to_string()))?;
        }
    }
    Ok(())
}

/// Produce the stored body: the canonical object with `"id"` spliced in as
/// its first key.
///
/// `canonical` must be the encoding of a JSON object.
pub fn embed_id(canonical: &[u8], id: &ObjectId) -> Vec<u8> {
    let hex = id.to_hex();
    let mut out = Vec::with_capacity(canonical.len() + hex.len() + 8);
    out.extend_from_slice(b"{\"id\":\"");
    out.extend_from_slice(hex.as_bytes());
    out.push(b'"');
    let rest = canonical.get(1..).unwrap_or_default();
    if rest != b"}" && !rest.is_empty() {
        out.push(b',');
    }
    out.extend_from_slice(rest);
    if rest.is_empty() {
        out.push(b'}');
    }
    out
}
