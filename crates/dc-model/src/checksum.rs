//! Canvas fingerprints
//!
//! [`checksum`] is the sole mechanism for deciding whether the canvas has
//! changed since the last save. Client fingerprints carry the
//! [`CLIENT_CHECKSUM_PREFIX`]; host-assigned checksums are bare hex digests,
//! so the two namespaces never compare equal by accident.

use crate::project::CanvasSnapshot;
use serde_json::Value;

/// Prefix marking client-computed checksums
pub const CLIENT_CHECKSUM_PREFIX: &str = "front-";

/// Fingerprint a canvas snapshot
///
/// Deterministic and total: `None` fingerprints the same as the empty
/// document `{}`. Object keys are sorted before hashing, so two documents
/// that differ only in key order share a fingerprint.
#[must_use]
pub fn checksum(snapshot: Option<&CanvasSnapshot>) -> String {
    let mut canonical = String::new();
    match snapshot {
        Some(snapshot) => write_canonical(snapshot.as_value(), &mut canonical),
        None => canonical.push_str("{}"),
    }

    let digest = blake3::hash(canonical.as_bytes());
    let mut folded = [0u8; 8];
    folded.copy_from_slice(&digest.as_bytes()[..8]);
    let value = u64::from_be_bytes(folded);

    format!("{CLIENT_CHECKSUM_PREFIX}{value:016x}")
}

/// Whether a checksum was computed on the client
#[inline]
#[must_use]
pub fn is_client_checksum(value: &str) -> bool {
    value.starts_with(CLIENT_CHECKSUM_PREFIX)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn snap(value: Value) -> CanvasSnapshot {
        CanvasSnapshot::new(value)
    }

    #[test]
    fn checksum_has_client_prefix_and_fixed_width() {
        let value = checksum(Some(&snap(json!({"shapes": [1, 2]}))));
        assert!(is_client_checksum(&value));
        assert_eq!(value.len(), CLIENT_CHECKSUM_PREFIX.len() + 16);
    }

    #[test]
    fn absent_snapshot_matches_empty_document() {
        assert_eq!(checksum(None), checksum(Some(&CanvasSnapshot::empty())));
    }

    #[test]
    fn null_document_differs_from_absent() {
        assert_ne!(checksum(None), checksum(Some(&snap(Value::Null))));
    }

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"y":2,"x":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"x":3,"y":2},"a":1}"#).unwrap();
        assert_eq!(checksum(Some(&snap(a))), checksum(Some(&snap(b))));
    }

    #[test]
    fn different_content_differs() {
        let a = checksum(Some(&snap(json!({"document": {"schema": "a"}}))));
        let b = checksum(Some(&snap(json!({"document": {"schema": "b"}}))));
        assert_ne!(a, b);
    }

    #[test]
    fn host_checksums_are_not_client_checksums() {
        assert!(!is_client_checksum(&"ab".repeat(32)));
        assert!(!is_client_checksum(""));
    }

    #[test]
    fn canonical_form_escapes_keys() {
        let mut out = String::new();
        write_canonical(&json!({"q\"k": [true, null, "s"]}), &mut out);
        assert_eq!(out, r#"{"q\"k":[true,null,"s"]}"#);
    }

    proptest! {
        #[test]
        fn prop_checksum_is_deterministic(
            entries in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..16)
        ) {
            let value = serde_json::to_value(&entries).unwrap();
            let snapshot = snap(value);
            prop_assert_eq!(checksum(Some(&snapshot)), checksum(Some(&snapshot.clone())));
        }

        #[test]
        fn prop_distinct_strings_fingerprint_distinctly(a in ".{0,32}", b in ".{0,32}") {
            prop_assume!(a != b);
            let left = checksum(Some(&snap(json!({ "text": a }))));
            let right = checksum(Some(&snap(json!({ "text": b }))));
            prop_assert_ne!(left, right);
        }
    }
}
