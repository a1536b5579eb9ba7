//! Protocol version hash.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Compact JSON with object keys in sorted order.
pub fn canonical_json(doc: &serde_json::Value) -> String {
    fn sort(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Object(map) => {
                let sorted: BTreeMap<&String, serde_json::Value> =
                    map.iter().map(|(k, v)| (k, sort(v))).collect();
                serde_json::Value::Object(
                    sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect(),
                )
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(sort).collect())
            }
            other => other.clone(),
        }
    }
    sort(doc).to_string()
}

/// First 4 bytes of SHA-256 over the canonical document, little-endian.
pub fn hash_document(doc: &serde_json::Value) -> u32 {
    let digest = Sha256::digest(canonical_json(doc).as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"name":"tm","remote_attributes":[{"name":"x","dtype":"float"}]}"#)
                .unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"remote_attributes":[{"dtype":"float","name":"x"}],"name":"tm"}"#)
                .unwrap();
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(hash_document(&a), hash_document(&b));
    }

    #[test]
    fn content_changes_hash() {
        let a = json!({"name": "tm", "remote_attributes": [{"name": "x", "dtype": "float"}]});
        let b = json!({"name": "tm", "remote_attributes": [{"name": "x", "dtype": "int32"}]});
        assert_ne!(hash_document(&a), hash_document(&b));
    }

    #[test]
    fn little_endian_prefix() {
        let doc = json!({"name": "tm"});
        let digest = Sha256::digest(canonical_json(&doc).as_bytes());
        let expected = digest[0] as u32
            | (digest[1] as u32) << 8
            | (digest[2] as u32) << 16
            | (digest[3] as u32) << 24;
        assert_eq!(hash_document(&doc), expected);
    }
}
