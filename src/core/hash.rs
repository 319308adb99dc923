/*!
# Hashing Scheme

Two identities exist in the pool. The *function hash* is the SHA-256 of the
canonical code with the docstring replaced by the empty sentinel, so that
docstring content can never affect identity. The *mapping hash* is the
SHA-256 of the canonical JSON encoding of a mapping record.

Canonical JSON: lexicographically sorted keys at every nesting level,
compact separators, UTF-8 with non-ASCII characters verbatim. `serde_json`'s
default map is ordered, so serializing a `Value` yields exactly this form.
*/

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Lowercase-hex SHA-256 of the UTF-8 bytes of `code`.
///
/// Callers pass the docstring-free rendition of the canonical code; equal
/// inputs produce equal digests across platforms and runtime versions.
pub fn function_hash(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Lowercase-hex SHA-256 of the canonical JSON of a serializable record.
pub fn mapping_hash<T: Serialize>(record: &T) -> String {
    let canonical = canonical_json(record);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Canonical JSON encoding: sorted keys, no insignificant whitespace,
/// non-ASCII preserved verbatim.
pub fn canonical_json<T: Serialize>(record: &T) -> String {
    let value = serde_json::to_value(record).expect("record serializes to JSON");
    serde_json::to_string(&value).expect("JSON value serializes to a string")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_function_hash_is_stable() {
        let code = "def _fnpool_v_0():\n    ''\n    pass";
        let a = function_hash(code);
        let b = function_hash(code);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let mut map = serde_json::Map::new();
        map.insert("zebra".to_string(), serde_json::json!(1));
        map.insert("alpha".to_string(), serde_json::json!(2));
        let encoded = canonical_json(&serde_json::Value::Object(map));
        assert_eq!(encoded, r#"{"alpha":2,"zebra":1}"#);
    }

    #[test]
    fn test_canonical_json_preserves_unicode() {
        let mut map = BTreeMap::new();
        map.insert("docstring", "Somme d'une liste — entiers");
        let encoded = canonical_json(&map);
        assert!(encoded.contains("Somme d'une liste — entiers"));
        assert!(!encoded.contains("\\u"));
    }

    #[test]
    fn test_mapping_hash_differs_on_any_field() {
        let base = serde_json::json!({
            "docstring": "Sum a list",
            "name_mapping": {"_fnpool_v_0": "sum_list"},
            "alias_mapping": {},
            "comment": ""
        });
        let other = serde_json::json!({
            "docstring": "Sum a list",
            "name_mapping": {"_fnpool_v_0": "sum_list"},
            "alias_mapping": {},
            "comment": "formal"
        });
        assert_ne!(mapping_hash(&base), mapping_hash(&other));
    }
}
