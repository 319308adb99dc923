//! Path derivation and input validation for the on-disk layout.
//!
//! Hex directory names are lowercase; mixed-case input is rejected rather
//! than case-folded, so correctness never depends on a case-insensitive
//! filesystem.

use std::path::{Path, PathBuf};

use crate::core::{PoolError, Result};

pub const OBJECT_FILE: &str = "object.json";
pub const MAPPING_FILE: &str = "mapping.json";

/// Validate a function or mapping hash: exactly 64 lowercase hex chars.
pub fn validate_hash(hash: &str) -> Result<()> {
    let ok = hash.len() == 64
        && hash
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if ok {
        Ok(())
    } else {
        Err(PoolError::InvalidHashFormat {
            value: hash.to_string(),
        })
    }
}

/// Validate a language code: 1–256 chars of letters, digits, `-`, `_`.
/// Free-form beyond that; no ISO table is consulted.
pub fn validate_lang(lang: &str) -> Result<()> {
    let ok = !lang.is_empty()
        && lang.len() <= 256
        && lang
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(PoolError::InvalidLanguageCode {
            code: lang.to_string(),
        })
    }
}

/// True if `name` would pass `validate_lang`; used when enumerating
/// directories.
pub fn is_valid_lang(name: &str) -> bool {
    validate_lang(name).is_ok()
}

/// Split a hash into its 2-char shard prefix and 62-char remainder.
pub fn shard(hash: &str) -> (&str, &str) {
    hash.split_at(2)
}

/// `objects/h₀h₁/h₂…h₆₃/` for a function hash.
pub fn function_dir(objects_root: &Path, hash: &str) -> PathBuf {
    let (prefix, rest) = shard(hash);
    objects_root.join(prefix).join(rest)
}

pub fn object_path(objects_root: &Path, hash: &str) -> PathBuf {
    function_dir(objects_root, hash).join(OBJECT_FILE)
}

pub fn lang_dir(objects_root: &Path, hash: &str, lang: &str) -> PathBuf {
    function_dir(objects_root, hash).join(lang)
}

/// `…/<lang>/m₀m₁/m₂…m₆₃/` for a mapping hash.
pub fn mapping_dir(objects_root: &Path, hash: &str, lang: &str, mapping_hash: &str) -> PathBuf {
    let (prefix, rest) = shard(mapping_hash);
    lang_dir(objects_root, hash, lang).join(prefix).join(rest)
}

pub fn mapping_path(objects_root: &Path, hash: &str, lang: &str, mapping_hash: &str) -> PathBuf {
    mapping_dir(objects_root, hash, lang, mapping_hash).join(MAPPING_FILE)
}

/// Legacy v0 record location: `objects/h₀h₁/h₂…h₆₃.json`.
pub fn v0_path(objects_root: &Path, hash: &str) -> PathBuf {
    let (prefix, rest) = shard(hash);
    objects_root.join(prefix).join(format!("{rest}.json"))
}

/// Recompose a hash from its shard directory and remainder name, if they
/// look like one.
pub fn hash_from_parts(prefix: &str, rest: &str) -> Option<String> {
    let combined = format!("{prefix}{rest}");
    validate_hash(&combined).ok().map(|_| combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_hash_accepts_lowercase_hex() {
        assert!(validate_hash(&"a1".repeat(32)).is_ok());
    }

    #[test]
    fn test_validate_hash_rejects_mixed_case_and_length() {
        assert!(validate_hash(&"A1".repeat(32)).is_err());
        assert!(validate_hash("abc123").is_err());
        assert!(validate_hash(&"g".repeat(64)).is_err());
    }

    #[test]
    fn test_validate_lang() {
        assert!(validate_lang("eng").is_ok());
        assert!(validate_lang("pt-BR").is_ok());
        assert!(validate_lang("zh_Hant").is_ok());
        assert!(validate_lang("").is_err());
        assert!(validate_lang("fr/ca").is_err());
        assert!(validate_lang(&"x".repeat(257)).is_err());
    }

    #[test]
    fn test_paths_shard_on_two_chars() {
        let root = Path::new("/pool/objects");
        let hash = "ab".to_string() + &"c".repeat(62);
        assert_eq!(
            function_dir(root, &hash),
            Path::new("/pool/objects/ab").join("c".repeat(62))
        );
        assert_eq!(
            v0_path(root, &hash),
            Path::new("/pool/objects/ab").join(format!("{}.json", "c".repeat(62)))
        );
    }
}
