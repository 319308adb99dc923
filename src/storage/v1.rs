/*!
# v1 Write and Read Paths

`save_function` persists the object (first writer wins, metadata immutable)
and the mapping (content-addressed, deduplicating). Readers locate files by
hash prefix and verify directory-path consistency on load.
*/

use std::fs;

use tracing::debug;

use crate::core::fs_utils::{ensure_dir, read_json, write_json_atomic};
use crate::core::{PoolError, Result};

use super::layout;
use super::mapping::Mapping;
use super::object::{NormalizedFunction, ObjectMetadata, SCHEMA_VERSION_V1};
use super::Pool;

impl Pool {
    /// v1 write path: persist the object if new, then the mapping if new.
    /// Returns `(function_hash, mapping_hash)`.
    pub fn save_function_v1(
        &self,
        hash: &str,
        lang: &str,
        normalized_code: &str,
        mapping: &Mapping,
        metadata: ObjectMetadata,
    ) -> Result<(String, String)> {
        layout::validate_hash(hash)?;
        layout::validate_lang(lang)?;

        let objects_root = self.objects_root();
        let object_path = layout::object_path(&objects_root, hash);
        if !object_path.exists() {
            ensure_dir(&layout::function_dir(&objects_root, hash))?;
            let object = NormalizedFunction::new(
                hash.to_string(),
                normalized_code.to_string(),
                metadata,
            );
            write_json_atomic(&object_path, &object)?;
            debug!(hash, "object created");
        }

        let mapping_hash = self.save_mapping_v1(hash, lang, mapping)?;
        Ok((hash.to_string(), mapping_hash))
    }

    /// Persist one mapping under `(hash, lang)`; the object must already
    /// exist. Writing a content-identical mapping twice is a no-op.
    pub fn save_mapping_v1(&self, hash: &str, lang: &str, mapping: &Mapping) -> Result<String> {
        layout::validate_hash(hash)?;
        layout::validate_lang(lang)?;

        let objects_root = self.objects_root();
        if !layout::object_path(&objects_root, hash).exists() {
            return Err(PoolError::FunctionNotFound {
                hash: hash.to_string(),
            });
        }

        let mapping_hash = mapping.content_hash();
        let mapping_path = layout::mapping_path(&objects_root, hash, lang, &mapping_hash);
        if mapping_path.exists() {
            // Content-addressed: an existing file at this path must be the
            // same mapping. Anything else is corruption, never overwritten.
            let existing: Mapping = read_json(&mapping_path)?;
            if &existing != mapping {
                return Err(PoolError::corruption(
                    &mapping_path,
                    format!(
                        "mapping content does not match its hash {mapping_hash}"
                    ),
                ));
            }
            debug!(hash, lang, mapping_hash, "mapping already present");
            return Ok(mapping_hash);
        }

        ensure_dir(&layout::mapping_dir(&objects_root, hash, lang, &mapping_hash))?;
        write_json_atomic(&mapping_path, mapping)?;
        debug!(hash, lang, mapping_hash, "mapping written");
        Ok(mapping_hash)
    }

    /// Load and verify `object.json` for a function hash.
    pub fn function_load(&self, hash: &str) -> Result<NormalizedFunction> {
        layout::validate_hash(hash)?;
        let objects_root = self.objects_root();
        let object_path = layout::object_path(&objects_root, hash);
        if !object_path.exists() {
            return Err(PoolError::FunctionNotFound {
                hash: hash.to_string(),
            });
        }
        let object: NormalizedFunction = read_json(&object_path)?;
        if object.schema_version != SCHEMA_VERSION_V1 {
            return Err(PoolError::corruption(
                &object_path,
                format!("invalid schema version {}", object.schema_version),
            ));
        }
        if object.hash != hash {
            return Err(PoolError::corruption(
                &object_path,
                format!(
                    "object hash {} does not match its directory {hash}",
                    object.hash
                ),
            ));
        }
        Ok(object)
    }

    /// Enumerate the languages that have at least one mapping, sorted.
    pub fn languages(&self, hash: &str) -> Result<Vec<String>> {
        layout::validate_hash(hash)?;
        let function_dir = layout::function_dir(&self.objects_root(), hash);
        if !function_dir.exists() {
            return Err(PoolError::FunctionNotFound {
                hash: hash.to_string(),
            });
        }
        let mut languages = Vec::new();
        let entries = fs::read_dir(&function_dir).map_err(|e| PoolError::io(&function_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PoolError::io(&function_dir, e))?;
            let is_dir = entry
                .file_type()
                .map_err(|e| PoolError::io(entry.path(), e))?
                .is_dir();
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if layout::is_valid_lang(name) {
                    languages.push(name.to_string());
                }
            }
        }
        languages.sort();
        Ok(languages)
    }

    /// Enumerate mapping hashes for `(hash, lang)`, sorted.
    pub fn mappings(&self, hash: &str, lang: &str) -> Result<Vec<String>> {
        layout::validate_hash(hash)?;
        layout::validate_lang(lang)?;
        let lang_dir = layout::lang_dir(&self.objects_root(), hash, lang);
        if !lang_dir.exists() {
            return Err(PoolError::LanguageNotFound {
                hash: hash.to_string(),
                lang: lang.to_string(),
            });
        }
        let mut hashes = Vec::new();
        let shards = fs::read_dir(&lang_dir).map_err(|e| PoolError::io(&lang_dir, e))?;
        for shard in shards {
            let shard = shard.map_err(|e| PoolError::io(&lang_dir, e))?;
            if !shard.path().is_dir() {
                continue;
            }
            let prefix = shard.file_name().to_string_lossy().to_string();
            let inner = fs::read_dir(shard.path()).map_err(|e| PoolError::io(shard.path(), e))?;
            for entry in inner {
                let entry = entry.map_err(|e| PoolError::io(shard.path(), e))?;
                let rest = entry.file_name().to_string_lossy().to_string();
                if let Some(mapping_hash) = layout::hash_from_parts(&prefix, &rest) {
                    if entry.path().join(layout::MAPPING_FILE).exists() {
                        hashes.push(mapping_hash);
                    }
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    /// Load one mapping by its hash.
    pub fn mapping_load(&self, hash: &str, lang: &str, mapping_hash: &str) -> Result<Mapping> {
        layout::validate_hash(hash)?;
        layout::validate_lang(lang)?;
        layout::validate_hash(mapping_hash)?;
        let path = layout::mapping_path(&self.objects_root(), hash, lang, mapping_hash);
        if !path.exists() {
            return Err(PoolError::MappingNotFound {
                hash: hash.to_string(),
                lang: lang.to_string(),
                mapping: mapping_hash.to_string(),
            });
        }
        read_json(&path)
    }

    /// The default selection when callers do not choose a mapping: latest
    /// filesystem modification time, ties broken by the lexicographically
    /// larger mapping hash.
    pub fn latest_mapping(&self, hash: &str, lang: &str) -> Result<(String, Mapping)> {
        let candidates = self.mappings(hash, lang)?;
        if candidates.is_empty() {
            return Err(PoolError::LanguageNotFound {
                hash: hash.to_string(),
                lang: lang.to_string(),
            });
        }
        let objects_root = self.objects_root();
        let mut entries = Vec::with_capacity(candidates.len());
        for mapping_hash in candidates {
            let path = layout::mapping_path(&objects_root, hash, lang, &mapping_hash);
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map_err(|e| PoolError::io(&path, e))?;
            entries.push((modified, mapping_hash));
        }
        let mapping_hash = pick_latest(entries).expect("non-empty candidates");
        let mapping = self.mapping_load(hash, lang, &mapping_hash)?;
        Ok((mapping_hash, mapping))
    }
}

/// Newest mtime wins; equal mtimes fall back to the lexicographically
/// larger hash so every caller picks the same variant.
fn pick_latest(entries: Vec<(std::time::SystemTime, String)>) -> Option<String> {
    entries
        .into_iter()
        .max_by(|(at, ah), (bt, bh)| at.cmp(bt).then_with(|| ah.cmp(bh)))
        .map(|(_, hash)| hash)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tempfile::TempDir;

    use crate::config::PoolConfig;
    use crate::normalizer::CanonicalId;

    use super::*;

    fn test_pool() -> (TempDir, Pool) {
        let dir = TempDir::new().unwrap();
        let pool = Pool::new(PoolConfig::with_root(dir.path()));
        (dir, pool)
    }

    fn metadata() -> ObjectMetadata {
        ObjectMetadata {
            created: "2025-01-01T00:00:00Z".to_string(),
            author: "tester".to_string(),
            tags: vec![],
            dependencies: vec![],
        }
    }

    fn simple_mapping(name: &str) -> Mapping {
        let mut names = BTreeMap::new();
        names.insert(CanonicalId::new(0), name.to_string());
        Mapping::new("Test function", names, BTreeMap::new(), "")
    }

    const CODE: &str = "def _fnpool_v_0():\n    '__fnpool_docstring__'\n    pass";

    #[test]
    fn test_save_creates_object_and_mapping() {
        let (_dir, pool) = test_pool();
        let hash = "ab".to_string() + &"1".repeat(62);
        let (function_hash, mapping_hash) = pool
            .save_function_v1(&hash, "eng", CODE, &simple_mapping("noop"), metadata())
            .unwrap();
        assert_eq!(function_hash, hash);
        assert_eq!(mapping_hash.len(), 64);

        let object = pool.function_load(&hash).unwrap();
        assert_eq!(object.hash, hash);
        assert_eq!(object.normalized_code, CODE);
        assert_eq!(pool.languages(&hash).unwrap(), vec!["eng"]);
        assert_eq!(pool.mappings(&hash, "eng").unwrap(), vec![mapping_hash]);
    }

    #[test]
    fn test_mapping_deduplication() {
        let (_dir, pool) = test_pool();
        let hash = "cd".to_string() + &"2".repeat(62);
        let mapping = simple_mapping("noop");
        let (_, first) = pool
            .save_function_v1(&hash, "eng", CODE, &mapping, metadata())
            .unwrap();
        let (_, second) = pool
            .save_function_v1(&hash, "eng", CODE, &mapping, metadata())
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.mappings(&hash, "eng").unwrap().len(), 1);
    }

    #[test]
    fn test_metadata_not_overwritten_on_readd() {
        let (_dir, pool) = test_pool();
        let hash = "ef".to_string() + &"3".repeat(62);
        pool.save_function_v1(&hash, "eng", CODE, &simple_mapping("a"), metadata())
            .unwrap();

        let mut other = metadata();
        other.author = "someone-else".to_string();
        pool.save_function_v1(&hash, "fra", CODE, &simple_mapping("b"), other)
            .unwrap();

        let object = pool.function_load(&hash).unwrap();
        assert_eq!(object.metadata.author, "tester");
        assert_eq!(pool.languages(&hash).unwrap(), vec!["eng", "fra"]);
    }

    #[test]
    fn test_multiple_variants_per_language() {
        let (_dir, pool) = test_pool();
        let hash = "01".to_string() + &"4".repeat(62);
        let mut formal = simple_mapping("noop");
        formal.comment = "Formal".to_string();
        let mut casual = simple_mapping("noop");
        casual.comment = "Casual".to_string();

        pool.save_function_v1(&hash, "eng", CODE, &formal, metadata())
            .unwrap();
        pool.save_mapping_v1(&hash, "eng", &casual).unwrap();

        let mappings = pool.mappings(&hash, "eng").unwrap();
        assert_eq!(mappings.len(), 2);
    }

    #[test]
    fn test_function_load_detects_hash_mismatch() {
        let (_dir, pool) = test_pool();
        let hash = "23".to_string() + &"5".repeat(62);
        pool.save_function_v1(&hash, "eng", CODE, &simple_mapping("x"), metadata())
            .unwrap();

        // Forge a directory whose object.json carries the wrong hash.
        let other = "45".to_string() + &"6".repeat(62);
        let src = layout::object_path(&pool.objects_root(), &hash);
        let dst_dir = layout::function_dir(&pool.objects_root(), &other);
        fs::create_dir_all(&dst_dir).unwrap();
        fs::copy(&src, dst_dir.join(layout::OBJECT_FILE)).unwrap();

        let err = pool.function_load(&other).unwrap_err();
        assert!(matches!(err, PoolError::Corruption { .. }));
    }

    #[test]
    fn test_not_found_errors() {
        let (_dir, pool) = test_pool();
        let hash = "67".to_string() + &"7".repeat(62);
        assert!(matches!(
            pool.function_load(&hash).unwrap_err(),
            PoolError::FunctionNotFound { .. }
        ));

        pool.save_function_v1(&hash, "eng", CODE, &simple_mapping("x"), metadata())
            .unwrap();
        assert!(matches!(
            pool.mappings(&hash, "fra").unwrap_err(),
            PoolError::LanguageNotFound { .. }
        ));
        assert!(matches!(
            pool.mapping_load(&hash, "eng", &"9".repeat(64)).unwrap_err(),
            PoolError::MappingNotFound { .. }
        ));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let (_dir, pool) = test_pool();
        let hash = "89".to_string() + &"8".repeat(62);
        let upper = hash.to_uppercase();
        assert!(matches!(
            pool.function_load(&upper).unwrap_err(),
            PoolError::InvalidHashFormat { .. }
        ));
        assert!(matches!(
            pool.save_function_v1(&hash, "no/good", CODE, &simple_mapping("x"), metadata())
                .unwrap_err(),
            PoolError::InvalidLanguageCode { .. }
        ));
    }

    #[test]
    fn test_latest_mapping_returns_existing_variant() {
        let (_dir, pool) = test_pool();
        let hash = "ba".to_string() + &"9".repeat(62);
        let mut first = simple_mapping("noop");
        first.comment = "one".to_string();
        let mut second = simple_mapping("noop");
        second.comment = "two".to_string();

        pool.save_function_v1(&hash, "eng", CODE, &first, metadata())
            .unwrap();
        let h2 = pool.save_mapping_v1(&hash, "eng", &second).unwrap();
        let h1 = first.content_hash();

        let (selected, mapping) = pool.latest_mapping(&hash, "eng").unwrap();
        assert!(selected == h1 || selected == h2);
        assert_eq!(mapping.content_hash(), selected);
    }

    #[test]
    fn test_pick_latest_prefers_mtime_then_hash() {
        use std::time::{Duration, SystemTime};

        let older = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let newer = SystemTime::UNIX_EPOCH + Duration::from_secs(200);
        assert_eq!(
            pick_latest(vec![
                (newer, "aa".to_string()),
                (older, "zz".to_string()),
            ]),
            Some("aa".to_string())
        );
        // Equal mtimes: lexicographically larger hash wins.
        assert_eq!(
            pick_latest(vec![
                (newer, "aa".to_string()),
                (newer, "bb".to_string()),
            ]),
            Some("bb".to_string())
        );
        assert_eq!(pick_latest(Vec::new()), None);
    }
}
