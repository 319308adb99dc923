/*!
# Schema Dispatch

Reads detect which schema a function is stored under and route accordingly:
v1 first, then v0. There is no silent conversion on read. Writes follow the
single configured switch, which defaults to v1.
*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{PoolError, Result};
use crate::normalizer::{sentinelize, CanonicalId};

use super::layout;
use super::mapping::Mapping;
use super::object::ObjectMetadata;
use super::Pool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    V0,
    V1,
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaVersion::V0 => write!(f, "v0"),
            SchemaVersion::V1 => write!(f, "v1"),
        }
    }
}

/// A function as one language variant sees it, schema-independent. This is
/// what the denormalizer consumes.
#[derive(Debug, Clone)]
pub struct FunctionView {
    pub hash: String,
    /// Canonical code with the placeholder docstring.
    pub normalized_code: String,
    pub docstring: String,
    pub name_mapping: BTreeMap<CanonicalId, String>,
    pub alias_mapping: BTreeMap<String, String>,
    pub comment: String,
    pub mapping_hash: String,
    pub schema: SchemaVersion,
}

impl Pool {
    /// Which schema holds this function on disk.
    pub fn detect_version(&self, hash: &str) -> Result<SchemaVersion> {
        layout::validate_hash(hash)?;
        let objects_root = self.objects_root();
        if layout::function_dir(&objects_root, hash).is_dir() {
            return Ok(SchemaVersion::V1);
        }
        if layout::v0_path(&objects_root, hash).is_file() {
            return Ok(SchemaVersion::V0);
        }
        Err(PoolError::FunctionNotFound {
            hash: hash.to_string(),
        })
    }

    /// Write path behind the schema switch.
    pub fn save_function(
        &self,
        hash: &str,
        lang: &str,
        normalized_code: &str,
        mapping: &Mapping,
        metadata: ObjectMetadata,
    ) -> Result<(String, String)> {
        match self.config().write_schema {
            SchemaVersion::V1 => {
                self.save_function_v1(hash, lang, normalized_code, mapping, metadata)
            }
            SchemaVersion::V0 => self.save_function_v0(hash, lang, normalized_code, mapping),
        }
    }

    /// Read path: load a function for one language, selecting a mapping.
    /// Tries v1 first and falls back to v0.
    pub fn load_view(
        &self,
        hash: &str,
        lang: &str,
        mapping_hash: Option<&str>,
    ) -> Result<FunctionView> {
        match self.detect_version(hash)? {
            SchemaVersion::V1 => self.load_view_v1(hash, lang, mapping_hash),
            SchemaVersion::V0 => self.load_view_v0(hash, lang, mapping_hash),
        }
    }

    fn load_view_v1(
        &self,
        hash: &str,
        lang: &str,
        mapping_hash: Option<&str>,
    ) -> Result<FunctionView> {
        let object = self.function_load(hash)?;
        let (mapping_hash, mapping) = match mapping_hash {
            Some(selected) => {
                layout::validate_hash(selected)?;
                (
                    selected.to_string(),
                    self.mapping_load(hash, lang, selected)?,
                )
            }
            None => self.latest_mapping(hash, lang)?,
        };
        Ok(FunctionView {
            hash: hash.to_string(),
            normalized_code: object.normalized_code,
            docstring: mapping.docstring,
            name_mapping: mapping.name_mapping,
            alias_mapping: mapping.alias_mapping,
            comment: mapping.comment,
            mapping_hash,
            schema: SchemaVersion::V1,
        })
    }

    fn load_view_v0(
        &self,
        hash: &str,
        lang: &str,
        mapping_hash: Option<&str>,
    ) -> Result<FunctionView> {
        layout::validate_lang(lang)?;
        let record = self.v0_load(hash)?;
        let name_mapping = record.name_mappings.get(lang).cloned().ok_or_else(|| {
            PoolError::LanguageNotFound {
                hash: hash.to_string(),
                lang: lang.to_string(),
            }
        })?;
        let docstring = record.docstrings.get(lang).cloned().unwrap_or_default();
        let alias_mapping = record.alias_mappings.get(lang).cloned().unwrap_or_default();

        let mapping = Mapping::new(
            docstring.clone(),
            name_mapping.clone(),
            alias_mapping.clone(),
            "",
        );
        let computed = mapping.content_hash();
        if let Some(selected) = mapping_hash {
            if selected != computed {
                return Err(PoolError::MappingNotFound {
                    hash: hash.to_string(),
                    lang: lang.to_string(),
                    mapping: selected.to_string(),
                });
            }
        }

        // v0 stores the author docstring in the code; re-sentinelize so the
        // view looks exactly like a v1 load.
        let sentinelized = sentinelize(&record.normalized_code)?;
        Ok(FunctionView {
            hash: hash.to_string(),
            normalized_code: sentinelized.with_placeholder,
            docstring,
            name_mapping,
            alias_mapping,
            comment: String::new(),
            mapping_hash: computed,
            schema: SchemaVersion::V0,
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::config::PoolConfig;
    use crate::normalizer::DOCSTRING_PLACEHOLDER;
    use crate::storage::object::ObjectMetadata;

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

    fn mapping(name: &str, docstring: &str) -> Mapping {
        let mut names = BTreeMap::new();
        names.insert(CanonicalId::new(0), name.to_string());
        Mapping::new(docstring, names, BTreeMap::new(), "")
    }

    fn placeholder_code() -> String {
        format!("def _fnpool_v_0():\n    '{DOCSTRING_PLACEHOLDER}'\n    pass")
    }

    #[test]
    fn test_detect_version() {
        let (_dir, pool) = test_pool();
        let v1_hash = "11".to_string() + &"a".repeat(62);
        let v0_hash = "22".to_string() + &"a".repeat(62);
        let missing = "33".to_string() + &"a".repeat(62);

        pool.save_function_v1(&v1_hash, "eng", &placeholder_code(), &mapping("f", "d"), metadata())
            .unwrap();
        pool.save_function_v0(&v0_hash, "eng", &placeholder_code(), &mapping("f", "d"))
            .unwrap();

        assert_eq!(pool.detect_version(&v1_hash).unwrap(), SchemaVersion::V1);
        assert_eq!(pool.detect_version(&v0_hash).unwrap(), SchemaVersion::V0);
        assert!(matches!(
            pool.detect_version(&missing).unwrap_err(),
            PoolError::FunctionNotFound { .. }
        ));
    }

    #[test]
    fn test_load_view_dispatches_to_v0() {
        let (_dir, pool) = test_pool();
        let hash = "44".to_string() + &"b".repeat(62);
        pool.save_function_v0(&hash, "eng", &placeholder_code(), &mapping("noop", "Nothing"))
            .unwrap();

        let view = pool.load_view(&hash, "eng", None).unwrap();
        assert_eq!(view.schema, SchemaVersion::V0);
        assert_eq!(view.docstring, "Nothing");
        assert!(view.normalized_code.contains(DOCSTRING_PLACEHOLDER));
    }

    #[test]
    fn test_load_view_v1_selects_explicit_mapping() {
        let (_dir, pool) = test_pool();
        let hash = "55".to_string() + &"c".repeat(62);
        let first = mapping("noop", "First");
        let second = mapping("noop", "Second");
        pool.save_function_v1(&hash, "eng", &placeholder_code(), &first, metadata())
            .unwrap();
        let second_hash = pool.save_mapping_v1(&hash, "eng", &second).unwrap();

        let view = pool.load_view(&hash, "eng", Some(&second_hash)).unwrap();
        assert_eq!(view.docstring, "Second");
        assert_eq!(view.mapping_hash, second_hash);
    }
}
