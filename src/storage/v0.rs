/*!
# Legacy v0 Records

Schema v0 kept one JSON file per function with every language folded into
it: the normalized code with the author docstring embedded, plus per-language
docstring / name-mapping / alias-mapping tables. The v0 write path survives
behind the schema switch; reads go through `Pool::v0_load`.
*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::fs_utils::{ensure_dir, read_json, write_json_atomic};
use crate::core::{PoolError, Result};
use crate::normalizer::{embed_docstring, CanonicalId};

use super::layout;
use super::mapping::Mapping;
use super::Pool;

pub const SCHEMA_VERSION_V0: u32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct V0Record {
    pub version: u32,
    pub hash: String,
    /// Canonical code with a real docstring embedded (whichever language
    /// was added last).
    pub normalized_code: String,
    pub docstrings: BTreeMap<String, String>,
    pub name_mappings: BTreeMap<String, BTreeMap<CanonicalId, String>>,
    pub alias_mappings: BTreeMap<String, BTreeMap<String, String>>,
}

impl V0Record {
    /// Language codes present in this record, sorted.
    pub fn languages(&self) -> Vec<String> {
        self.name_mappings.keys().cloned().collect()
    }
}

impl Pool {
    /// True if a v0 record exists for this hash.
    pub fn v0_exists(&self, hash: &str) -> bool {
        layout::v0_path(&self.objects_root(), hash).exists()
    }

    /// Load a v0 record, checking its version and hash fields.
    pub fn v0_load(&self, hash: &str) -> Result<V0Record> {
        layout::validate_hash(hash)?;
        let path = layout::v0_path(&self.objects_root(), hash);
        if !path.exists() {
            return Err(PoolError::FunctionNotFound {
                hash: hash.to_string(),
            });
        }
        let record: V0Record = read_json(&path)?;
        if record.version != SCHEMA_VERSION_V0 {
            return Err(PoolError::corruption(
                &path,
                format!("expected schema version 0, found {}", record.version),
            ));
        }
        if record.hash != hash {
            return Err(PoolError::corruption(
                &path,
                format!("record hash {} does not match its path {hash}", record.hash),
            ));
        }
        Ok(record)
    }

    /// v0 write path: merge one language into the single record file.
    /// Returns the mapping's content hash for parity with the v1 path.
    pub fn save_function_v0(
        &self,
        hash: &str,
        lang: &str,
        normalized_code: &str,
        mapping: &Mapping,
    ) -> Result<(String, String)> {
        layout::validate_hash(hash)?;
        layout::validate_lang(lang)?;

        let path = layout::v0_path(&self.objects_root(), hash);
        let mut record = if path.exists() {
            self.v0_load(hash)?
        } else {
            V0Record {
                version: SCHEMA_VERSION_V0,
                hash: hash.to_string(),
                normalized_code: String::new(),
                docstrings: BTreeMap::new(),
                name_mappings: BTreeMap::new(),
                alias_mappings: BTreeMap::new(),
            }
        };

        record.normalized_code = embed_docstring(normalized_code, &mapping.docstring)?;
        record
            .docstrings
            .insert(lang.to_string(), mapping.docstring.clone());
        record
            .name_mappings
            .insert(lang.to_string(), mapping.name_mapping.clone());
        record
            .alias_mappings
            .insert(lang.to_string(), mapping.alias_mapping.clone());

        ensure_dir(path.parent().expect("v0 path has a parent"))?;
        write_json_atomic(&path, &record)?;
        Ok((hash.to_string(), mapping.content_hash()))
    }
}
