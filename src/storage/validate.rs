/*!
# Validator

Re-derives every integrity fact from disk: the object parses and matches its
directory, its code re-hashes to its identity, every mapping file hashes to
its path, every canonical identifier is covered by a mapping, and every pool
reference in the code has an alias entry in every mapping. Nothing is ever
auto-repaired; the first violation is reported with the offending path.
*/

use std::collections::{BTreeSet, HashSet};
use std::fs;

use tracing::debug;

use crate::core::hash::function_hash;
use crate::core::{PoolError, Result};
use crate::normalizer::imports::parse_pool_object_name;
use crate::normalizer::visit::{walk_stmt, Transform};
use crate::normalizer::{sentinelize, CanonicalId};
use crate::parser::ast::{Module, Position, StmtKind};
use crate::parser::parse_module;

use super::dispatch::SchemaVersion;
use super::layout;
use super::Pool;

/// Result of validating a single function.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub hash: String,
    pub schema: SchemaVersion,
    pub languages: Vec<String>,
    pub mapping_count: usize,
    /// Function hashes referenced through pool imports.
    pub dependencies: Vec<String>,
}

/// Aggregate result of validating the whole pool.
#[derive(Debug, Clone, Default)]
pub struct PoolValidation {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub languages: BTreeSet<String>,
    pub missing_dependencies: usize,
    pub failures: Vec<(String, String)>,
}

impl PoolValidation {
    pub fn is_valid(&self) -> bool {
        self.invalid == 0
    }
}

impl Pool {
    /// Validate one function under whichever schema stores it.
    pub fn validate(&self, hash: &str) -> Result<ValidationReport> {
        match self.detect_version(hash)? {
            SchemaVersion::V1 => self.validate_v1(hash),
            SchemaVersion::V0 => self.validate_v0(hash),
        }
    }

    fn validate_v1(&self, hash: &str) -> Result<ValidationReport> {
        let objects_root = self.objects_root();
        let object_path = layout::object_path(&objects_root, hash);
        let object = self.function_load(hash)?;

        let sentinelized = sentinelize(&object.normalized_code).map_err(|e| {
            PoolError::corruption(&object_path, format!("normalized code does not parse: {e}"))
        })?;
        let recomputed = function_hash(&sentinelized.without_docstring);
        if recomputed != hash {
            return Err(PoolError::corruption(
                &object_path,
                format!("normalized code hashes to {recomputed}, expected {hash}"),
            ));
        }

        let module = parse_module(&object.normalized_code).map_err(|e| {
            PoolError::corruption(&object_path, format!("normalized code does not parse: {e}"))
        })?;
        let canonical_ids = collect_canonical_ids(&module);
        let referenced = collect_pool_references(&module, &self.config().pool_import_module);

        let languages = self.languages(hash)?;
        if languages.is_empty() {
            return Err(PoolError::corruption(
                layout::function_dir(&objects_root, hash),
                "no language mappings found",
            ));
        }

        let mut covered: HashSet<CanonicalId> = HashSet::new();
        let mut mapping_count = 0;
        for lang in &languages {
            let mapping_hashes = self.mappings(hash, lang)?;
            if mapping_hashes.is_empty() {
                return Err(PoolError::corruption(
                    layout::lang_dir(&objects_root, hash, lang),
                    "language directory holds no mappings",
                ));
            }
            for mapping_hash in mapping_hashes {
                let path = layout::mapping_path(&objects_root, hash, lang, &mapping_hash);
                let mapping = self.mapping_load(hash, lang, &mapping_hash)?;
                let content_hash = mapping.content_hash();
                if content_hash != mapping_hash {
                    return Err(PoolError::corruption(
                        &path,
                        format!("mapping content hashes to {content_hash}, expected its path"),
                    ));
                }
                for id in mapping.name_mapping.keys() {
                    if !canonical_ids.contains(id) {
                        return Err(PoolError::corruption(
                            &path,
                            format!("orphan name mapping entry {id}"),
                        ));
                    }
                }
                for target in &referenced {
                    if !mapping.alias_mapping.contains_key(target) {
                        return Err(PoolError::corruption(
                            &path,
                            format!("missing alias target {target}"),
                        ));
                    }
                }
                covered.extend(mapping.name_mapping.keys().copied());
                mapping_count += 1;
            }
        }

        for id in &canonical_ids {
            if !covered.contains(id) {
                return Err(PoolError::corruption(
                    layout::function_dir(&objects_root, hash),
                    format!("canonical identifier {id} not covered by any mapping"),
                ));
            }
        }

        debug!(hash, mapping_count, "function validated");
        Ok(ValidationReport {
            hash: hash.to_string(),
            schema: SchemaVersion::V1,
            languages,
            mapping_count,
            dependencies: referenced.into_iter().collect(),
        })
    }

    fn validate_v0(&self, hash: &str) -> Result<ValidationReport> {
        let path = layout::v0_path(&self.objects_root(), hash);
        let record = self.v0_load(hash)?;
        let sentinelized = sentinelize(&record.normalized_code)
            .map_err(|e| PoolError::corruption(&path, format!("stored code does not parse: {e}")))?;
        let recomputed = function_hash(&sentinelized.without_docstring);
        if recomputed != hash {
            return Err(PoolError::corruption(
                &path,
                format!("stored code hashes to {recomputed}, expected {hash}"),
            ));
        }
        let languages = record.languages();
        if languages.is_empty() {
            return Err(PoolError::corruption(&path, "no language mappings found"));
        }
        let mapping_count = languages.len();
        Ok(ValidationReport {
            hash: hash.to_string(),
            schema: SchemaVersion::V0,
            languages,
            mapping_count,
            dependencies: Vec::new(),
        })
    }

    /// Validate every function in the pool and summarize.
    pub fn validate_all(&self) -> Result<PoolValidation> {
        let mut summary = PoolValidation::default();
        for hash in self.enumerate_hashes()? {
            summary.total += 1;
            match self.validate(&hash) {
                Ok(report) => {
                    summary.valid += 1;
                    summary.languages.extend(report.languages.iter().cloned());
                    for dependency in &report.dependencies {
                        if self.detect_version(dependency).is_err() {
                            summary.missing_dependencies += 1;
                        }
                    }
                }
                Err(err) => {
                    summary.invalid += 1;
                    summary.failures.push((hash, err.to_string()));
                }
            }
        }
        Ok(summary)
    }

    /// Every function hash present in the pool, under either schema.
    pub fn enumerate_hashes(&self) -> Result<Vec<String>> {
        let objects_root = self.objects_root();
        let mut hashes = Vec::new();
        if !objects_root.exists() {
            return Ok(hashes);
        }
        let shards = fs::read_dir(&objects_root).map_err(|e| PoolError::io(&objects_root, e))?;
        for shard in shards {
            let shard = shard.map_err(|e| PoolError::io(&objects_root, e))?;
            if !shard.path().is_dir() {
                continue;
            }
            let prefix = shard.file_name().to_string_lossy().to_string();
            let entries = fs::read_dir(shard.path()).map_err(|e| PoolError::io(shard.path(), e))?;
            for entry in entries {
                let entry = entry.map_err(|e| PoolError::io(shard.path(), e))?;
                let name = entry.file_name().to_string_lossy().to_string();
                let candidate = if entry.path().is_dir() {
                    layout::hash_from_parts(&prefix, &name)
                } else {
                    name.strip_suffix(".json")
                        .and_then(|stem| layout::hash_from_parts(&prefix, stem))
                };
                if let Some(hash) = candidate {
                    hashes.push(hash);
                }
            }
        }
        hashes.sort();
        hashes.dedup();
        Ok(hashes)
    }
}

/// Canonical identifiers occurring in canonical code: every name, binding,
/// parameter and nested definition. Attribute names are not included, so the
/// `_fnpool_v_0` on a pool reference counts toward the referenced function,
/// not this one.
fn collect_canonical_ids(module: &Module) -> HashSet<CanonicalId> {
    struct IdCollector {
        ids: HashSet<CanonicalId>,
    }
    impl Transform for IdCollector {
        fn on_name(&mut self, id: &mut String, _pos: Position) -> Result<()> {
            self.ids.extend(CanonicalId::parse(id));
            Ok(())
        }
        fn on_binding(&mut self, name: &mut String, _pos: Position) -> Result<()> {
            self.ids.extend(CanonicalId::parse(name));
            Ok(())
        }
    }

    let mut collector = IdCollector {
        ids: HashSet::new(),
    };
    let mut module = module.clone();
    for stmt in &mut module.body {
        let _ = walk_stmt(&mut collector, stmt);
    }
    collector.ids
}

fn collect_pool_references(module: &Module, pool_module: &str) -> BTreeSet<String> {
    let mut referenced = BTreeSet::new();
    collect_pool_refs_in(&module.body, pool_module, &mut referenced);
    referenced
}

fn collect_pool_refs_in(
    body: &[crate::parser::ast::Stmt],
    pool_module: &str,
    referenced: &mut BTreeSet<String>,
) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::ImportFrom { module, names } if module == pool_module => {
                for alias in names {
                    if let Some(hash) = parse_pool_object_name(&alias.name) {
                        referenced.insert(hash.to_string());
                    }
                }
            }
            StmtKind::FunctionDef(def) => {
                collect_pool_refs_in(&def.body, pool_module, referenced)
            }
            StmtKind::If { body, orelse, .. }
            | StmtKind::While { body, orelse, .. }
            | StmtKind::For { body, orelse, .. } => {
                collect_pool_refs_in(body, pool_module, referenced);
                collect_pool_refs_in(orelse, pool_module, referenced);
            }
            _ => {}
        }
    }
}
