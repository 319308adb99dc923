//! Import classification and rewriting.
//!
//! Standard imports keep their nodes but lose their `as` aliases; the bound
//! name reverts to the imported name and joins the do-not-rename set. Pool
//! imports (`from <pool module> import object_<hash> [as alias]`) lose their
//! alias too, and the `(hash → bound local name)` pair is recorded so the
//! denormalizer can reconstruct the author's view.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::{PoolError, Result};
use crate::parser::ast::{Stmt, StmtKind};

/// Canonical reference name of a pool object: `object_<hash>`.
pub fn pool_object_name(hash: &str) -> String {
    format!("object_{hash}")
}

/// Inverse of `pool_object_name`; accepts only 64 lowercase hex digits.
pub fn parse_pool_object_name(name: &str) -> Option<&str> {
    let hash = name.strip_prefix("object_")?;
    if hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
        Some(hash)
    } else {
        None
    }
}

/// Everything the classifier learns about a module's imports.
#[derive(Debug, Default)]
pub struct ImportInfo {
    /// hash → the local name the author's code bound it to (the alias, or
    /// `object_<hash>` when imported unaliased).
    pub alias_mapping: BTreeMap<String, String>,
    /// bound local name → hash, for rewriting reference sites.
    pub pool_bound: HashMap<String, String>,
    /// Names bound by imports in canonical form; excluded from renaming.
    pub no_rename: HashSet<String>,
    /// Standard-import alias → the dotted name it stood for.
    pub std_alias: HashMap<String, String>,
}

/// Classify and rewrite every import in `stmts`, recursing into nested
/// statement bodies (function-local imports count too).
pub fn classify_and_rewrite(
    stmts: &mut [Stmt],
    pool_module: &str,
    info: &mut ImportInfo,
) -> Result<()> {
    for stmt in stmts {
        classify_stmt(stmt, pool_module, info)?;
    }
    Ok(())
}

fn classify_stmt(stmt: &mut Stmt, pool_module: &str, info: &mut ImportInfo) -> Result<()> {
    let pos = stmt.pos;
    match &mut stmt.kind {
        StmtKind::Import { names } => {
            for alias in names.iter_mut() {
                if let Some(asname) = alias.asname.take() {
                    info.std_alias.insert(asname, alias.name.clone());
                }
                info.no_rename.insert(alias.bound_name(false));
            }
        }
        StmtKind::ImportFrom { module, names } if module == pool_module => {
            for alias in names.iter_mut() {
                let hash = parse_pool_object_name(&alias.name)
                    .ok_or_else(|| PoolError::MalformedInput {
                        line: pos.line,
                        column: pos.column,
                        message: format!(
                            "pool import must reference object_<hash>, got {:?}",
                            alias.name
                        ),
                    })?
                    .to_string();
                let bound = alias
                    .asname
                    .take()
                    .unwrap_or_else(|| pool_object_name(&hash));
                info.alias_mapping.insert(hash.clone(), bound.clone());
                info.pool_bound.insert(bound, hash);
                info.no_rename.insert(alias.name.clone());
            }
        }
        StmtKind::ImportFrom { names, .. } => {
            for alias in names.iter_mut() {
                if let Some(asname) = alias.asname.take() {
                    info.std_alias.insert(asname, alias.name.clone());
                }
                info.no_rename.insert(alias.bound_name(true));
            }
        }
        StmtKind::FunctionDef(def) => {
            classify_and_rewrite(&mut def.body, pool_module, info)?;
        }
        StmtKind::If { body, orelse, .. }
        | StmtKind::While { body, orelse, .. }
        | StmtKind::For { body, orelse, .. } => {
            classify_and_rewrite(body, pool_module, info)?;
            classify_and_rewrite(orelse, pool_module, info)?;
        }
        _ => {}
    }
    Ok(())
}

/// Reattach `as <alias>` clauses on pool imports (the denormalizer's side of
/// the rewrite). Aliases equal to the canonical `object_<hash>` name stay
/// implicit.
pub fn reattach_pool_aliases(
    stmts: &mut [Stmt],
    pool_module: &str,
    alias_mapping: &BTreeMap<String, String>,
) {
    for stmt in stmts {
        match &mut stmt.kind {
            StmtKind::ImportFrom { module, names } if module == pool_module => {
                for alias in names.iter_mut() {
                    if let Some(hash) = parse_pool_object_name(&alias.name) {
                        if let Some(local) = alias_mapping.get(hash) {
                            if local != &alias.name {
                                alias.asname = Some(local.clone());
                            }
                        }
                    }
                }
            }
            StmtKind::FunctionDef(def) => {
                reattach_pool_aliases(&mut def.body, pool_module, alias_mapping);
            }
            StmtKind::If { body, orelse, .. }
            | StmtKind::While { body, orelse, .. }
            | StmtKind::For { body, orelse, .. } => {
                reattach_pool_aliases(body, pool_module, alias_mapping);
                reattach_pool_aliases(orelse, pool_module, alias_mapping);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    const POOL: &str = "fnpool.pool";

    fn classify(source: &str) -> (Vec<Stmt>, ImportInfo) {
        let mut module = parse_module(source).unwrap();
        let mut info = ImportInfo::default();
        classify_and_rewrite(&mut module.body, POOL, &mut info).unwrap();
        (module.body, info)
    }

    #[test]
    fn test_standard_import_alias_stripped() {
        let (body, info) = classify("import numpy as np\n");
        match &body[0].kind {
            StmtKind::Import { names } => assert_eq!(names[0].asname, None),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(info.std_alias.get("np"), Some(&"numpy".to_string()));
        assert!(info.no_rename.contains("numpy"));
    }

    #[test]
    fn test_from_import_bound_names() {
        let (_, info) = classify("from math import sqrt, floor as sol\n");
        assert!(info.no_rename.contains("sqrt"));
        assert!(info.no_rename.contains("floor"));
        assert_eq!(info.std_alias.get("sol"), Some(&"floor".to_string()));
    }

    #[test]
    fn test_pool_import_aliased() {
        let hash = "a".repeat(64);
        let source = format!("from fnpool.pool import object_{hash} as helper\n");
        let (body, info) = classify(&source);
        match &body[0].kind {
            StmtKind::ImportFrom { names, .. } => assert_eq!(names[0].asname, None),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(info.alias_mapping.get(&hash), Some(&"helper".to_string()));
        assert_eq!(info.pool_bound.get("helper"), Some(&hash));
    }

    #[test]
    fn test_pool_import_unaliased_binds_canonical_name() {
        let hash = "b".repeat(64);
        let source = format!("from fnpool.pool import object_{hash}\n");
        let (_, info) = classify(&source);
        assert_eq!(
            info.alias_mapping.get(&hash),
            Some(&pool_object_name(&hash))
        );
    }

    #[test]
    fn test_pool_import_bad_name_rejected() {
        let mut module = parse_module("from fnpool.pool import helper\n").unwrap();
        let mut info = ImportInfo::default();
        let err = classify_and_rewrite(&mut module.body, POOL, &mut info).unwrap_err();
        assert!(matches!(err, PoolError::MalformedInput { .. }));
    }

    #[test]
    fn test_parse_pool_object_name_rejects_mixed_case() {
        let upper = format!("object_{}", "A".repeat(64));
        assert!(parse_pool_object_name(&upper).is_none());
        let good = format!("object_{}", "a".repeat(64));
        assert!(parse_pool_object_name(&good).is_some());
    }
}
