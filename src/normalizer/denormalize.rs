/*!
# Denormalizer

Inverts the normalizer using a chosen mapping: canonical identifiers become
the author's originals, pool references regain their local aliases, and the
placeholder docstring becomes the recorded one (or disappears when the
author had none).
*/

use std::collections::BTreeMap;

use crate::config::PoolConfig;
use crate::core::{PoolError, Result};
use crate::parser::ast::*;
use crate::parser::{parse_module, print_module};

use super::allocator::CanonicalId;
use super::imports::{parse_pool_object_name, reattach_pool_aliases};
use super::visit::{walk_stmt, Transform};

/// Reconstruct author-visible code from canonical form plus a mapping.
pub fn denormalize(
    normalized_code: &str,
    docstring: &str,
    name_mapping: &BTreeMap<CanonicalId, String>,
    alias_mapping: &BTreeMap<String, String>,
    config: &PoolConfig,
) -> Result<String> {
    let mut module = parse_module(normalized_code)?;

    reattach_pool_aliases(&mut module.body, &config.pool_import_module, alias_mapping);

    let mut pass = DenormalizePass {
        name_mapping,
        alias_mapping,
    };
    for stmt in &mut module.body {
        walk_stmt(&mut pass, stmt)?;
    }

    restore_docstring(&mut module, docstring);

    Ok(print_module(&module))
}

fn restore_docstring(module: &mut Module, docstring: &str) {
    for stmt in &mut module.body {
        if let StmtKind::FunctionDef(def) = &mut stmt.kind {
            let pos = stmt.pos;
            // Drop the placeholder, whatever its exact text.
            if matches!(
                def.body.first(),
                Some(Stmt {
                    kind: StmtKind::Expr { value },
                    ..
                }) if value.as_str_constant().is_some()
            ) {
                def.body.remove(0);
            }
            if !docstring.is_empty() {
                def.body.insert(
                    0,
                    Stmt {
                        kind: StmtKind::Expr {
                            value: Expr::new(
                                ExprKind::Constant {
                                    value: Constant::Str(docstring.to_string()),
                                },
                                pos,
                            ),
                        },
                        pos,
                    },
                );
            } else if def.body.is_empty() {
                def.body.push(Stmt {
                    kind: StmtKind::Pass,
                    pos,
                });
            }
            return;
        }
    }
}

struct DenormalizePass<'a> {
    name_mapping: &'a BTreeMap<CanonicalId, String>,
    alias_mapping: &'a BTreeMap<String, String>,
}

impl DenormalizePass<'_> {
    fn restore(&self, name: &mut String) -> Result<()> {
        if let Some(canonical) = CanonicalId::parse(name) {
            match self.name_mapping.get(&canonical) {
                Some(original) => *name = original.clone(),
                None => {
                    return Err(PoolError::MappingIncomplete {
                        identifier: canonical.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Transform for DenormalizePass<'_> {
    fn pre_expr(&mut self, expr: &mut Expr) -> Result<bool> {
        // `object_<hash>._fnpool_v_0` collapses back to the author's alias.
        if let ExprKind::Attribute { value, attr } = &expr.kind {
            if CanonicalId::parse(attr) == Some(CanonicalId::entry()) {
                if let ExprKind::Name { id } = &value.kind {
                    if let Some(hash) = parse_pool_object_name(id) {
                        if let Some(alias) = self.alias_mapping.get(hash) {
                            expr.kind = ExprKind::Name { id: alias.clone() };
                            return Ok(false);
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    fn on_name(&mut self, id: &mut String, _pos: Position) -> Result<()> {
        self.restore(id)
    }

    fn on_binding(&mut self, name: &mut String, _pos: Position) -> Result<()> {
        self.restore(name)
    }
}
