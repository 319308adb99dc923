/*!
# Normalization Pipeline

Turns one parsed source module into its canonical form and the per-language
mapping data. The module may contain import statements and exactly one
function definition; anything else is rejected. The pipeline:

1. locate the function, extract its docstring;
2. classify imports (standard vs pool), strip aliases;
3. rewrite pool-bound reference sites to `object_<hash>._fnpool_v_0`;
4. allocate canonical names in first-appearance order;
5. rename every renameable identifier;
6. sort imports by their canonical printed form;
7. print two renditions: the placeholder-docstring form that is stored, and
   the empty-docstring form that is hashed.
*/

use std::collections::BTreeMap;

use crate::config::PoolConfig;
use crate::core::{PoolError, Result};
use crate::parser::ast::*;
use crate::parser::{parse_module, print_module};

use super::allocator::{CanonicalId, NameAllocator};
use super::builtins::is_builtin;
use super::imports::{classify_and_rewrite, pool_object_name, ImportInfo};
use super::visit::{walk_function_def, Transform};
use super::DOCSTRING_PLACEHOLDER;

/// Everything the normalizer produces for one input.
#[derive(Debug, Clone)]
pub struct NormalizationResult {
    /// Canonical code with the placeholder docstring; what `object.json`
    /// stores.
    pub normalized_code: String,
    /// Canonical code with the empty docstring sentinel; what gets hashed.
    pub normalized_code_no_docstring: String,
    /// The author's docstring, verbatim (empty if absent).
    pub docstring: String,
    /// canonical id → author identifier.
    pub name_mapping: BTreeMap<CanonicalId, String>,
    /// referenced function hash → local name bound in the author's code.
    pub alias_mapping: BTreeMap<String, String>,
}

/// Normalize one source module.
pub fn normalize(source: &str, config: &PoolConfig) -> Result<NormalizationResult> {
    let module = parse_module(source)?;
    let (mut imports, mut def, def_pos) = split_module(module)?;

    let docstring = take_docstring(&mut def.body).unwrap_or_default();

    let mut info = ImportInfo::default();
    classify_and_rewrite(&mut imports, &config.pool_import_module, &mut info)?;
    classify_and_rewrite(&mut def.body, &config.pool_import_module, &mut info)?;

    let mut rewriter = AliasRewriter { info: &info };
    walk_function_def(&mut rewriter, &mut def, def_pos)?;

    let mut allocator = NameAllocator::new();
    {
        let mut pass = AllocatorPass {
            allocator: &mut allocator,
            info: &info,
        };
        walk_function_def(&mut pass, &mut def, def_pos)?;
    }
    {
        let mut pass = RenamePass {
            allocator: &allocator,
        };
        walk_function_def(&mut pass, &mut def, def_pos)?;
    }

    sort_imports(&mut imports);

    let normalized_code = render(&imports, &def, def_pos, DOCSTRING_PLACEHOLDER)?;
    let normalized_code_no_docstring = render(&imports, &def, def_pos, "")?;

    Ok(NormalizationResult {
        normalized_code,
        normalized_code_no_docstring,
        docstring,
        name_mapping: allocator.name_mapping(),
        alias_mapping: info.alias_mapping,
    })
}

/// Split a module into its import preamble and its single function.
fn split_module(module: Module) -> Result<(Vec<Stmt>, FunctionDef, Position)> {
    let mut imports = Vec::new();
    let mut defs = Vec::new();
    for stmt in module.body {
        let pos = stmt.pos;
        match stmt.kind {
            StmtKind::Import { .. } | StmtKind::ImportFrom { .. } => imports.push(stmt),
            StmtKind::FunctionDef(def) => defs.push((def, pos)),
            _ => {
                return Err(PoolError::UnsupportedConstruct {
                    construct: "top-level statement (only imports and one function definition \
                                are allowed)"
                        .to_string(),
                    line: pos.line,
                    column: pos.column,
                })
            }
        }
    }
    if defs.len() != 1 {
        return Err(PoolError::MultipleDefinitions { count: defs.len() });
    }
    let (def, pos) = defs.pop().expect("checked length");
    Ok((imports, def, pos))
}

/// Remove and return the docstring if the first body node is a string
/// literal expression.
fn take_docstring(body: &mut Vec<Stmt>) -> Option<String> {
    let text = match body.first() {
        Some(Stmt {
            kind: StmtKind::Expr { value },
            ..
        }) => value.as_str_constant()?.to_string(),
        _ => return None,
    };
    body.remove(0);
    Some(text)
}

fn docstring_stmt(text: &str, pos: Position) -> Stmt {
    Stmt {
        kind: StmtKind::Expr {
            value: Expr::new(
                ExprKind::Constant {
                    value: Constant::Str(text.to_string()),
                },
                pos,
            ),
        },
        pos,
    }
}

/// Sort import statements lexicographically by their canonical printed form
/// so that import order is never a source of divergence.
fn sort_imports(imports: &mut [Stmt]) {
    imports.sort_by_cached_key(|stmt| {
        print_module(&Module {
            body: vec![stmt.clone()],
        })
    });
}

/// Assemble imports + function with the given docstring sentinel, print
/// deterministically, and verify the printer reached a fixed point.
fn render(
    imports: &[Stmt],
    def: &FunctionDef,
    def_pos: Position,
    docstring: &str,
) -> Result<String> {
    let mut def = def.clone();
    def.body.insert(0, docstring_stmt(docstring, def_pos));
    let mut body: Vec<Stmt> = imports.to_vec();
    body.push(Stmt {
        kind: StmtKind::FunctionDef(def),
        pos: def_pos,
    });
    stable_print(&Module { body })
}

/// Print, then re-parse and re-print until the text stops changing. The
/// printer is a fixed point by construction; the loop is the guarantee the
/// hasher relies on.
fn stable_print(module: &Module) -> Result<String> {
    let mut text = print_module(module);
    for _ in 0..3 {
        let reparsed = parse_module(&text)?;
        let again = print_module(&reparsed);
        if again == text {
            return Ok(text);
        }
        text = again;
    }
    Err(PoolError::MalformedInput {
        line: 0,
        column: 0,
        message: "canonical printer did not reach a fixed point".to_string(),
    })
}

/// Re-sentinelize already-canonical code: extract whatever docstring it
/// carries and produce both renditions again. Used by migration, validation
/// and the v0 read path, where stored code embeds a real docstring.
pub fn sentinelize(code: &str) -> Result<Sentinelized> {
    let module = parse_module(code)?;
    let (imports, mut def, def_pos) = split_module(module)?;
    let docstring = take_docstring(&mut def.body).unwrap_or_default();
    let with_placeholder = render(&imports, &def, def_pos, DOCSTRING_PLACEHOLDER)?;
    let without_docstring = render(&imports, &def, def_pos, "")?;
    Ok(Sentinelized {
        with_placeholder,
        without_docstring,
        docstring,
    })
}

/// Output of `sentinelize`.
#[derive(Debug, Clone)]
pub struct Sentinelized {
    pub with_placeholder: String,
    pub without_docstring: String,
    /// Docstring found in the input (may be the placeholder itself when the
    /// input came from `object.json`).
    pub docstring: String,
}

/// Replace the placeholder docstring in canonical code with `docstring`
/// (or drop it when empty), keeping everything else untouched. Used when
/// writing v0 records, which embed the author docstring.
pub fn embed_docstring(code: &str, docstring: &str) -> Result<String> {
    let module = parse_module(code)?;
    let (imports, mut def, def_pos) = split_module(module)?;
    take_docstring(&mut def.body);
    if docstring.is_empty() {
        if def.body.is_empty() {
            def.body.push(Stmt {
                kind: StmtKind::Pass,
                pos: def_pos,
            });
        }
        let mut body: Vec<Stmt> = imports.to_vec();
        body.push(Stmt {
            kind: StmtKind::FunctionDef(def),
            pos: def_pos,
        });
        stable_print(&Module { body })
    } else {
        render(&imports, &def, def_pos, docstring)
    }
}

/// Rewrites pool-bound and standard-alias name references.
struct AliasRewriter<'a> {
    info: &'a ImportInfo,
}

impl Transform for AliasRewriter<'_> {
    fn pre_expr(&mut self, expr: &mut Expr) -> Result<bool> {
        if let ExprKind::Name { id } = &expr.kind {
            if let Some(hash) = self.info.pool_bound.get(id) {
                let pos = expr.pos;
                expr.kind = ExprKind::Attribute {
                    value: Box::new(Expr::name(pool_object_name(hash), pos)),
                    attr: CanonicalId::entry().to_string(),
                };
                return Ok(false);
            }
            if let Some(dotted) = self.info.std_alias.get(id) {
                expr.kind = dotted_name_kind(dotted, expr.pos);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// `os.path` → `Attribute(Name(os), path)`.
fn dotted_name_kind(dotted: &str, pos: Position) -> ExprKind {
    let mut parts = dotted.split('.');
    let first = parts.next().unwrap_or(dotted);
    let mut expr = Expr::name(first, pos);
    for part in parts {
        expr = Expr::new(
            ExprKind::Attribute {
                value: Box::new(expr),
                attr: part.to_string(),
            },
            pos,
        );
    }
    expr.kind
}

/// Assigns canonical ids at first occurrence, honoring the exclusion sets.
struct AllocatorPass<'a> {
    allocator: &'a mut NameAllocator,
    info: &'a ImportInfo,
}

impl AllocatorPass<'_> {
    fn renameable(&self, name: &str) -> bool {
        !is_builtin(name) && !self.info.no_rename.contains(name)
    }
}

impl Transform for AllocatorPass<'_> {
    fn on_name(&mut self, id: &mut String, _pos: Position) -> Result<()> {
        if self.renameable(id) {
            self.allocator.assign(id);
        }
        Ok(())
    }

    fn on_binding(&mut self, name: &mut String, _pos: Position) -> Result<()> {
        if self.renameable(name) {
            self.allocator.assign(name);
        }
        Ok(())
    }
}

/// Applies the allocator's bijection to every name occurrence.
struct RenamePass<'a> {
    allocator: &'a NameAllocator,
}

impl Transform for RenamePass<'_> {
    fn on_name(&mut self, id: &mut String, _pos: Position) -> Result<()> {
        if let Some(canonical) = self.allocator.get(id) {
            *id = canonical.to_string();
        }
        Ok(())
    }

    fn on_binding(&mut self, name: &mut String, _pos: Position) -> Result<()> {
        if let Some(canonical) = self.allocator.get(name) {
            *name = canonical.to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PoolConfig {
        PoolConfig::with_root("/tmp/unused")
    }

    const SUM_LIST: &str = "def sum_list(items):\n    \"\"\"Sum a list\"\"\"\n    total = 0\n    for item in items:\n        total += item\n    return total\n";

    #[test]
    fn test_scenario_sum_list() {
        let result = normalize(SUM_LIST, &config()).unwrap();
        assert_eq!(result.docstring, "Sum a list");
        let mapping = &result.name_mapping;
        assert_eq!(mapping[&CanonicalId::new(0)], "sum_list");
        assert_eq!(mapping[&CanonicalId::new(1)], "items");
        assert_eq!(mapping[&CanonicalId::new(2)], "total");
        assert_eq!(mapping[&CanonicalId::new(3)], "item");
        assert!(result.normalized_code.contains("def _fnpool_v_0(_fnpool_v_1):"));
        assert!(result
            .normalized_code
            .contains(&format!("'{DOCSTRING_PLACEHOLDER}'")));
        assert!(result.normalized_code_no_docstring.contains("''"));
    }

    #[test]
    fn test_determinism() {
        let a = normalize(SUM_LIST, &config()).unwrap();
        let b = normalize(SUM_LIST, &config()).unwrap();
        assert_eq!(a.normalized_code, b.normalized_code);
        assert_eq!(
            a.normalized_code_no_docstring,
            b.normalized_code_no_docstring
        );
    }

    #[test]
    fn test_identifier_independence() {
        let french = "def somme_liste(elements):\n    \"\"\"Somme d'une liste\"\"\"\n    total = 0\n    for element in elements:\n        total += element\n    return total\n";
        let a = normalize(SUM_LIST, &config()).unwrap();
        let b = normalize(french, &config()).unwrap();
        assert_eq!(
            a.normalized_code_no_docstring,
            b.normalized_code_no_docstring
        );
        assert_ne!(a.name_mapping, b.name_mapping);
    }

    #[test]
    fn test_docstring_independence() {
        let other = SUM_LIST.replace("Sum a list", "Add every element together");
        let a = normalize(SUM_LIST, &config()).unwrap();
        let b = normalize(&other, &config()).unwrap();
        assert_eq!(
            a.normalized_code_no_docstring,
            b.normalized_code_no_docstring
        );
        assert_ne!(a.docstring, b.docstring);
    }

    #[test]
    fn test_builtins_not_renamed() {
        let result = normalize(
            "def total(items):\n    return sum(items) + len(items)\n",
            &config(),
        )
        .unwrap();
        assert!(result.normalized_code.contains("sum("));
        assert!(result.normalized_code.contains("len("));
    }

    #[test]
    fn test_import_alias_independence() {
        let plain = "import numpy\ndef f(x):\n    return numpy.mean(x)\n";
        let aliased = "import numpy as np\ndef f(x):\n    return np.mean(x)\n";
        let a = normalize(plain, &config()).unwrap();
        let b = normalize(aliased, &config()).unwrap();
        assert_eq!(
            a.normalized_code_no_docstring,
            b.normalized_code_no_docstring
        );
    }

    #[test]
    fn test_from_import_alias_reverts() {
        let result = normalize(
            "from math import sqrt as racine\ndef f(x):\n    return racine(x)\n",
            &config(),
        )
        .unwrap();
        assert!(result.normalized_code.contains("from math import sqrt"));
        assert!(result.normalized_code.contains("sqrt(_fnpool_v_1)"));
    }

    #[test]
    fn test_pool_import_rewrite() {
        let hash = "c".repeat(64);
        let source = format!(
            "from fnpool.pool import object_{hash} as helper\ndef f(x):\n    return helper(x)\n"
        );
        let result = normalize(&source, &config()).unwrap();
        assert!(result
            .normalized_code
            .contains(&format!("from fnpool.pool import object_{hash}\n")));
        assert!(!result.normalized_code.contains(" as helper"));
        assert!(result
            .normalized_code
            .contains(&format!("object_{hash}._fnpool_v_0(_fnpool_v_1)")));
        assert_eq!(result.alias_mapping.get(&hash), Some(&"helper".to_string()));
    }

    #[test]
    fn test_imports_sorted() {
        let source = "import zlib\nimport base64\ndef f(data):\n    return zlib.crc32(base64.b64encode(data))\n";
        let result = normalize(source, &config()).unwrap();
        let base64_at = result.normalized_code.find("import base64").unwrap();
        let zlib_at = result.normalized_code.find("import zlib").unwrap();
        assert!(base64_at < zlib_at);
    }

    #[test]
    fn test_multiple_definitions_rejected() {
        let err = normalize(
            "def a():\n    pass\ndef b():\n    pass\n",
            &config(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PoolError::MultipleDefinitions { count: 2 }
        ));
    }

    #[test]
    fn test_zero_definitions_rejected() {
        let err = normalize("import os\n", &config()).unwrap_err();
        assert!(matches!(err, PoolError::MultipleDefinitions { count: 0 }));
    }

    #[test]
    fn test_async_preserved() {
        let result = normalize(
            "async def fetch(url):\n    data = await url.read()\n    return data\n",
            &config(),
        )
        .unwrap();
        assert!(result.normalized_code.starts_with("async def _fnpool_v_0"));
        assert!(result.normalized_code.contains("await"));
    }

    #[test]
    fn test_decorators_renamed() {
        let result = normalize(
            "def memoize(f):\n    return f\n",
            &config(),
        )
        .unwrap();
        assert_eq!(result.name_mapping[&CanonicalId::new(0)], "memoize");

        let decorated = "@memoize\ndef f(x):\n    return x\n";
        let result = normalize(decorated, &config()).unwrap();
        // The decorator reference is a plain name and gets a canonical id
        // after the function name and parameters.
        assert!(result.normalized_code.contains("@_fnpool_v_2"));
        assert_eq!(result.name_mapping[&CanonicalId::new(2)], "memoize");
    }

    #[test]
    fn test_nested_scopes_share_counter() {
        let source = "def outer(x):\n    def inner(y):\n        return y + x\n    return inner\n";
        let result = normalize(source, &config()).unwrap();
        let mapping = &result.name_mapping;
        assert_eq!(mapping[&CanonicalId::new(0)], "outer");
        assert_eq!(mapping[&CanonicalId::new(1)], "x");
        assert_eq!(mapping[&CanonicalId::new(2)], "inner");
        assert_eq!(mapping[&CanonicalId::new(3)], "y");
    }

    #[test]
    fn test_docstring_inserted_when_absent() {
        let result = normalize("def f(x):\n    return x\n", &config()).unwrap();
        assert_eq!(result.docstring, "");
        assert!(result
            .normalized_code
            .contains(&format!("'{DOCSTRING_PLACEHOLDER}'")));
    }

    #[test]
    fn test_sentinelize_round_trip() {
        let result = normalize(SUM_LIST, &config()).unwrap();
        let embedded = embed_docstring(&result.normalized_code, "Sum a list").unwrap();
        let sentinelized = sentinelize(&embedded).unwrap();
        assert_eq!(sentinelized.docstring, "Sum a list");
        assert_eq!(sentinelized.with_placeholder, result.normalized_code);
        assert_eq!(
            sentinelized.without_docstring,
            result.normalized_code_no_docstring
        );
    }

    #[test]
    fn test_kwarg_names_not_renamed() {
        let source = "def f(g):\n    return g(count=3)\n";
        let result = normalize(source, &config()).unwrap();
        assert!(result.normalized_code.contains("count=3"));
    }
}
