/*!
# fnpool

A content-addressed pool of source-code functions. Functions written against
different human languages (French, Spanish, English, Arabic, …) that
implement identical logic collapse to the same cryptographic identifier; the
pool stores one canonical form of the code together with per-language
*mappings* back to the author's original identifiers and docstring.

## Architecture

```text
fnpool
├── parser       - Python-subset lexer (logos), grammar, deterministic printer
├── normalizer   - canonical-name allocation, import rewriting, docstring
│                  sentinel, denormalization
├── core         - error taxonomy, SHA-256 hashing, canonical JSON, atomic IO
├── storage      - v1 content-addressed tree, v0 legacy records, dispatch,
│                  migration, validation
└── cli_common   - logging and output helpers for the fnpool binary
```

## Usage

```rust,no_run
use fnpool::{add_source, config::PoolConfig, storage::Pool};

let pool = Pool::new(PoolConfig::from_env());
let source = "def double(x):\n    \"\"\"Double x\"\"\"\n    return x * 2\n";
let (function_hash, mapping_hash) = add_source(&pool, source, "eng", "")?;
let code = fnpool::get_source(&pool, &function_hash, "eng", None)?;
# Ok::<(), fnpool::core::PoolError>(())
```
*/

pub mod cli_common;
pub mod config;
pub mod core;
pub mod normalizer;
pub mod parser;
pub mod storage;

pub use crate::config::PoolConfig;
pub use crate::core::{PoolError, Result};
pub use crate::normalizer::{denormalize, normalize, CanonicalId, NormalizationResult};
pub use crate::storage::{
    FunctionView, Mapping, MigrateOptions, NormalizedFunction, ObjectMetadata, Pool,
    SchemaVersion,
};

use crate::core::hash::function_hash;

/// Normalize one source text and persist it under `lang`.
/// Returns `(function_hash, mapping_hash)`.
pub fn add_source(
    pool: &Pool,
    source: &str,
    lang: &str,
    comment: &str,
) -> Result<(String, String)> {
    storage::layout::validate_lang(lang)?;
    let result = normalize(source, pool.config())?;
    let hash = function_hash(&result.normalized_code_no_docstring);
    let mapping = Mapping::new(
        result.docstring,
        result.name_mapping,
        result.alias_mapping,
        comment,
    );
    let dependencies = mapping.alias_mapping.keys().cloned().collect();
    let metadata = ObjectMetadata::create(pool.config(), dependencies);
    pool.save_function(&hash, lang, &result.normalized_code, &mapping, metadata)
}

/// Load a function and reconstruct the author-visible source for `lang`,
/// using the chosen mapping or the latest one.
pub fn get_source(
    pool: &Pool,
    hash: &str,
    lang: &str,
    mapping_hash: Option<&str>,
) -> Result<String> {
    let view = pool.load_view(hash, lang, mapping_hash)?;
    denormalize(
        &view.normalized_code,
        &view.docstring,
        &view.name_mapping,
        &view.alias_mapping,
        pool.config(),
    )
}
