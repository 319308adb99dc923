/*!
# Error System

Every core operation returns either a well-formed result or a single typed
failure value identifying the category and the offending entity (path, hash,
or language). The CLI layer wraps these with `anyhow` context; the core never
swallows an error and never partially commits.
*/

use std::path::PathBuf;

use thiserror::Error;

/// Typed failure values surfaced by the pool core.
#[derive(Debug, Error)]
pub enum PoolError {
    // --- input errors ---
    #[error("malformed input at {line}:{column}: {message}")]
    MalformedInput {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("expected exactly one function definition, found {count}")]
    MultipleDefinitions { count: usize },

    #[error("unsupported construct at {line}:{column}: {construct}")]
    UnsupportedConstruct {
        construct: String,
        line: usize,
        column: usize,
    },

    #[error("invalid language code: {code:?}")]
    InvalidLanguageCode { code: String },

    #[error("invalid function hash: {value:?} (expected 64 lowercase hex characters)")]
    InvalidHashFormat { value: String },

    // --- not-found errors ---
    #[error("function not found: {hash}")]
    FunctionNotFound { hash: String },

    #[error("no mappings for language {lang:?} under function {hash}")]
    LanguageNotFound { hash: String, lang: String },

    #[error("mapping {mapping} not found for {hash}@{lang}")]
    MappingNotFound {
        hash: String,
        lang: String,
        mapping: String,
    },

    #[error("name mapping has no entry for canonical identifier {identifier}")]
    MappingIncomplete { identifier: String },

    // --- integrity errors ---
    #[error("pool corruption at {path}: {reason}")]
    Corruption { path: PathBuf, reason: String },

    // --- storage errors ---
    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // --- migration errors ---
    #[error("migration of {hash} failed: {reason}")]
    MigrationFailed { hash: String, reason: String },
}

impl PoolError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PoolError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PoolError::Corruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for the not-found family, which callers may treat as a fallback
    /// signal (e.g. the v1 read path falling back to v0 dispatch).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PoolError::FunctionNotFound { .. }
                | PoolError::LanguageNotFound { .. }
                | PoolError::MappingNotFound { .. }
        )
    }
}
