/*!
# AST Normalizer

Rewrites a parsed function into canonical form: identifiers become
`_fnpool_v_N` placeholders in first-appearance order, import aliases are
stripped, pool imports are rewritten to address their target by hash, the
docstring is sentinelized, imports are sorted, and the result is printed
deterministically. The inverse pipeline (`denormalize`) reconstructs the
author-visible code from canonical form plus a chosen mapping.
*/

pub mod allocator;
pub mod builtins;
pub mod denormalize;
pub mod imports;
pub mod normalize;
pub(crate) mod visit;

pub use allocator::{CanonicalId, NameAllocator, CANONICAL_PREFIX};
pub use denormalize::denormalize;
pub use normalize::{embed_docstring, normalize, sentinelize, NormalizationResult, Sentinelized};

/// Placeholder docstring kept in `normalized_code`; a fixed non-empty
/// sentinel so canonical code stays well-formed and language-neutral.
pub const DOCSTRING_PLACEHOLDER: &str = "__fnpool_docstring__";
