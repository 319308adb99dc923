//! Core building blocks shared by every component: the error taxonomy,
//! the hashing scheme and canonical JSON, and filesystem helpers.

pub mod errors;
pub mod fs_utils;
pub mod hash;

pub use errors::PoolError;
pub use hash::{canonical_json, function_hash, mapping_hash};

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, PoolError>;
