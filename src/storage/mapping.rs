//! `mapping.json`: one language variant of an object. Content-addressed by
//! the SHA-256 of its canonical JSON, so identical mappings collapse to one
//! file regardless of which function or language they serve.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::hash::mapping_hash;
use crate::normalizer::CanonicalId;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mapping {
    /// Author's docstring, possibly empty.
    pub docstring: String,
    /// canonical id → author identifier; keys iterate in canonical-id order.
    pub name_mapping: BTreeMap<CanonicalId, String>,
    /// referenced function hash → the local name bound in the author's code.
    pub alias_mapping: BTreeMap<String, String>,
    /// Free-form variant label, possibly empty.
    pub comment: String,
}

impl Mapping {
    pub fn new(
        docstring: impl Into<String>,
        name_mapping: BTreeMap<CanonicalId, String>,
        alias_mapping: BTreeMap<String, String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            docstring: docstring.into(),
            name_mapping,
            alias_mapping,
            comment: comment.into(),
        }
    }

    /// The mapping's content hash (lowercase hex SHA-256 of canonical JSON).
    pub fn content_hash(&self) -> String {
        mapping_hash(self)
    }
}
