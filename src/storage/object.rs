//! `object.json`: the canonical, language-independent representation of one
//! function plus its creation metadata. Immutable once written.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PoolConfig;

pub const SCHEMA_VERSION_V1: u32 = 1;

/// Hash algorithm recorded in the object; extension point with a single
/// defined member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFunction {
    pub schema_version: u32,
    pub hash: String,
    pub hash_algorithm: HashAlgorithm,
    /// Canonical code with the placeholder docstring.
    pub normalized_code: String,
    pub metadata: ObjectMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// RFC-3339 UTC timestamp set at creation.
    pub created: String,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Function hashes this object references through pool imports.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ObjectMetadata {
    /// Metadata for a freshly created object.
    pub fn create(config: &PoolConfig, dependencies: Vec<String>) -> Self {
        Self {
            created: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            author: config.author.clone(),
            tags: Vec::new(),
            dependencies,
        }
    }
}

impl NormalizedFunction {
    pub fn new(hash: String, normalized_code: String, metadata: ObjectMetadata) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1,
            hash,
            hash_algorithm: HashAlgorithm::Sha256,
            normalized_code,
            metadata,
        }
    }
}
