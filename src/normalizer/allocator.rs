/*!
# Canonical-Name Allocator

Assigns canonical identifiers `_fnpool_v_N` in first-appearance order during
a pre-order walk of the function: index 0 is the function's own name,
indices 1..k its parameters in declaration order, and subsequent indices the
remaining renameable names at their first occurrence. The resulting map is a
bijection; nested scopes that re-bind a name reuse the outer assignment so
inner bindings never shift outer numbering.
*/

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed prefix of every canonical identifier, chosen once for the whole
/// system. Two runs of the normalizer on the same input yield byte-identical
/// canonical names.
pub const CANONICAL_PREFIX: &str = "_fnpool_v_";

/// A canonical identifier `_fnpool_v_N`, ordered by its index (so
/// `_fnpool_v_2` sorts before `_fnpool_v_10`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalId(u32);

impl CanonicalId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }

    /// The canonical entry identifier of any pool function (its own name).
    pub fn entry() -> Self {
        Self(0)
    }

    /// Parse `_fnpool_v_N`; returns None for anything else.
    pub fn parse(name: &str) -> Option<Self> {
        let digits = name.strip_prefix(CANONICAL_PREFIX)?;
        if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
            return None;
        }
        digits.parse().ok().map(CanonicalId)
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CANONICAL_PREFIX}{}", self.0)
    }
}

impl FromStr for CanonicalId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("not a canonical identifier: {s:?}"))
    }
}

impl Serialize for CanonicalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CanonicalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Running allocator used by the normalizer's walk.
#[derive(Debug, Default)]
pub struct NameAllocator {
    assigned: HashMap<String, CanonicalId>,
    order: Vec<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next canonical id to `name`, or return the existing
    /// assignment (first occurrence wins).
    pub fn assign(&mut self, name: &str) -> CanonicalId {
        if let Some(id) = self.assigned.get(name) {
            return *id;
        }
        let id = CanonicalId::new(self.order.len() as u32);
        self.assigned.insert(name.to_string(), id);
        self.order.push(name.to_string());
        id
    }

    pub fn get(&self, name: &str) -> Option<CanonicalId> {
        self.assigned.get(name).copied()
    }

    /// The inverse mapping persisted in a `Mapping` record:
    /// canonical id → the author's original identifier.
    pub fn name_mapping(&self) -> BTreeMap<CanonicalId, String> {
        self.order
            .iter()
            .enumerate()
            .map(|(i, name)| (CanonicalId::new(i as u32), name.clone()))
            .collect()
    }
}
