/*!
# Storage Engine

Owns all on-disk state of the pool. The v1 layout is a content-addressed
tree under `<root>/objects/`:

```text
objects/h₀h₁/h₂…h₆₃/
    object.json
    <lang>/
        m₀m₁/m₂…m₆₃/
            mapping.json
```

Legacy v0 records are single JSON files at `objects/h₀h₁/h₂…h₆₃.json`.
Reads detect the schema on disk and dispatch; writes follow the configured
schema switch (v1 by default). All file publication is atomic
(write-temp-then-rename), so concurrent processes and crashes never expose
a partially written file.
*/

pub mod dispatch;
pub mod layout;
pub mod mapping;
pub mod migrate;
pub mod object;
pub mod v0;
pub mod v1;
pub mod validate;

use std::path::PathBuf;

use crate::config::PoolConfig;

pub use dispatch::{FunctionView, SchemaVersion};
pub use mapping::Mapping;
pub use migrate::{MigrateOptions, MigrationOutcome, MigrationSummary};
pub use object::{HashAlgorithm, NormalizedFunction, ObjectMetadata};
pub use v0::V0Record;
pub use validate::{PoolValidation, ValidationReport};

/// Facade over one pool on disk. Cheap to construct; holds no file handles.
#[derive(Debug, Clone)]
pub struct Pool {
    config: PoolConfig,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn objects_root(&self) -> PathBuf {
        self.config.objects_root()
    }
}
