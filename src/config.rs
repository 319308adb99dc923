/*!
# Pool Configuration

Environment-driven configuration: `POOL_ROOT` selects the pool location
(default `~/.fnpool`), the `USER` variable supplies the author recorded on
object creation, and the pool-import marker module is data rather than a
hard-coded string so nothing outside this struct knows its spelling.
*/

use std::env;
use std::path::{Path, PathBuf};

use crate::storage::SchemaVersion;

/// Environment variable naming the pool root directory.
pub const POOL_ROOT_ENV: &str = "POOL_ROOT";

/// Default marker module for pool imports.
pub const DEFAULT_POOL_IMPORT_MODULE: &str = "fnpool.pool";

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Pool location; objects live under `<root>/objects/`.
    pub root: PathBuf,
    /// Author recorded in object metadata at creation time.
    pub author: String,
    /// Module path that marks an import as a pool import.
    pub pool_import_module: String,
    /// Schema used on the write path; reads always dispatch on what is on
    /// disk. Defaults to v1.
    pub write_schema: SchemaVersion,
}

impl PoolConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Self {
        let root = env::var_os(POOL_ROOT_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_root);
        Self::with_root(root)
    }

    /// Configuration rooted at an explicit directory (tests, `--pool-root`).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            author: author_from_env(),
            pool_import_module: DEFAULT_POOL_IMPORT_MODULE.to_string(),
            write_schema: SchemaVersion::V1,
        }
    }

    pub fn objects_root(&self) -> PathBuf {
        self.root.join("objects")
    }
}

fn default_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(".fnpool")
}

fn author_from_env() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_root_defaults() {
        let config = PoolConfig::with_root("/tmp/pool");
        assert_eq!(config.objects_root(), PathBuf::from("/tmp/pool/objects"));
        assert_eq!(config.pool_import_module, "fnpool.pool");
        assert_eq!(config.write_schema, SchemaVersion::V1);
        assert!(!config.author.is_empty());
    }
}
