/*!
# v0 → v1 Migrator

Reads a legacy record, checks that its stored hash still matches its code,
synthesizes a v1 object plus one mapping per language, validates the result,
and only then retires the v0 file (renamed to a `.bak` sibling unless
`keep_v0` is set). Any failure leaves the v0 file untouched so the caller
can retry.
*/

use std::collections::BTreeSet;
use std::fs;

use tracing::{debug, info};

use crate::core::hash::function_hash;
use crate::core::{PoolError, Result};
use crate::normalizer::sentinelize;

use super::layout;
use super::mapping::Mapping;
use super::object::ObjectMetadata;
use super::Pool;

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateOptions {
    /// Leave the v0 file in place after a successful migration.
    pub keep_v0: bool,
    /// Report what would happen without writing anything.
    pub dry_run: bool,
}

/// Outcome of migrating a single function.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub hash: String,
    pub languages: Vec<String>,
    /// False for dry runs.
    pub performed: bool,
}

/// Aggregate outcome of `migrate_all`.
#[derive(Debug, Clone, Default)]
pub struct MigrationSummary {
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<(String, String)>,
}

impl Pool {
    /// Migrate one function from v0 to v1.
    pub fn migrate_v0_to_v1(
        &self,
        hash: &str,
        options: MigrateOptions,
    ) -> Result<MigrationOutcome> {
        let record = self.v0_load(hash)?;

        let failed = |reason: String| PoolError::MigrationFailed {
            hash: hash.to_string(),
            reason,
        };

        let sentinelized = sentinelize(&record.normalized_code)
            .map_err(|e| failed(format!("stored code does not parse: {e}")))?;
        let recomputed = function_hash(&sentinelized.without_docstring);
        if recomputed != hash {
            return Err(failed(format!(
                "stored code hashes to {recomputed}, not {hash}"
            )));
        }

        let languages = record.languages();
        if languages.is_empty() {
            return Err(failed("record has no language mappings".to_string()));
        }

        if options.dry_run {
            debug!(hash, "dry run, no writes performed");
            return Ok(MigrationOutcome {
                hash: hash.to_string(),
                languages,
                performed: false,
            });
        }

        let dependencies: BTreeSet<String> = record
            .alias_mappings
            .values()
            .flat_map(|aliases| aliases.keys().cloned())
            .collect();
        let metadata =
            ObjectMetadata::create(self.config(), dependencies.into_iter().collect());

        for lang in &languages {
            let mapping = Mapping::new(
                record.docstrings.get(lang).cloned().unwrap_or_default(),
                record.name_mappings[lang].clone(),
                record
                    .alias_mappings
                    .get(lang)
                    .cloned()
                    .unwrap_or_default(),
                "",
            );
            self.save_function_v1(
                hash,
                lang,
                &sentinelized.with_placeholder,
                &mapping,
                metadata.clone(),
            )
            .map_err(|e| failed(format!("writing mapping for {lang}: {e}")))?;
        }

        self.validate(hash)
            .map_err(|e| failed(format!("v1 validation failed: {e}")))?;

        if !options.keep_v0 {
            let v0_path = layout::v0_path(&self.objects_root(), hash);
            let backup = v0_path.with_extension("json.bak");
            fs::rename(&v0_path, &backup)
                .map_err(|e| failed(format!("retiring v0 record: {e}")))?;
        }

        info!(hash, languages = languages.len(), "migrated to v1");
        Ok(MigrationOutcome {
            hash: hash.to_string(),
            languages,
            performed: true,
        })
    }

    /// Migrate every v0 record in the pool, counting migrated / skipped /
    /// failed. Records whose v1 directory already exists are skipped.
    pub fn migrate_all(&self, options: MigrateOptions) -> Result<MigrationSummary> {
        let mut summary = MigrationSummary::default();
        let objects_root = self.objects_root();
        for hash in self.enumerate_hashes()? {
            if !self.v0_exists(&hash) {
                continue;
            }
            if layout::function_dir(&objects_root, &hash).is_dir() {
                summary.skipped += 1;
                continue;
            }
            match self.migrate_v0_to_v1(&hash, options) {
                Ok(_) => summary.migrated += 1,
                Err(err) => {
                    summary.failed += 1;
                    summary.failures.push((hash, err.to_string()));
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::config::PoolConfig;
    use crate::normalizer::normalize;

    use super::*;

    fn test_pool() -> (TempDir, Pool) {
        let dir = TempDir::new().unwrap();
        let pool = Pool::new(PoolConfig::with_root(dir.path()));
        (dir, pool)
    }

    /// Seed a v0 record by normalizing real source and writing through the
    /// v0 path, returning the function hash.
    fn seed_v0(pool: &Pool, source: &str, langs: &[(&str, &str)]) -> String {
        let result = normalize(source, pool.config()).unwrap();
        let hash = function_hash(&result.normalized_code_no_docstring);
        for (lang, docstring) in langs {
            let mapping = Mapping::new(
                docstring.to_string(),
                result.name_mapping.clone(),
                result.alias_mapping.clone(),
                "",
            );
            pool.save_function_v0(&hash, lang, &result.normalized_code, &mapping)
                .unwrap();
        }
        hash
    }

    const SOURCE: &str = "def sum_list(items):\n    \"\"\"Sum a list\"\"\"\n    total = 0\n    for item in items:\n        total += item\n    return total\n";

    #[test]
    fn test_migration_preserves_identity() {
        let (_dir, pool) = test_pool();
        let hash = seed_v0(&pool, SOURCE, &[("eng", "Sum a list"), ("fra", "Somme d'une liste")]);

        let outcome = pool
            .migrate_v0_to_v1(&hash, MigrateOptions::default())
            .unwrap();
        assert!(outcome.performed);
        assert_eq!(outcome.languages, vec!["eng", "fra"]);

        let object = pool.function_load(&hash).unwrap();
        assert_eq!(object.hash, hash);
        assert_eq!(pool.languages(&hash).unwrap(), vec!["eng", "fra"]);
        pool.validate(&hash).unwrap();

        // The v0 file is retired to a .bak sibling.
        assert!(!pool.v0_exists(&hash));
        let backup = layout::v0_path(&pool.objects_root(), &hash).with_extension("json.bak");
        assert!(backup.exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (_dir, pool) = test_pool();
        let hash = seed_v0(&pool, SOURCE, &[("eng", "Sum a list")]);

        let outcome = pool
            .migrate_v0_to_v1(
                &hash,
                MigrateOptions {
                    dry_run: true,
                    ..MigrateOptions::default()
                },
            )
            .unwrap();
        assert!(!outcome.performed);
        assert!(pool.v0_exists(&hash));
        assert!(!layout::function_dir(&pool.objects_root(), &hash).exists());
    }

    #[test]
    fn test_keep_v0_leaves_record() {
        let (_dir, pool) = test_pool();
        let hash = seed_v0(&pool, SOURCE, &[("eng", "Sum a list")]);

        pool.migrate_v0_to_v1(
            &hash,
            MigrateOptions {
                keep_v0: true,
                ..MigrateOptions::default()
            },
        )
        .unwrap();
        assert!(pool.v0_exists(&hash));
        assert!(pool.function_load(&hash).is_ok());
    }

    #[test]
    fn test_corrupt_v0_fails_and_is_untouched() {
        let (_dir, pool) = test_pool();
        let hash = seed_v0(&pool, SOURCE, &[("eng", "Sum a list")]);

        // Tamper with the stored code so the hash no longer matches.
        let path = layout::v0_path(&pool.objects_root(), &hash);
        let mut record = pool.v0_load(&hash).unwrap();
        record.normalized_code = record.normalized_code.replace("+=", "-=");
        crate::core::fs_utils::write_json_atomic(&path, &record).unwrap();

        let err = pool
            .migrate_v0_to_v1(&hash, MigrateOptions::default())
            .unwrap_err();
        assert!(matches!(err, PoolError::MigrationFailed { .. }));
        assert!(pool.v0_exists(&hash));
    }

    #[test]
    fn test_migrate_all_counts_and_is_idempotent() {
        let (_dir, pool) = test_pool();
        seed_v0(&pool, SOURCE, &[("eng", "Sum a list")]);
        seed_v0(
            &pool,
            "def double(value):\n    \"\"\"Double it\"\"\"\n    return value * 2\n",
            &[("eng", "Double it")],
        );

        let options = MigrateOptions {
            keep_v0: true,
            ..MigrateOptions::default()
        };
        let first = pool.migrate_all(options).unwrap();
        assert_eq!(first.migrated, 2);
        assert_eq!(first.skipped, 0);
        assert_eq!(first.failed, 0);

        // Second run: every record already has a v1 directory.
        let second = pool.migrate_all(options).unwrap();
        assert_eq!(second.migrated, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.failed, 0);
    }
}
