/*!
Integration tests for v0 → v1 migration and pool validation.
*/

use tempfile::TempDir;

use fnpool::core::hash::function_hash;
use fnpool::storage::{layout, MigrateOptions, Pool};
use fnpool::{add_source, get_source, normalize, Mapping, PoolConfig, SchemaVersion};

fn test_pool() -> (TempDir, Pool) {
    let dir = TempDir::new().unwrap();
    let pool = Pool::new(PoolConfig::with_root(dir.path()));
    (dir, pool)
}

/// Write a function through the v0 path in the given languages, returning
/// its hash.
fn seed_v0(pool: &Pool, sources: &[(&str, &str)]) -> String {
    let mut hash = None;
    for (source, lang) in sources {
        let result = normalize(source, pool.config()).unwrap();
        let function_hash = function_hash(&result.normalized_code_no_docstring);
        let mapping = Mapping::new(
            result.docstring,
            result.name_mapping,
            result.alias_mapping,
            "",
        );
        pool.save_function_v0(&function_hash, lang, &result.normalized_code, &mapping)
            .unwrap();
        if let Some(previous) = &hash {
            assert_eq!(previous, &function_hash, "fixtures must share logic");
        }
        hash = Some(function_hash);
    }
    hash.unwrap()
}

const ENGLISH: &str = "def sum_list(items):\n    \"\"\"Sum a list\"\"\"\n    total = 0\n    for item in items:\n        total += item\n    return total\n";

const FRENCH: &str = "def somme_liste(elements):\n    \"\"\"Somme d'une liste\"\"\"\n    total = 0\n    for element in elements:\n        total += element\n    return total\n";

#[test]
fn test_v0_record_with_two_languages_migrates_once() {
    let (_dir, pool) = test_pool();
    let hash = seed_v0(&pool, &[(ENGLISH, "eng"), (FRENCH, "fra")]);
    assert_eq!(pool.detect_version(&hash).unwrap(), SchemaVersion::V0);

    let outcome = pool
        .migrate_v0_to_v1(&hash, MigrateOptions::default())
        .unwrap();
    assert!(outcome.performed);
    assert_eq!(outcome.languages, vec!["eng", "fra"]);

    // One object, two mapping files, dispatch now selects v1.
    assert_eq!(pool.detect_version(&hash).unwrap(), SchemaVersion::V1);
    assert_eq!(pool.languages(&hash).unwrap(), vec!["eng", "fra"]);
    assert_eq!(pool.mappings(&hash, "eng").unwrap().len(), 1);
    assert_eq!(pool.mappings(&hash, "fra").unwrap().len(), 1);
    pool.validate(&hash).unwrap();

    // Migration preserves identity: the object re-hashes to the v0 hash.
    let object = pool.function_load(&hash).unwrap();
    assert_eq!(object.hash, hash);

    // Migrating again is a no-op: nothing v0 remains for this function.
    let summary = pool.migrate_all(MigrateOptions::default()).unwrap();
    assert_eq!(summary.migrated, 0);
    assert_eq!(summary.failed, 0);
}

#[test]
fn test_migrated_function_denormalizes_like_before() {
    let (_dir, pool) = test_pool();
    let hash = seed_v0(&pool, &[(ENGLISH, "eng"), (FRENCH, "fra")]);

    // Readable through v0 dispatch before migration.
    let before = get_source(&pool, &hash, "fra", None).unwrap();
    pool.migrate_v0_to_v1(&hash, MigrateOptions::default())
        .unwrap();
    let after = get_source(&pool, &hash, "fra", None).unwrap();
    assert_eq!(before, after);
    assert!(after.contains("def somme_liste(elements):"));
}

#[test]
fn test_dry_run_then_real_migration() {
    let (_dir, pool) = test_pool();
    let hash = seed_v0(&pool, &[(ENGLISH, "eng")]);

    let dry = pool
        .migrate_v0_to_v1(
            &hash,
            MigrateOptions {
                dry_run: true,
                ..MigrateOptions::default()
            },
        )
        .unwrap();
    assert!(!dry.performed);
    assert_eq!(pool.detect_version(&hash).unwrap(), SchemaVersion::V0);

    let real = pool
        .migrate_v0_to_v1(&hash, MigrateOptions::default())
        .unwrap();
    assert!(real.performed);
    assert_eq!(pool.detect_version(&hash).unwrap(), SchemaVersion::V1);
}

#[test]
fn test_keep_v0_retains_both_schemas() {
    let (_dir, pool) = test_pool();
    let hash = seed_v0(&pool, &[(ENGLISH, "eng")]);

    pool.migrate_v0_to_v1(
        &hash,
        MigrateOptions {
            keep_v0: true,
            ..MigrateOptions::default()
        },
    )
    .unwrap();

    // v1 wins on dispatch, but the v0 file is still there.
    assert_eq!(pool.detect_version(&hash).unwrap(), SchemaVersion::V1);
    assert!(pool.v0_exists(&hash));
}

#[test]
fn test_validate_all_reports_statistics() {
    let (_dir, pool) = test_pool();
    add_source(&pool, ENGLISH, "eng", "").unwrap();
    add_source(&pool, FRENCH, "fra", "").unwrap();
    add_source(
        &pool,
        "def double(value):\n    \"\"\"Double it\"\"\"\n    return value * 2\n",
        "eng",
        "",
    )
    .unwrap();

    let summary = pool.validate_all().unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.valid, 2);
    assert_eq!(summary.invalid, 0);
    assert!(summary.is_valid());
    assert!(summary.languages.contains("eng"));
    assert!(summary.languages.contains("fra"));
    assert_eq!(summary.missing_dependencies, 0);
}

#[test]
fn test_validate_all_detects_corruption() {
    let (_dir, pool) = test_pool();
    let (hash, _) = add_source(&pool, ENGLISH, "eng", "").unwrap();

    // A forged directory with unparseable object.json is invalid.
    let bogus = "ff".to_string() + &"0".repeat(62);
    let dir = layout::function_dir(&pool.objects_root(), &bogus);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("object.json"), "not valid json").unwrap();

    let summary = pool.validate_all().unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.valid, 1);
    assert_eq!(summary.invalid, 1);
    assert!(!summary.is_valid());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, bogus);

    // The healthy function still validates on its own.
    pool.validate(&hash).unwrap();
}

#[test]
fn test_validate_counts_missing_dependencies() {
    let (_dir, pool) = test_pool();
    let missing = "9".repeat(64);
    let source = format!(
        "from fnpool.pool import object_{missing} as helper\ndef f(x):\n    \"\"\"Uses a helper\"\"\"\n    return helper(x)\n"
    );
    add_source(&pool, &source, "eng", "").unwrap();

    let summary = pool.validate_all().unwrap();
    assert_eq!(summary.valid, 1);
    assert_eq!(summary.missing_dependencies, 1);
}

#[test]
fn test_validate_empty_pool() {
    let (_dir, pool) = test_pool();
    let summary = pool.validate_all().unwrap();
    assert_eq!(summary.total, 0);
    assert!(summary.is_valid());
}
