/*!
# fnpool CLI

Command-line interface for the function pool: add source files, reconstruct
author-visible code, inspect objects, translate mappings, migrate legacy
records and validate pool integrity.
*/

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use fnpool::cli_common::{self, print_error, print_info, print_success};
use fnpool::config::PoolConfig;
use fnpool::core::fs_utils::read_source_file;
use fnpool::storage::{MigrateOptions, Pool};
use fnpool::{add_source, get_source, Mapping};

#[derive(Parser)]
#[command(
    name = "fnpool",
    version = env!("CARGO_PKG_VERSION"),
    about = "Content-addressed pool of source functions with per-language mappings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pool location (overrides the POOL_ROOT environment variable)
    #[arg(long, global = true)]
    pool_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a function to the pool
    Add {
        /// Source file with language suffix, e.g. sum.py@eng
        target: String,

        /// Variant label stored with the mapping
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Reconstruct a function's source for one language
    Get {
        /// Function hash with language suffix, e.g. <hash>@fra
        target: String,

        /// Specific mapping hash (defaults to the latest variant)
        #[arg(long)]
        mapping: Option<String>,
    },

    /// Summarize an object: metadata, languages, mapping variants
    Show {
        /// Function hash
        hash: String,
    },

    /// Derive a new language mapping from an existing one
    Translate {
        /// Source mapping, e.g. <hash>@eng
        source: String,

        /// Destination language code
        dst_lang: String,

        /// Identifier override, repeatable: --rename _fnpool_v_1=valeurs
        #[arg(long = "rename", value_name = "CANON=NAME")]
        renames: Vec<String>,

        /// Docstring for the new mapping (defaults to the source docstring)
        #[arg(long)]
        docstring: Option<String>,

        /// Variant label for the new mapping
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Migrate legacy v0 records to the v1 layout
    Migrate {
        /// Migrate one function (all v0 records if omitted)
        hash: Option<String>,

        /// Report without writing
        #[arg(long)]
        dry_run: bool,

        /// Leave v0 files in place after migration
        #[arg(long)]
        keep_v0: bool,
    },

    /// Check pool integrity
    Validate {
        /// Validate one function (whole pool if omitted)
        hash: Option<String>,

        /// Validate the entire pool
        #[arg(long)]
        all: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli_common::init_logging(cli.verbose) {
        print_error(&format!("{err:#}"));
        std::process::exit(1);
    }

    let config = match &cli.pool_root {
        Some(root) => PoolConfig::with_root(root.clone()),
        None => PoolConfig::from_env(),
    };
    let pool = Pool::new(config);

    if let Err(err) = run(cli.command, &pool) {
        print_error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

fn run(command: Commands, pool: &Pool) -> Result<()> {
    match command {
        Commands::Add { target, comment } => add_command(pool, &target, &comment),
        Commands::Get { target, mapping } => get_command(pool, &target, mapping.as_deref()),
        Commands::Show { hash } => show_command(pool, &hash),
        Commands::Translate {
            source,
            dst_lang,
            renames,
            docstring,
            comment,
        } => translate_command(pool, &source, &dst_lang, &renames, docstring, &comment),
        Commands::Migrate {
            hash,
            dry_run,
            keep_v0,
        } => migrate_command(pool, hash.as_deref(), MigrateOptions { keep_v0, dry_run }),
        Commands::Validate { hash, all } => validate_command(pool, hash.as_deref(), all),
    }
}

/// Split `<something>@<lang>`, rejecting targets without a language suffix.
fn split_target(target: &str) -> Result<(&str, &str)> {
    match target.rsplit_once('@') {
        Some((left, lang)) if !left.is_empty() && !lang.is_empty() => Ok((left, lang)),
        _ => bail!("missing language suffix; use the form <target>@<lang>"),
    }
}

fn add_command(pool: &Pool, target: &str, comment: &str) -> Result<()> {
    let (path, lang) = split_target(target)?;
    let source = read_source_file(std::path::Path::new(path))
        .with_context(|| format!("reading {path}"))?;
    let (function_hash, mapping_hash) = add_source(pool, &source, lang, comment)
        .with_context(|| format!("adding {path}@{lang}"))?;
    print_success(&format!("Function saved: {path}@{lang}"));
    print_info(&format!("Hash: {function_hash}"));
    print_info(&format!("Mapping: {mapping_hash}"));
    Ok(())
}

fn get_command(pool: &Pool, target: &str, mapping: Option<&str>) -> Result<()> {
    let (hash, lang) = split_target(target)?;
    let code = get_source(pool, hash, lang, mapping)
        .with_context(|| format!("loading {hash}@{lang}"))?;
    println!("{code}");
    Ok(())
}

fn show_command(pool: &Pool, hash: &str) -> Result<()> {
    let schema = pool.detect_version(hash)?;
    print_info(&format!("Hash:    {hash}"));
    print_info(&format!("Schema:  {schema}"));

    match schema {
        fnpool::SchemaVersion::V1 => {
            let object = pool.function_load(hash)?;
            print_info(&format!("Created: {}", object.metadata.created));
            print_info(&format!("Author:  {}", object.metadata.author));
            if !object.metadata.tags.is_empty() {
                print_info(&format!("Tags:    {}", object.metadata.tags.join(", ")));
            }
            if !object.metadata.dependencies.is_empty() {
                print_info(&format!(
                    "Depends: {}",
                    object.metadata.dependencies.join(", ")
                ));
            }
            for lang in pool.languages(hash)? {
                print_info(&format!("Language: {lang}"));
                for mapping_hash in pool.mappings(hash, &lang)? {
                    let mapping = pool.mapping_load(hash, &lang, &mapping_hash)?;
                    let label = if mapping.comment.is_empty() {
                        String::new()
                    } else {
                        format!("  ({})", mapping.comment)
                    };
                    print_info(&format!("  {mapping_hash}{label}"));
                }
            }
        }
        fnpool::SchemaVersion::V0 => {
            let record = pool.v0_load(hash)?;
            for lang in record.languages() {
                print_info(&format!("Language: {lang}"));
            }
        }
    }
    Ok(())
}

fn translate_command(
    pool: &Pool,
    source: &str,
    dst_lang: &str,
    renames: &[String],
    docstring: Option<String>,
    comment: &str,
) -> Result<()> {
    let (hash, src_lang) = split_target(source)?;
    let view = pool.load_view(hash, src_lang, None)?;

    let mut name_mapping = view.name_mapping.clone();
    for rename in renames {
        let (canonical, new_name) = rename
            .split_once('=')
            .with_context(|| format!("expected CANON=NAME, got {rename:?}"))?;
        let id: fnpool::CanonicalId = canonical
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        if !name_mapping.contains_key(&id) {
            bail!("canonical identifier {id} does not occur in this function");
        }
        name_mapping.insert(id, new_name.to_string());
    }

    let mapping = Mapping::new(
        docstring.unwrap_or(view.docstring),
        name_mapping,
        view.alias_mapping,
        comment,
    );
    let mapping_hash = pool
        .save_mapping_v1(hash, dst_lang, &mapping)
        .with_context(|| format!("writing mapping for {hash}@{dst_lang}"))?;
    print_success(&format!("Mapping saved: {hash}@{dst_lang}"));
    print_info(&format!("Mapping: {mapping_hash}"));
    Ok(())
}

fn migrate_command(pool: &Pool, hash: Option<&str>, options: MigrateOptions) -> Result<()> {
    match hash {
        Some(hash) => {
            let outcome = pool.migrate_v0_to_v1(hash, options)?;
            if outcome.performed {
                print_success(&format!(
                    "Migrated {hash} ({} languages)",
                    outcome.languages.len()
                ));
            } else {
                print_info(&format!(
                    "Would migrate {hash} ({} languages)",
                    outcome.languages.len()
                ));
            }
        }
        None => {
            let summary = pool.migrate_all(options)?;
            print_info(&format!("Migrated: {}", summary.migrated));
            print_info(&format!("Skipped:  {}", summary.skipped));
            print_info(&format!("Failed:   {}", summary.failed));
            for (hash, reason) in &summary.failures {
                print_error(&format!("{hash}: {reason}"));
            }
            if summary.failed > 0 {
                bail!("{} records failed to migrate", summary.failed);
            }
        }
    }
    Ok(())
}

fn validate_command(pool: &Pool, hash: Option<&str>, all: bool) -> Result<()> {
    match hash {
        Some(hash) if !all => {
            let report = pool
                .validate(hash)
                .with_context(|| format!("function {hash} is invalid"))?;
            print_success(&format!(
                "Function {hash} is valid ({} languages, {} mappings)",
                report.languages.len(),
                report.mapping_count
            ));
        }
        _ => {
            let summary = pool.validate_all()?;
            print_info("Pool Validation");
            print_info(&format!("Functions total:   {}", summary.total));
            print_info(&format!("Functions valid:   {}", summary.valid));
            print_info(&format!("Functions invalid: {}", summary.invalid));
            print_info(&format!("Languages found:   {}", summary.languages.len()));
            print_info(&format!("Missing deps:      {}", summary.missing_dependencies));
            for (hash, reason) in &summary.failures {
                print_error(&format!("{hash}: {reason}"));
            }
            if summary.is_valid() {
                print_success("Pool is valid");
            } else {
                bail!("{} functions are invalid", summary.invalid);
            }
        }
    }
    Ok(())
}
