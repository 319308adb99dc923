//! Shared CLI plumbing: logging initialization and output helpers.

use anyhow::Result;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with sane defaults; `verbose` lifts the level to
/// debug. `RUST_LOG` still takes precedence when set.
pub fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Success messages go to stdout.
pub fn print_success(message: &str) {
    println!("{}", message.green());
}

/// Errors go to the error stream; data stays on stdout.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{message}");
}
