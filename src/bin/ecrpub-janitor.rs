//! Out-of-band sweep for orphaned ECR Public test repositories.
//!
//! Deletes every repository whose name starts with the test prefix and then
//! verifies none remain. Run it after interrupted test runs or whenever a
//! teardown ends with a manual cleanup report.

use std::io::Write as _;

use clap::Parser;
use ecrpub_fixtures::janitor::{Janitor, JanitorConfig};
use tracing_subscriber::EnvFilter;

#[path = "../cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config =
        JanitorConfig::new(cli.region, cli.prefix, cli.aws_bin).map_err(|err| err.to_string())?;
    let janitor = Janitor::with_process_runner(config);
    let mut stdout = std::io::stdout();

    if cli.dry_run {
        let targets = janitor.plan().map_err(|err| err.to_string())?;
        for name in &targets {
            writeln!(stdout, "{name}").map_err(|err| err.to_string())?;
        }
        writeln!(stdout, "dry run: {} repositories would be deleted", targets.len())
            .map_err(|err| err.to_string())?;
        return Ok(());
    }

    let summary = janitor.sweep().map_err(|err| err.to_string())?;
    writeln!(
        stdout,
        "janitor sweep complete: deleted_repositories={}",
        summary.deleted.len()
    )
    .map_err(|err| err.to_string())?;
    Ok(())
}
