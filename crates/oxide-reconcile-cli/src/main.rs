//! oxide-reconcile CLI
//!
//! Compiles a JSON schema declaration into a MySQL reconciliation script.

mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_reconcile::prelude::*;

/// Compiles declarative MySQL schemas into idempotent reconciliation scripts.
#[derive(Parser)]
#[command(name = "oxide-reconcile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Declaration document (JSON).
    declaration: PathBuf,

    /// Target database; overrides the document's `database`.
    #[arg(short, long, env = "RECONCILE_DATABASE")]
    database: Option<String>,

    /// Surface every computed statement as a result row.
    #[arg(long)]
    report: bool,

    /// Compute statements without executing them.
    #[arg(long)]
    dry_run: bool,

    /// Write the script to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the script.
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let declaration = config::load_declaration(&cli.declaration)?;
    let database = config::resolve_database(cli.database.as_deref(), &declaration)?;
    let options = CompileOptions::new()
        .report(cli.report)
        .dry_run(cli.dry_run);

    let plan = plan(&database, &declaration.tables, &declaration.clients)?;
    let script = plan.render(options);
    config::write_script(cli.output.as_deref(), &script)?;

    info!(
        database = %database,
        steps = plan.steps().len(),
        report = cli.report,
        dry_run = cli.dry_run,
        "Reconciliation script written"
    );
    Ok(())
}
