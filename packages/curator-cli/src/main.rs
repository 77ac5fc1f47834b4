//! Batch driver for the curation pipeline.
//!
//! Talks to the staging database directly: preview promotion with
//! `analyze`, commit it with `promote`, inspect staging with `stats`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use curation::promotion::{ItemOutcome, PlannedAction, Promoter};
use curation::traits::store::{CanonicalStore, StagingStore};
use curation::{FindingStatus, SqliteStore};

#[derive(Parser)]
#[command(name = "curator", about = "Documentation curation batch tools", version)]
struct Cli {
    /// SQLite database URL (e.g. sqlite:curator.db?mode=rwc)
    #[arg(long, env = "CURATOR_DB", default_value = "sqlite:curator.db?mode=rwc")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dry-run promotion: classify accepted findings without writing
    Analyze,
    /// Promote accepted findings into the canonical graph
    Promote,
    /// Show staging counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let store = Arc::new(
        SqliteStore::new(&cli.db)
            .await
            .with_context(|| format!("opening {}", cli.db))?,
    );

    match cli.command {
        Commands::Analyze => analyze(store).await,
        Commands::Promote => promote(store).await,
        Commands::Stats => stats(store).await,
    }
}

async fn analyze(store: Arc<SqliteStore>) -> Result<()> {
    let report = Promoter::new(store).analyze().await?;

    println!("{}", "Promotion analysis (dry run)".bold());
    println!();
    for item in &report.items {
        let action = match &item.action {
            PlannedAction::Skip => "SKIP".dimmed(),
            PlannedAction::Merge { entity_id, basis } => {
                format!("MERGE -> {entity_id} ({basis:?})").yellow()
            }
            PlannedAction::Create {
                cross_ecosystem_matches: 0,
            } => "CREATE".green(),
            PlannedAction::Create {
                cross_ecosystem_matches,
            } => format!("CREATE (+{cross_ecosystem_matches} cross-ecosystem hint(s))").green(),
        };
        println!(
            "  {} {} [{}] {}",
            item.finding_id,
            item.candidate_key.bold(),
            item.ecosystem,
            action
        );
    }
    println!();
    println!(
        "{} to merge, {} to create, {} total",
        report.merges().to_string().yellow(),
        report.creates().to_string().green(),
        report.items.len()
    );
    println!("Run {} to apply.", "curator promote".bold());
    Ok(())
}

async fn promote(store: Arc<SqliteStore>) -> Result<()> {
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "interrupt received, stopping after current item".red());
            signal_cancel.cancel();
        }
    });

    let report = Promoter::new(store).promote(&cancel).await?;

    println!("{}", "Promotion".bold());
    println!();
    for item in &report.items {
        let outcome = match &item.action {
            ItemOutcome::Skipped => "skipped".dimmed(),
            ItemOutcome::Merged { entity_id, basis } => {
                format!("merged -> {entity_id} ({basis:?})").yellow()
            }
            ItemOutcome::Created {
                entity_id,
                equivalence_candidates,
            } => {
                if *equivalence_candidates > 0 {
                    format!("created {entity_id} (+{equivalence_candidates} equivalence candidate(s))")
                        .green()
                } else {
                    format!("created {entity_id}").green()
                }
            }
            ItemOutcome::Failed { error } => format!("FAILED: {error}").red().bold(),
        };
        println!(
            "  {} {} [{}] {}",
            item.finding_id,
            item.candidate_key.bold(),
            item.ecosystem,
            outcome
        );
    }
    println!();
    println!(
        "{} merged, {} created, {} skipped, {} failed",
        report.merged().to_string().yellow(),
        report.created().to_string().green(),
        report.skipped(),
        report.failed().to_string().red()
    );
    if report.cancelled {
        println!("{}", "batch cancelled before completion".red());
    }
    Ok(())
}

async fn stats(store: Arc<SqliteStore>) -> Result<()> {
    println!("{}", "Staging".bold());
    for status in [
        FindingStatus::Pending,
        FindingStatus::Accepted,
        FindingStatus::NeedsContext,
        FindingStatus::Rejected,
        FindingStatus::Merged,
    ] {
        let count = store.findings_by_status(status).await?.len();
        println!("  {:>14}: {count}", status.as_str());
    }

    let unpromoted = store.unpromoted_accepted().await?.len();
    println!("  {:>14}: {unpromoted}", "unpromoted");

    let equivalences = store.equivalence_candidates().await?.len();
    println!();
    println!("{}", "Canonical".bold());
    println!("  {:>14}: {equivalences}", "equiv. hints");
    Ok(())
}
