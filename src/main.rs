use std::collections::HashMap;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use reward_engine::model::journal::{JournalEntry, JournalKind};
use reward_engine::scenario;
use reward_engine::store::{SqliteStore, Store};

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = cli::Cli::parse();
    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        cli::Command::Schema => print_schema(),
        cli::Command::Simulate { file } => rt.block_on(run_simulate(&file)),
        cli::Command::Replay { file } => rt.block_on(run_replay(&file)),
        cli::Command::Snapshot { file, user_id } => rt.block_on(run_snapshot(&file, &user_id)),
    }
}

fn print_schema() -> Result<()> {
    let schema = schemars::schema_for!(reward_engine::model::command::Command);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

async fn run_simulate(file: &std::path::Path) -> Result<()> {
    let report = scenario::run_file(file).await.context("running scenario")?;

    for (idx, err) in &report.step_errors {
        tracing::warn!(step = idx, error = %err, "scenario step failed");
    }

    for (user_id, snapshot) in &report.snapshots {
        println!(
            "{user_id}: lifetime_mined={} liquid={} xp={} rp={} session={:?}",
            snapshot.user.lifetime_mined,
            snapshot.user.liquid_balance,
            snapshot.user.cumulative_xp,
            snapshot.user.cumulative_rp,
            snapshot.session.as_ref().map(|s| s.state),
        );
    }
    Ok(())
}

/// Per-user rollup derived purely by folding over the durable journal,
/// without needing a live `Engine`/`Ledger` instance (spec §6
/// "replay(journal.db)").
#[derive(Debug, Default)]
struct JournalRollup {
    xp_gained: u64,
    fin_settled_units: u64,
    sessions_opened: u64,
    sessions_settled: u64,
}

fn fold_journal(entries: &[JournalEntry]) -> HashMap<String, JournalRollup> {
    let mut rollups: HashMap<String, JournalRollup> = HashMap::new();
    for entry in entries {
        let rollup = rollups.entry(entry.user_id.clone()).or_default();
        match entry.kind {
            JournalKind::XpAwarded => {
                if let Some(gained) = entry.payload.get("xp_gained").and_then(|v| v.as_u64()) {
                    rollup.xp_gained += gained;
                }
            }
            JournalKind::SessionOpened => rollup.sessions_opened += 1,
            JournalKind::SessionSettled => {
                rollup.sessions_settled += 1;
                if let Some(amount) = entry.payload.get("amount").and_then(|v| v.as_u64()) {
                    rollup.fin_settled_units += amount;
                }
            }
            _ => {}
        }
    }
    rollups
}

async fn run_replay(file: &std::path::Path) -> Result<()> {
    let store = SqliteStore::open(file).context("opening journal database")?;
    let entries = store.load_all().await.context("loading journal entries")?;
    let rollups = fold_journal(&entries);

    println!("replayed {} journal entries across {} users", entries.len(), rollups.len());
    for (user_id, rollup) in rollups {
        println!(
            "{user_id}: xp_gained={} fin_settled_units={} sessions_opened={} sessions_settled={}",
            rollup.xp_gained, rollup.fin_settled_units, rollup.sessions_opened, rollup.sessions_settled
        );
    }
    Ok(())
}

async fn run_snapshot(file: &std::path::Path, user_id: &str) -> Result<()> {
    let store = SqliteStore::open(file).context("opening journal database")?;
    let entries = store.load_all().await.context("loading journal entries")?;
    let rollups = fold_journal(&entries);

    match rollups.get(user_id) {
        Some(rollup) => {
            println!("{user_id}: {rollup:?}");
            Ok(())
        }
        None => anyhow::bail!("no journal entries found for user '{user_id}'"),
    }
}
