use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reward engine — computes FIN mining accrual, XP, and RP deterministically
/// from a replayable command journal.
#[derive(Parser)]
#[command(name = "reward-enginectl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Output the JSON schema for the command/event surface
    Schema,

    /// Replay a scenario file (a fixed command timeline) and print the
    /// resulting per-user snapshots
    Simulate {
        /// Path to the scenario JSON file
        file: PathBuf,
    },

    /// Replay a durable journal database and print the final per-user
    /// snapshot reconstructed from it
    Replay {
        /// Path to the sqlite journal database
        file: PathBuf,
    },

    /// Print a single user's current snapshot from a running journal
    Snapshot {
        /// Path to the sqlite journal database
        file: PathBuf,

        /// User id to report
        user_id: String,
    },
}
