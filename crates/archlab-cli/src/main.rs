//! Archlab CLI - terminal client for the relevance experiment.
//!
//! # Usage
//!
//! ```bash
//! # Fetch and show the task assignment
//! archlab tasks --participant M123
//! archlab tasks --participant M123 --json
//!
//! # Run an interactive question session (search, rate, submit)
//! archlab run --participant M123
//! archlab run --participant M123 --task T1 --question Q1
//!
//! # Show help
//! archlab --help
//! ```

mod config;
mod output;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Archlab experiment client.
///
/// Fetches a participant's task assignment, runs searches against the issue
/// corpus, and submits relevance ratings.
#[derive(Parser)]
#[command(name = "archlab", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Custom data directory (default: platform standard location)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and display the task assignment for a participant
    Tasks {
        /// Matriculation number identifying the participant
        #[arg(long)]
        participant: String,

        /// Output the assignment as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run an interactive question session: search, rate, submit
    Run {
        /// Matriculation number identifying the participant
        #[arg(long)]
        participant: String,

        /// Task to open (prompted when omitted)
        #[arg(long)]
        task: Option<String>,

        /// Question to open (prompted when omitted)
        #[arg(long)]
        question: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Tasks { participant, json } => {
            run::fetch_and_show_tasks(&participant, json, cli.data_dir.as_ref()).await
        }
        Command::Run {
            participant,
            task,
            question,
        } => run::run_question_session(&participant, task, question, cli.data_dir.as_ref()).await,
    }
}
