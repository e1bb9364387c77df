//! CLI surface: a single binary, one primary subcommand.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "lakebatch", about = "Metadata-driven bronze/silver/gold lakehouse batch orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a process to completion: Bronze, then Silver, then Gold.
    Run {
        /// Process to run, as recorded on dataset_master/acquisition_detail.
        #[arg(long, env = "PROCESS_ID")]
        process_id: i64,

        /// Environment tag, prepended to bucket names. Overrides `env`.
        #[arg(long)]
        env: Option<String>,

        /// Upper bound on the Stage Coordinator's worker pool. Overrides `max_threads`.
        #[arg(long)]
        max_threads: Option<usize>,

        /// Raise the console sink to match the file sink's level.
        #[arg(short = 'v', long)]
        verbose: bool,
    },
}
