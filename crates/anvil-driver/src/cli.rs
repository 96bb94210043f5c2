//! The `anvil` command-line surface (§6).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Polyglot build system driver.
#[derive(Parser, Debug)]
#[command(name = "anvil", author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build some or all targets in a workspace.
    Build {
        /// Path to the workspace config JSON file (the shape external
        /// parsers are expected to emit, per §6).
        #[arg(long, default_value = "anvil-workspace.json")]
        workspace: PathBuf,
        /// Restrict the build to these target ids and their transitive
        /// dependencies. Empty means "build everything".
        #[arg(long = "target")]
        targets: Vec<String>,
        /// Stop dispatching new work after the first non-retryable
        /// failure, rather than continuing unaffected branches.
        #[arg(long)]
        fail_fast: bool,
    },
    /// Print action cache occupancy and run LRU eviction.
    CacheStat {
        /// Path to the cache directory.
        #[arg(long, default_value = ".anvil-cache")]
        cache_dir: PathBuf,
        /// Evict entries if the store is over this byte budget.
        #[arg(long)]
        max_bytes: Option<u64>,
    },
    /// Run the distributed coordinator daemon.
    Coordinator {
        /// Address to listen on.
        #[arg(long, default_value = "0.0.0.0:7420")]
        listen: String,
        /// Enable the REAPI façade.
        #[arg(long)]
        reapi: bool,
    },
    /// Run a worker pool that connects out to a coordinator.
    Worker {
        /// Coordinator address to connect to.
        #[arg(long)]
        coordinator: String,
        /// Minimum number of provisioned workers.
        #[arg(long, default_value_t = 0)]
        min_workers: usize,
        /// Maximum number of provisioned workers.
        #[arg(long)]
        max_workers: Option<usize>,
    },
}
