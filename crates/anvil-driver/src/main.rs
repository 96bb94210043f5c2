//! The `anvil` command-line driver (§6): wires the graph, cache,
//! scheduler, handler and worker-pool crates together behind four
//! subcommands (`build`, `cache-stat`, `coordinator`, `worker`).
// The CLI is expected to print to stdout/stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod build;
mod build_executor;
mod cli;
mod coordinator_cmd;
mod worker_cmd;
mod workspace_load;

use clap::Parser;
use cli::{Cli, Commands};
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Build {
            workspace,
            targets,
            fail_fast,
        } => run_build(&workspace, &targets, fail_fast).await,
        Commands::CacheStat { cache_dir, max_bytes } => run_cache_stat(&cache_dir, max_bytes),
        Commands::Coordinator { listen, reapi } => {
            coordinator_cmd::run(&listen, reapi).await?;
            0
        }
        Commands::Worker {
            coordinator,
            min_workers,
            max_workers,
        } => {
            worker_cmd::run(&coordinator, min_workers, max_workers).await?;
            0
        }
    };

    std::process::exit(exit_code);
}

async fn run_build(workspace: &std::path::Path, targets: &[String], fail_fast: bool) -> i32 {
    match build::run(workspace, targets, fail_fast).await {
        Ok(report) => {
            println!(
                "{} targets built, {} cache hits, {} cache misses",
                report.targets.len(),
                report.cache_hits(),
                report.cache_misses()
            );
            for target in &report.targets {
                let status = if target.succeeded { "ok" } else { "FAILED" };
                println!("  {} [{}] {:?}", target.target, status, target.duration);
            }
            report.exit_code()
        }
        Err(err) => {
            error!(%err, "build failed");
            1
        }
    }
}

fn run_cache_stat(cache_dir: &std::path::Path, max_bytes: Option<u64>) -> i32 {
    match anvil_cache::ActionCache::open(cache_dir, anvil_crypto::hash(b"anvil-cache-stat"), max_bytes, None) {
        Ok(cache) => match cache.evict() {
            Ok(evicted) => {
                println!("evicted {evicted} entries over budget");
                0
            }
            Err(err) => {
                error!(%err, "eviction failed");
                1
            }
        },
        Err(err) => {
            error!(%err, "could not open cache");
            1
        }
    }
}
