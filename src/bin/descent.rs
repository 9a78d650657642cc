//! descent - descendant closure CLI
//!
//! Usage:
//!   descent closure -p <corpus> -d <seeds.txt> -o <out.txt> [-w N] [-m N]
//!   descent dump <shard> [-n N]
//!
//! Logs go to stderr (`RUST_LOG` overrides the level); stdout carries the
//! run summary or dumped records.

use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use descent::closure::{run_closure, ClosureOutcome, Termination};
use descent::config::{CliArgs, ClosureArgs, ClosureConfig, Command};
use descent::corpus::{decode_shard, ShardRef};
use descent::resource::ResourceManager;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose)?;

    match args.command {
        Command::Closure(closure_args) => closure(closure_args),
        Command::Dump { shard, records } => dump(&shard, records),
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

fn closure(args: ClosureArgs) -> Result<()> {
    let profile = ResourceManager::auto_tune();
    if profile.is_memory_constrained() {
        warn!(
            pressure = profile.memory_pressure,
            "High memory pressure at start; the descendant set is held in memory"
        );
    }

    let config = ClosureConfig::from_args(args, &profile).context("Invalid configuration")?;
    let output = config.output.clone();

    let outcome = run_closure(config).context("Closure failed")?;
    print_summary(&outcome, &output);
    Ok(())
}

fn print_summary(outcome: &ClosureOutcome, output: &Path) {
    let status = match outcome.termination {
        Termination::Converged => "converged",
        Termination::Capped => "capped (incomplete, re-run with the output as seeds)",
    };

    println!();
    println!("Closure {}", status);
    println!("  Passes:        {}", outcome.pass_count());
    println!("  Seeds:         {}", outcome.seed_count);
    println!("  Descendants:   {}", outcome.descendants.len());
    println!("  Failed shards: {}", outcome.shards_failed());
    println!("  Duration:      {:.1}s", outcome.duration.as_secs_f64());
    println!("  Output:        {}", output.display());
}

fn dump(shard: &Path, count: usize) -> Result<()> {
    let records = decode_shard(&ShardRef::new(shard))
        .with_context(|| format!("Failed to decode {}", shard.display()))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for record in records.iter().take(count) {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
