//! Configuration types for descent
//!
//! - CLI argument parsing using clap derive macros
//! - `ClosureConfig`: validated settings for one closure run

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::warn;

use crate::error::ConfigError;
use crate::resource::{available_parallelism, queue_capacity_for, TuningProfile};

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Default cap on closure passes
pub const DEFAULT_MAX_ITERATIONS: usize = 64;

/// Default number of records printed by `dump`
const DEFAULT_DUMP_RECORDS: usize = 10;

/// Descendant closure over a sharded relationship graph
#[derive(Parser, Debug, Clone)]
#[command(
    name = "descent",
    version,
    about = "Compute the descendant closure of a seed id list over a sharded graph",
    after_help = "EXAMPLES:\n    \
        descent closure -p /data/persons -d seeds.txt -o descendants.txt\n    \
        descent closure -p /data/persons -d seeds.txt -o out.txt -w 16 -m 200\n    \
        descent dump /data/persons/part-00042.pb.gz -n 5"
)]
pub struct CliArgs {
    /// Verbose output (debug-level logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compute the descendant closure and write it as an id list
    Closure(ClosureArgs),

    /// Print the first records of one shard as JSON lines
    Dump {
        /// Shard file (.gz is decompressed transparently)
        #[arg(value_name = "SHARD")]
        shard: PathBuf,

        /// Number of records to print
        #[arg(short = 'n', long, default_value_t = DEFAULT_DUMP_RECORDS, value_name = "NUM")]
        records: usize,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ClosureArgs {
    /// Corpus: a shard file or a directory of shard files
    #[arg(short = 'p', long, value_name = "PATH")]
    pub corpus: PathBuf,

    /// Seed id file, one id per line
    #[arg(short = 'd', long, value_name = "FILE")]
    pub seeds: PathBuf,

    /// Output id file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: PathBuf,

    /// Worker threads (defaults to the number of logical CPUs)
    #[arg(short = 'w', long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Maximum number of full passes before stopping with a partial result
    #[arg(short = 'm', long, default_value_t = DEFAULT_MAX_ITERATIONS, value_name = "NUM")]
    pub max_iterations: usize,

    /// Shard references buffered in the job queue
    #[arg(long, value_name = "NUM")]
    pub queue_size: Option<usize>,
}

/// Validated settings for one closure run.
#[derive(Debug, Clone)]
pub struct ClosureConfig {
    pub corpus: PathBuf,
    pub seeds: PathBuf,
    pub output: PathBuf,
    pub workers: usize,
    pub max_iterations: usize,
    pub queue_capacity: usize,
}

impl ClosureConfig {
    /// Config with defaults sized for this host.
    pub fn new(
        corpus: impl Into<PathBuf>,
        seeds: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        let workers = available_parallelism();
        Self {
            corpus: corpus.into(),
            seeds: seeds.into(),
            output: output.into(),
            workers,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            queue_capacity: queue_capacity_for(workers),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Build from CLI arguments, filling gaps from the tuning profile.
    ///
    /// A worker count above the host's parallelism is clamped down to it.
    pub fn from_args(args: ClosureArgs, profile: &TuningProfile) -> Result<Self, ConfigError> {
        let mut workers = args.workers.unwrap_or(profile.workers);
        if workers == 0 || workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: workers,
                max: MAX_WORKERS,
            });
        }
        if workers > profile.max_parallelism {
            warn!(
                requested = workers,
                available = profile.max_parallelism,
                "Worker count exceeds available parallelism, clamping"
            );
            workers = profile.max_parallelism;
        }

        let config = Self {
            corpus: args.corpus,
            seeds: args.seeds,
            output: args.output,
            workers,
            max_iterations: args.max_iterations,
            queue_capacity: args.queue_size.unwrap_or_else(|| {
                if workers == profile.workers {
                    profile.queue_capacity
                } else {
                    queue_capacity_for(workers)
                }
            }),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.workers,
                max: MAX_WORKERS,
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueSize {
                size: self.queue_capacity,
                min: 1,
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidIterationCap {
                cap: self.max_iterations,
            });
        }
        Ok(())
    }
}
