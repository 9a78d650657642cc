//! Convergence controller: repeated full passes until fixpoint or cap.
//!
//! ```text
//!   Init ──▶ Scanning ──▶ Check ──┬─▶ Continue ──▶ Scanning
//!                                 ├─▶ Converged ─▶ Done
//!                                 └─▶ Capped ────▶ Done
//! ```
//!
//! A record is only expanded once its id is already in the set, and shards
//! come in no relationship order, so a chain of N hops can need up to N
//! passes to propagate. The set only grows and is bounded by the ids in the
//! corpus plus the seeds, so the loop reaches a fixpoint; the iteration cap
//! bounds runtime on very deep chains.
//!
//! The controller owns the Descendant Set for one run. Workers only ever
//! see an `ExpandHandle`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::closure::pool::ClosurePool;
use crate::closure::set::{DescendantSet, ExpandHandle};
use crate::config::ClosureConfig;
use crate::corpus::ShardEnumerator;
use crate::error::Result;
use crate::ids::{load_seeds, write_ids};
use crate::metrics::{PassReport, PassStats};

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Scanning,
    Check,
    Continue,
    Converged,
    Capped,
    Done,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A full pass added nothing: exact closure.
    Converged,
    /// The pass cap was hit before a fully listed pass added nothing. The
    /// result is an under-approximation; feed it back as the seed of
    /// another run.
    Capped,
}

/// Result of a closure run.
#[derive(Debug, Clone)]
pub struct ClosureOutcome {
    pub termination: Termination,
    pub passes: Vec<PassReport>,
    pub seed_count: usize,
    /// Final descendant ids, sorted.
    pub descendants: Vec<String>,
    pub duration: Duration,
}

impl ClosureOutcome {
    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Converged
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn shards_failed(&self) -> u64 {
        self.passes.iter().map(|p| p.stats.shards_failed).sum()
    }
}

/// Drives one closure run over a corpus.
pub struct ClosureController {
    config: ClosureConfig,
    enumerator: ShardEnumerator,
    set: Arc<DescendantSet>,
    seed_count: usize,
    phase: Phase,
}

impl ClosureController {
    /// INIT: validate configuration, load seeds and open the corpus.
    ///
    /// Every fatal error of a run surfaces here, before any pass starts.
    pub fn new(config: ClosureConfig) -> Result<Self> {
        config.validate()?;

        let seeds = load_seeds(&config.seeds)?;
        let enumerator = ShardEnumerator::open(&config.corpus)?;

        let controller = Self::with_parts(config, enumerator, seeds);
        info!(
            seeds = controller.seed_count,
            corpus = %controller.enumerator.root().display(),
            kind = ?controller.enumerator.kind(),
            "Closure initialized"
        );
        Ok(controller)
    }

    /// Build from seed ids already in memory; `config.seeds` is not read.
    pub fn from_seeds<I>(config: ClosureConfig, seeds: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        config.validate()?;
        let enumerator = ShardEnumerator::open(&config.corpus)?;
        Ok(Self::with_parts(config, enumerator, seeds))
    }

    fn with_parts<I>(config: ClosureConfig, enumerator: ShardEnumerator, seeds: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let set = DescendantSet::from_seeds(seeds);
        Self {
            config,
            enumerator,
            seed_count: set.len(),
            set: Arc::new(set),
            phase: Phase::Init,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn transition(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "Closure phase");
        self.phase = next;
    }

    /// Run passes until fixpoint or cap.
    pub fn run(mut self) -> Result<ClosureOutcome> {
        let start = Instant::now();
        let pool = ClosurePool::spawn(
            self.config.workers,
            self.config.queue_capacity,
            ExpandHandle::new(Arc::clone(&self.set)),
        )?;

        info!(
            workers = pool.worker_count(),
            max_iterations = self.config.max_iterations,
            "Starting closure passes"
        );

        let mut passes: Vec<PassReport> = Vec::new();
        let termination = loop {
            self.transition(Phase::Scanning);
            let pass = passes.len() + 1;
            let size_before = self.set.len();
            let pass_start = Instant::now();

            // The root was validated at init, so a listing failure now only
            // costs this pass. Such a pass cannot prove a fixpoint.
            let (stats, listed) = match self.enumerator.shards() {
                Ok(shards) => (pool.run_pass(shards)?, true),
                Err(e) => {
                    warn!(pass, error = %e, "Corpus listing failed, pass scanned nothing");
                    let stats = PassStats {
                        shards_failed: 1,
                        ..PassStats::default()
                    };
                    (stats, false)
                }
            };

            self.transition(Phase::Check);
            let report = PassReport {
                pass,
                size_before,
                size_after: self.set.len(),
                stats,
                duration: pass_start.elapsed(),
            };

            info!(
                pass,
                shards = report.stats.shards_total(),
                failed = report.stats.shards_failed,
                records = report.stats.records_scanned,
                added = report.growth(),
                descendants = report.size_after,
                duration_ms = report.duration.as_millis() as u64,
                "Pass complete"
            );

            let grew = report.grew();
            passes.push(report);

            if !grew && listed {
                self.transition(Phase::Converged);
                break Termination::Converged;
            }
            if passes.len() >= self.config.max_iterations {
                self.transition(Phase::Capped);
                break Termination::Capped;
            }
            self.transition(Phase::Continue);
        };

        pool.shutdown()?;
        self.transition(Phase::Done);

        let descendants = match Arc::try_unwrap(self.set) {
            Ok(set) => set.into_sorted_vec(),
            Err(shared) => shared.to_sorted_vec(),
        };

        let outcome = ClosureOutcome {
            termination,
            passes,
            seed_count: self.seed_count,
            descendants,
            duration: start.elapsed(),
        };

        info!(
            termination = ?outcome.termination,
            passes = outcome.pass_count(),
            seeds = outcome.seed_count,
            descendants = outcome.descendants.len(),
            failed_shards = outcome.shards_failed(),
            duration_secs = outcome.duration.as_secs(),
            "Closure finished"
        );

        Ok(outcome)
    }
}

/// Run a closure and write the result file.
///
/// The result is written for both converged and capped runs.
pub fn run_closure(config: ClosureConfig) -> Result<ClosureOutcome> {
    let output = config.output.clone();
    let outcome = ClosureController::new(config)?.run()?;
    write_ids(&output, &outcome.descendants)?;
    info!(path = %output.display(), ids = outcome.descendants.len(), "Result written");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{write_shard, EntityRecord};
    use crate::error::ClosureError;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(dir: &Path, workers: usize) -> ClosureConfig {
        ClosureConfig::new(dir.join("corpus"), dir.join("seeds.txt"), dir.join("out.txt"))
            .with_workers(workers)
            .with_queue_capacity(2)
    }

    fn write_corpus(dir: &Path, shards: &[&[EntityRecord]]) {
        let corpus = dir.join("corpus");
        fs::create_dir_all(&corpus).unwrap();
        for (i, records) in shards.iter().enumerate() {
            write_shard(&corpus.join(format!("part-{i:03}.pb")), records).unwrap();
        }
    }

    #[test]
    fn test_new_controller_starts_in_init() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), &[&[EntityRecord::new("A", ["B"])]]);
        fs::write(dir.path().join("seeds.txt"), "A\nA\n").unwrap();

        let controller = ClosureController::new(config(dir.path(), 1)).unwrap();
        assert_eq!(controller.phase(), Phase::Init);
        assert_eq!(controller.seed_count, 1);
    }

    #[test]
    fn test_two_node_cycle_converges() {
        let dir = TempDir::new().unwrap();
        write_corpus(
            dir.path(),
            &[&[EntityRecord::new("A", ["B"])], &[EntityRecord::new("B", ["A"])]],
        );

        let controller =
            ClosureController::from_seeds(config(dir.path(), 2), ["A".to_string()]).unwrap();
        let outcome = controller.run().unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.descendants, vec!["A", "B"]);
        assert!(outcome.pass_count() <= 3);
    }

    #[test]
    fn test_cap_stops_growing_chain() {
        let dir = TempDir::new().unwrap();
        // Reverse order inside one shard forces one hop per pass.
        let chain: Vec<EntityRecord> = (0..10)
            .rev()
            .map(|i| EntityRecord::new(format!("n{i}"), [format!("n{}", i + 1)]))
            .collect();
        write_corpus(dir.path(), &[chain.as_slice()]);

        let controller = ClosureController::from_seeds(
            config(dir.path(), 1).with_max_iterations(3),
            ["n0".to_string()],
        )
        .unwrap();
        let outcome = controller.run().unwrap();

        assert_eq!(outcome.termination, Termination::Capped);
        assert_eq!(outcome.pass_count(), 3);
        assert_eq!(outcome.descendants, vec!["n0", "n1", "n2", "n3"]);
        for pass in &outcome.passes {
            assert!(pass.size_after >= pass.size_before);
        }
    }

    #[test]
    fn test_empty_seed_converges_after_one_pass() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), &[&[EntityRecord::new("A", ["B"])]]);

        let controller =
            ClosureController::from_seeds(config(dir.path(), 1), Vec::<String>::new()).unwrap();
        let outcome = controller.run().unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.pass_count(), 1);
        assert!(outcome.descendants.is_empty());
    }

    #[test]
    fn test_missing_seed_file_fails_before_any_pass() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), &[&[]]);

        let err = ClosureController::new(config(dir.path(), 1)).err().unwrap();
        assert!(matches!(err, ClosureError::SeedFile { .. }));
    }

    #[test]
    fn test_missing_corpus_fails_before_any_pass() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("seeds.txt"), "A\n").unwrap();

        let err = ClosureController::new(config(dir.path(), 1)).err().unwrap();
        assert!(matches!(err, ClosureError::Corpus { .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), &[&[]]);
        let err = ClosureController::from_seeds(
            config(dir.path(), 1).with_max_iterations(0),
            ["A".to_string()],
        )
        .err()
        .unwrap();
        assert!(matches!(err, ClosureError::Config(_)));
    }

    #[test]
    fn test_corpus_lost_after_init_ends_capped_with_seeds() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), &[&[EntityRecord::new("A", ["B"])]]);
        fs::write(dir.path().join("seeds.txt"), "A\n").unwrap();

        let controller =
            ClosureController::new(config(dir.path(), 2).with_max_iterations(2)).unwrap();
        fs::remove_dir_all(dir.path().join("corpus")).unwrap();
        let outcome = controller.run().unwrap();

        assert_eq!(outcome.termination, Termination::Capped);
        assert_eq!(outcome.pass_count(), 2);
        assert_eq!(outcome.shards_failed(), 2);
        assert_eq!(outcome.descendants, vec!["A"]);
    }

    #[test]
    fn test_run_closure_writes_output() {
        let dir = TempDir::new().unwrap();
        write_corpus(
            dir.path(),
            &[&[EntityRecord::new("A", ["B"]), EntityRecord::new("Z", ["Y"])]],
        );
        fs::write(dir.path().join("seeds.txt"), "A\n").unwrap();

        let outcome = run_closure(config(dir.path(), 2)).unwrap();
        assert!(outcome.is_complete());
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "A\nB\n");
    }
}
