//! Fixed-size worker pool for closure passes.
//!
//! ```text
//!   controller ──ShardRef──▶ [bounded job queue] ──▶ worker 0..W
//!        ▲                                              │ decode + expand
//!        └──────────── ShardOutcome (unbounded) ◀───────┘
//! ```
//!
//! Workers live for the whole run. `run_pass` feeds one pass worth of shard
//! references into the job queue (blocking when it is full) and then waits
//! until it has received one outcome per dispatched shard. That count is the
//! pass barrier: when `run_pass` returns, no shard of the pass is still in
//! flight, and the next pass cannot start before it.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::closure::set::ExpandHandle;
use crate::corpus::{ShardDecoder, ShardRef};
use crate::error::{ClosureError, Result, ShardError};
use crate::metrics::{PassCounters, PassStats};

/// Progress is logged every this many completed shards.
const PROGRESS_INTERVAL: u64 = 1000;

/// What a worker reports back for one shard.
#[derive(Debug)]
pub enum ShardOutcome {
    Done { records: u64, added: u64 },
    Failed(ShardError),
}

pub struct ClosurePool {
    job_tx: Option<Sender<ShardRef>>,
    done_rx: Receiver<ShardOutcome>,
    workers: Vec<JoinHandle<()>>,
    counters: PassCounters,
}

impl ClosurePool {
    /// Spawn `workers` threads sharing a job queue of `queue_capacity` slots.
    pub fn spawn(workers: usize, queue_capacity: usize, expander: ExpandHandle) -> Result<Self> {
        let (job_tx, job_rx) = bounded::<ShardRef>(queue_capacity.max(1));
        let (done_tx, done_rx) = unbounded::<ShardOutcome>();

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers.max(1) {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let expander = expander.clone();

            let handle = thread::Builder::new()
                .name(format!("closure-worker-{id}"))
                .spawn(move || worker_loop(job_rx, done_tx, expander))?;
            handles.push(handle);
        }

        debug!(workers = handles.len(), queue_capacity, "Closure workers spawned");

        Ok(Self {
            job_tx: Some(job_tx),
            done_rx,
            workers: handles,
            counters: PassCounters::new(),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run one full pass over `shards` and block until every shard is done.
    ///
    /// Entries the enumerator could not read count as failed shards.
    pub fn run_pass<I>(&self, shards: I) -> Result<PassStats>
    where
        I: IntoIterator<Item = io::Result<ShardRef>>,
    {
        let job_tx = self.job_tx.as_ref().ok_or(ClosureError::PoolDisconnected)?;
        let mut dispatched: u64 = 0;
        let mut completed: u64 = 0;

        for item in shards {
            match item {
                Ok(shard) => {
                    job_tx
                        .send(shard)
                        .map_err(|_| ClosureError::PoolDisconnected)?;
                    dispatched += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable corpus entry");
                    self.counters.record_failure();
                }
            }

            for outcome in self.done_rx.try_iter() {
                completed += 1;
                self.observe(outcome, completed);
            }
        }

        while completed < dispatched {
            let outcome = self
                .done_rx
                .recv()
                .map_err(|_| ClosureError::PoolDisconnected)?;
            completed += 1;
            self.observe(outcome, completed);
        }

        Ok(self.counters.take())
    }

    fn observe(&self, outcome: ShardOutcome, completed: u64) {
        match outcome {
            ShardOutcome::Done { records, added } => self.counters.record_shard(records, added),
            ShardOutcome::Failed(err) => {
                warn!(
                    shard = %err.path().display(),
                    compression = err.is_compression(),
                    error = %err,
                    "Shard skipped for this pass"
                );
                self.counters.record_failure();
            }
        }
        if completed % PROGRESS_INTERVAL == 0 {
            debug!(shards = completed, "Pass progress");
        }
    }

    /// Close the job queue and join every worker.
    pub fn shutdown(mut self) -> Result<()> {
        self.join_all()
    }

    fn join_all(&mut self) -> Result<()> {
        drop(self.job_tx.take());

        let mut first_err = None;
        for (id, handle) in self.workers.drain(..).enumerate() {
            if handle.join().is_err() && first_err.is_none() {
                first_err = Some(ClosureError::WorkerPanicked { id });
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for ClosurePool {
    fn drop(&mut self) {
        if let Err(e) = self.join_all() {
            warn!(error = %e, "Worker pool shut down uncleanly");
        }
    }
}

fn worker_loop(job_rx: Receiver<ShardRef>, done_tx: Sender<ShardOutcome>, expander: ExpandHandle) {
    let mut decoder = ShardDecoder::new();

    for shard in job_rx {
        let outcome = handle_shard(&mut decoder, shard, |decoder, shard| {
            process_shard(decoder, shard, &expander)
        });
        if done_tx.send(outcome).is_err() {
            break;
        }
    }
}

/// Run `process` for one shard, turning a panic into a failed shard.
///
/// A panic may leave the decoder mid-read, so it is replaced.
fn handle_shard<F>(decoder: &mut ShardDecoder, shard: ShardRef, process: F) -> ShardOutcome
where
    F: FnOnce(&mut ShardDecoder, &ShardRef) -> std::result::Result<(u64, u64), ShardError>,
{
    let processed = panic::catch_unwind(AssertUnwindSafe(|| process(&mut *decoder, &shard)));

    match processed {
        Ok(Ok((records, added))) => ShardOutcome::Done { records, added },
        Ok(Err(err)) => ShardOutcome::Failed(err),
        Err(_) => {
            *decoder = ShardDecoder::new();
            ShardOutcome::Failed(ShardError::Panicked { path: shard.path })
        }
    }
}

fn process_shard(
    decoder: &mut ShardDecoder,
    shard: &ShardRef,
    expander: &ExpandHandle,
) -> std::result::Result<(u64, u64), ShardError> {
    let records = decoder.decode(shard)?;
    let count = records.len() as u64;
    let added: usize = records.into_iter().map(|r| expander.expand(r)).sum();
    debug!(shard = %shard.path.display(), records = count, added, "Shard processed");
    Ok((count, added as u64))
}
