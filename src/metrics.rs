//! Per-pass counters and reports.
//!
//! The pool bumps `PassCounters` with relaxed atomics as shard outcomes come
//! back during a pass and drains them after the pass barrier, when every
//! worker has reported, so the drained values are exact.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters shared by all workers during one pass.
#[derive(Debug, Default)]
pub struct PassCounters {
    shards_ok: AtomicU64,
    shards_failed: AtomicU64,
    records_scanned: AtomicU64,
    ids_added: AtomicU64,
}

impl PassCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_shard(&self, records: u64, added: u64) {
        self.shards_ok.fetch_add(1, Ordering::Relaxed);
        self.records_scanned.fetch_add(records, Ordering::Relaxed);
        self.ids_added.fetch_add(added, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.shards_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the counters and zero them for the next pass.
    pub fn take(&self) -> PassStats {
        PassStats {
            shards_ok: self.shards_ok.swap(0, Ordering::Relaxed),
            shards_failed: self.shards_failed.swap(0, Ordering::Relaxed),
            records_scanned: self.records_scanned.swap(0, Ordering::Relaxed),
            ids_added: self.ids_added.swap(0, Ordering::Relaxed),
        }
    }
}

/// Counter values for one completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub shards_ok: u64,
    pub shards_failed: u64,
    pub records_scanned: u64,
    pub ids_added: u64,
}

impl PassStats {
    pub fn shards_total(&self) -> u64 {
        self.shards_ok + self.shards_failed
    }
}

/// Outcome of one full pass over the corpus.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// 1-based pass number.
    pub pass: usize,
    pub size_before: usize,
    pub size_after: usize,
    pub stats: PassStats,
    pub duration: Duration,
}

impl PassReport {
    pub fn grew(&self) -> bool {
        self.size_after > self.size_before
    }

    pub fn growth(&self) -> usize {
        self.size_after.saturating_sub(self.size_before)
    }
}
