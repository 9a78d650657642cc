//! Host resource detection and closure tuning.
//!
//! Detects available RAM and CPU cores, then derives the default worker
//! count and job queue capacity. Stateless: each call to
//! `ResourceManager::auto_tune()` re-probes the system.

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

// ── Constants ───────────────────────────────────────────────────────

/// Job queue slots per worker.
const QUEUE_SLOTS_PER_WORKER: usize = 64;

/// Queue capacity floor.
const QUEUE_MIN: usize = 256;

/// Queue capacity ceiling.
const QUEUE_MAX: usize = 65_536;

/// Memory pressure above which a run start is logged as risky.
pub const HIGH_MEMORY_PRESSURE: f64 = 0.9;

// ── SystemResources ─────────────────────────────────────────────────

/// Snapshot of detected hardware resources.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total physical RAM in bytes.
    pub total_memory_bytes: u64,
    /// Available (re-usable) RAM in bytes.
    pub available_memory_bytes: u64,
    /// Logical CPU count.
    pub cpu_count: usize,
}

impl SystemResources {
    /// Probe the current system for RAM and CPU information.
    pub fn detect() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();

        Self {
            total_memory_bytes: sys.total_memory(),
            available_memory_bytes: sys.available_memory(),
            cpu_count: available_parallelism(),
        }
    }

    /// Memory pressure indicator (0.0 = no pressure, 1.0 = critical).
    ///
    /// Formula: `1.0 - (available / total)`.
    pub fn memory_pressure(&self) -> f64 {
        if self.total_memory_bytes == 0 {
            return 1.0;
        }
        let ratio = self.available_memory_bytes as f64 / self.total_memory_bytes as f64;
        (1.0 - ratio).clamp(0.0, 1.0)
    }
}

/// Logical CPUs usable by this process (at least 1).
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ── TuningProfile ───────────────────────────────────────────────────

/// Defaults computed from system resources.
#[derive(Debug, Clone)]
pub struct TuningProfile {
    /// Worker threads for closure passes.
    pub workers: usize,
    /// Job queue capacity (shard references in flight).
    pub queue_capacity: usize,
    /// Upper bound for a requested worker count.
    pub max_parallelism: usize,
    /// Memory pressure at detection time (0.0 = no pressure, 1.0 = critical).
    pub memory_pressure: f64,
}

impl TuningProfile {
    /// Compute a tuning profile from detected resources.
    ///
    /// - `workers`: one per logical CPU.
    /// - `queue_capacity`: `clamp(workers * 64, 256, 65536)`.
    pub fn from_resources(res: &SystemResources) -> Self {
        let workers = res.cpu_count.max(1);
        Self {
            workers,
            queue_capacity: queue_capacity_for(workers),
            max_parallelism: workers,
            memory_pressure: res.memory_pressure(),
        }
    }

    pub fn is_memory_constrained(&self) -> bool {
        self.memory_pressure > HIGH_MEMORY_PRESSURE
    }
}

/// Default job queue capacity for a worker count.
pub fn queue_capacity_for(workers: usize) -> usize {
    workers
        .saturating_mul(QUEUE_SLOTS_PER_WORKER)
        .clamp(QUEUE_MIN, QUEUE_MAX)
}

// ── ResourceManager ─────────────────────────────────────────────────

/// Stateless utility: detect system resources and compute tuning profile.
pub struct ResourceManager;

impl ResourceManager {
    /// Probe the system and return an adaptive tuning profile.
    pub fn auto_tune() -> TuningProfile {
        let resources = SystemResources::detect();
        TuningProfile::from_resources(&resources)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
