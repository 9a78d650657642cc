//! descent - descendant closure over a sharded relationship graph
//!
//! Computes every id reachable from a seed list by following the child
//! relation, over a corpus of protobuf shard files too large to load at
//! once. The graph may contain cycles.
//!
//! # Architecture
//!
//! ```text
//!   seeds.txt ──▶ DescendantSet (RwLock<HashSet>)
//!                       ▲ expand()
//!   corpus/ ──▶ ShardEnumerator ──▶ [bounded queue] ──▶ workers (decode + expand)
//!                                                          │
//!   ClosureController: pass ▶ barrier ▶ |set| grew? ◀──────┘
//!                       │ converged / capped
//!                       ▼
//!                  output.txt
//! ```
//!
//! Each pass scans the whole corpus. A pass that adds no id is a fixpoint;
//! `max_iterations` bounds the number of passes.

pub mod closure;
pub mod config;
pub mod corpus;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod resource;

pub use closure::{run_closure, ClosureController, ClosureOutcome, DescendantSet, Termination};
pub use config::{CliArgs, ClosureConfig};
pub use corpus::{EntityRecord, ShardEnumerator, ShardRef};
pub use error::{ClosureError, Result, ShardError};
