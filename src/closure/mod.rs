//! Descendant closure: shared set, worker pool and convergence controller.

pub mod controller;
pub mod pool;
pub mod set;

pub use controller::{run_closure, ClosureController, ClosureOutcome, Phase, Termination};
pub use pool::{ClosurePool, ShardOutcome};
pub use set::{DescendantSet, ExpandHandle};
