//! Back-test, sweep, and walk-forward orchestration (C9, C10, spec §4.8-4.9).

pub mod kernel;
pub mod sweep;

pub use kernel::{run, BacktestOptions, BacktestResult};
pub use sweep::{walk_forward, GridPoint, WalkForwardWindow};
