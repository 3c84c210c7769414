pub mod execute_run;
pub mod resolve_targets;

pub use execute_run::{ExecuteRun, ExecutionStats, RunOptions, RunOutcome};
pub use resolve_targets::{ResolveTargets, ResolvedRun};
