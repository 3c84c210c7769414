//! Job state and rebuild reason value objects
//!
//! This module defines the lifecycle state of a job and the reason a job
//! was selected for execution, as reported by `--reason`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a concrete job
///
/// A job becomes `Ready` only when every upstream job is `Done`; the
/// scheduler moves it through `Running` to a terminal `Done` or `Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for upstream jobs to finish
    Pending,
    /// All upstream jobs are done, eligible for dispatch
    Ready,
    /// Dispatched to a worker
    Running,
    /// Finished successfully, or skipped because it was up to date
    Done,
    /// The action failed or an output check failed
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Pending => "pending",
            JobState::Ready => "ready",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Why a job's action must be executed this run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunReason {
    /// Every job was forced with --forceall
    ForcedAll,
    /// The target rule was forced with --forcethis
    ForcedTarget,
    /// At least one declared output is absent
    MissingOutput(String),
    /// An input is strictly newer than the oldest output
    UpdatedInput(String),
    /// An upstream job rebuilds, so this job's inputs will change
    UpstreamRebuild,
    /// All outputs exist and are newer than every input
    UpToDate,
}

impl fmt::Display for RunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunReason::ForcedAll => write!(f, "forced by --forceall"),
            RunReason::ForcedTarget => write!(f, "forced by --forcethis"),
            RunReason::MissingOutput(file) => write!(f, "output {} is missing", file),
            RunReason::UpdatedInput(file) => write!(f, "input {} is newer than the outputs", file),
            RunReason::UpstreamRebuild => write!(f, "an upstream job is being rebuilt"),
            RunReason::UpToDate => write!(f, "up to date"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Ready.is_terminal());
    }

    #[test]
    fn test_reason_display() {
        let reason = RunReason::MissingOutput("out/report.html".to_string());
        assert_eq!(reason.to_string(), "output out/report.html is missing");
    }
}
