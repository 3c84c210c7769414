//! Job entity module
//!
//! A job is a concrete instantiation of a rule for one specific output
//! set: bound wildcards, concrete inputs and outputs, upstream producers.
//! Jobs live in an arena keyed by their sequence number, with upstream
//! links stored as indices, so the acyclic graph carries no shared
//! ownership and can be dropped wholesale when the run returns.

use serde::{Deserialize, Serialize};

use crate::domain::entities::iofile::IoFile;
use crate::domain::value_objects::job_state::{JobState, RunReason};
use crate::domain::value_objects::wildcards::WildcardBindings;

/// Index of a job in the arena; doubles as the sequence number used for
/// scheduling tie-breaks and reporting
pub type JobId = usize;

/// A concrete unit of work produced by rule expansion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub rule: String,
    pub bindings: WildcardBindings,
    pub inputs: Vec<IoFile>,
    pub outputs: Vec<IoFile>,
    pub upstream: Vec<JobId>,
    pub state: JobState,
    pub needs_run: bool,
    pub reason: RunReason,
    /// Raw thread requirement from the rule; clamped at scheduling time
    pub threads: usize,
    /// Message template already expanded with this job's bindings
    pub message: Option<String>,
    /// Shell command already expanded with this job's bindings
    pub command: Option<String>,
}

impl Job {
    /// A short human-readable label: the rule name plus bindings
    pub fn label(&self) -> String {
        if self.bindings.is_empty() {
            self.rule.clone()
        } else {
            format!("{} [{}]", self.rule, self.bindings)
        }
    }

    /// Line printed for dry runs and reason reports
    pub fn display_line(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => {
                let outputs: Vec<&str> = self.outputs.iter().map(|f| f.path()).collect();
                format!("{} -> {}", self.label(), outputs.join(" "))
            }
        }
    }
}

/// Arena of all jobs created by one resolution pass
///
/// Memoises jobs by concrete output path: requesting a file whose producer
/// was already expanded returns the cached job, which both collapses
/// diamonds and guarantees that at most one job produces any output.
#[derive(Debug, Default)]
pub struct JobArena {
    jobs: Vec<Job>,
    by_output: std::collections::HashMap<String, JobId>,
}

impl JobArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: JobId) -> &Job {
        &self.jobs[id]
    }

    pub fn get_mut(&mut self, id: JobId) -> &mut Job {
        &mut self.jobs[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Looks up the job already registered as producer of an output path
    pub fn producer_of(&self, output: &str) -> Option<JobId> {
        self.by_output.get(output).copied()
    }

    /// Registers a job and indexes every one of its outputs
    ///
    /// The caller must have checked `producer_of` first; a second producer
    /// for the same output is a resolution bug, not a user error.
    pub fn insert(&mut self, mut job: Job) -> JobId {
        let id = self.jobs.len();
        job.id = id;
        for output in &job.outputs {
            self.by_output.insert(output.path().to_string(), id);
        }
        self.jobs.push(job);
        id
    }

    /// Jobs that list the given job as upstream
    pub fn dependents_of(&self, id: JobId) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|job| job.upstream.contains(&id))
            .map(|job| job.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(rule: &str, outputs: &[&str]) -> Job {
        Job {
            id: 0,
            rule: rule.to_string(),
            bindings: WildcardBindings::new(),
            inputs: Vec::new(),
            outputs: outputs.iter().map(|p| IoFile::new(*p)).collect(),
            upstream: Vec::new(),
            state: JobState::Pending,
            needs_run: true,
            reason: RunReason::MissingOutput(outputs[0].to_string()),
            threads: 1,
            message: None,
            command: None,
        }
    }

    #[test]
    fn test_arena_assigns_sequential_ids() {
        let mut arena = JobArena::new();
        let a = arena.insert(job("a", &["x"]));
        let b = arena.insert(job("b", &["y"]));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(arena.get(b).rule, "b");
    }

    #[test]
    fn test_arena_indexes_outputs() {
        let mut arena = JobArena::new();
        let id = arena.insert(job("a", &["x", "y"]));
        assert_eq!(arena.producer_of("x"), Some(id));
        assert_eq!(arena.producer_of("y"), Some(id));
        assert_eq!(arena.producer_of("z"), None);
    }

    #[test]
    fn test_dependents_lookup() {
        let mut arena = JobArena::new();
        let a = arena.insert(job("a", &["x"]));
        let mut b = job("b", &["y"]);
        b.upstream.push(a);
        let b = arena.insert(b);
        assert_eq!(arena.dependents_of(a), vec![b]);
        assert!(arena.dependents_of(b).is_empty());
    }

    #[test]
    fn test_display_line_without_message() {
        let j = job("clean", &["out/a.csv"]);
        assert_eq!(j.display_line(), "clean -> out/a.csv");
    }
}
