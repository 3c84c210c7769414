//! Resolve Targets use case module
//!
//! Turns the user's targets (rule names or file paths) into the job arena
//! for one run. File targets are matched against every candidate
//! producer by trial expansion; all failures across all targets are
//! aggregated into one composite error so the user sees every problem in
//! a single pass.

use crate::application::services::resolver::{ForceFlags, Resolver};
use crate::domain::entities::job::{JobArena, JobId};
use crate::domain::entities::rule::Rule;
use crate::domain::entities::workflow::Workflow;
use crate::domain::errors::PipelineError;
use crate::domain::value_objects::job_counter::JobCounter;

/// Result of a successful resolution pass
#[derive(Debug)]
pub struct ResolvedRun {
    pub arena: JobArena,
    pub counter: JobCounter,
    /// Jobs the user asked for directly
    pub targets: Vec<JobId>,
}

/// Use case expanding targets into a concrete job graph
pub struct ResolveTargets<'a> {
    workflow: &'a Workflow,
    flags: ForceFlags,
}

impl<'a> ResolveTargets<'a> {
    pub fn new(workflow: &'a Workflow, flags: ForceFlags) -> Self {
        Self { workflow, flags }
    }

    /// Resolves the given targets; an empty list runs the first rule
    pub fn execute(&self, targets: &[String]) -> Result<ResolvedRun, PipelineError> {
        let mut plan: Vec<(&Rule, Option<String>)> = Vec::new();

        if targets.is_empty() {
            plan.push((self.workflow.first_rule()?, None));
        } else {
            let mut rule_targets: Vec<&str> = Vec::new();
            let mut file_targets: Vec<&str> = Vec::new();
            for target in targets {
                if self.workflow.is_rule(target) {
                    rule_targets.push(target);
                } else {
                    file_targets.push(target);
                }
            }

            let mut failures: Vec<PipelineError> = Vec::new();
            for file in file_targets {
                match self.select_producer(file) {
                    Ok(rule) => plan.push((rule, Some(file.to_string()))),
                    Err(PipelineError::Composite { errors }) => failures.extend(errors),
                    Err(error) if error.is_resolution_error() => failures.push(error),
                    Err(error) => return Err(error),
                }
            }
            if !failures.is_empty() {
                return Err(PipelineError::composite(failures));
            }

            for name in rule_targets {
                plan.push((self.workflow.rule(name)?, None));
            }
        }

        let mut resolver = Resolver::new(self.workflow, self.flags);
        let mut target_ids = Vec::new();
        for (rule, requested) in plan {
            target_ids.push(resolver.expand(rule, requested.as_deref(), true)?);
        }
        let (arena, counter) = resolver.into_parts();
        Ok(ResolvedRun {
            arena,
            counter,
            targets: target_ids,
        })
    }

    /// Picks the unique producer of a file target
    ///
    /// Every candidate rule is trial-expanded into a scratch arena. A
    /// candidate failing on missing inputs is discarded; two candidates
    /// succeeding is an ambiguity; none succeeding surfaces the collected
    /// missing-input errors, or `MissingRule` when no output pattern
    /// matched the file at all.
    fn select_producer(&self, file: &str) -> Result<&'a Rule, PipelineError> {
        let candidates = self.workflow.producers(file, None);
        if candidates.is_empty() {
            return Err(PipelineError::MissingRule {
                file: file.to_string(),
            });
        }

        let mut selected: Option<&Rule> = None;
        let mut missing: Vec<PipelineError> = Vec::new();
        for rule in candidates {
            let mut trial = Resolver::new(self.workflow, self.flags);
            match trial.expand(rule, Some(file), true) {
                Ok(_) => {
                    if let Some(first) = selected {
                        return Err(PipelineError::AmbiguousRule {
                            file: file.to_string(),
                            first: first.name().to_string(),
                            second: rule.name().to_string(),
                        });
                    }
                    selected = Some(rule);
                }
                Err(error @ PipelineError::MissingInput { .. }) => missing.push(error),
                Err(error) => return Err(error),
            }
        }
        match selected {
            Some(rule) => Ok(rule),
            None => Err(PipelineError::composite(missing)),
        }
    }
}
