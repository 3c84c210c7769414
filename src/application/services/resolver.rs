//! Resolver service module
//!
//! This service expands rules into the concrete job graph for one run.
//! Expansion recurses from the requested outputs through producing rules,
//! memoising jobs by output identity, rejecting cycles and ambiguous
//! producers, and computing for every job whether it must run at all.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::domain::entities::iofile::IoFile;
use crate::domain::entities::job::{Job, JobArena, JobId};
use crate::domain::entities::rule::{IoEntry, Rule};
use crate::domain::entities::workflow::Workflow;
use crate::domain::errors::PipelineError;
use crate::domain::value_objects::job_counter::JobCounter;
use crate::domain::value_objects::job_state::{JobState, RunReason};
use crate::domain::value_objects::wildcards::WildcardBindings;
use crate::infrastructure::fs;

/// Force flags carried through one resolution pass
#[derive(Debug, Clone, Copy, Default)]
pub struct ForceFlags {
    /// Rerun every job regardless of file state
    pub forceall: bool,
    /// Rerun the jobs of target rules regardless of file state
    pub forcethis: bool,
}

/// Expands target rules into the job arena of a single run
pub struct Resolver<'a> {
    workflow: &'a Workflow,
    flags: ForceFlags,
    arena: JobArena,
    counter: JobCounter,
}

impl<'a> Resolver<'a> {
    pub fn new(workflow: &'a Workflow, flags: ForceFlags) -> Self {
        Self {
            workflow,
            flags,
            arena: JobArena::new(),
            counter: JobCounter::new(),
        }
    }

    pub fn arena(&self) -> &JobArena {
        &self.arena
    }

    pub fn into_parts(self) -> (JobArena, JobCounter) {
        (self.arena, self.counter)
    }

    /// Expands a rule into a job producing `requested` (or the rule's own
    /// outputs when `requested` is None), returning the job id
    ///
    /// `is_target` marks jobs requested directly by the user, which is
    /// what `--forcethis` applies to.
    pub fn expand(
        &mut self,
        rule: &Rule,
        requested: Option<&str>,
        is_target: bool,
    ) -> Result<JobId, PipelineError> {
        let mut visited = Vec::new();
        self.expand_inner(rule, requested, is_target, &mut visited)
    }

    fn expand_inner(
        &mut self,
        rule: &Rule,
        requested: Option<&str>,
        is_target: bool,
        visited: &mut Vec<(String, WildcardBindings)>,
    ) -> Result<JobId, PipelineError> {
        let bindings = match requested {
            Some(file) => rule
                .bind_output(file)
                .ok_or_else(|| PipelineError::MissingRule {
                    file: file.to_string(),
                })?,
            None => WildcardBindings::new(),
        };

        let key = (rule.name().to_string(), bindings.clone());
        if visited.contains(&key) {
            return Err(PipelineError::CyclicGraph {
                rule: rule.name().to_string(),
            });
        }

        let outputs = rule.concrete_outputs(&bindings)?;
        if outputs.is_empty() {
            return Err(PipelineError::NoOutputs {
                rule: rule.name().to_string(),
            });
        }

        // Memoisation by output identity: a second path reaching the same
        // (rule, bindings) pair reuses the cached job, which collapses
        // diamonds. Every concrete output must be checked: a cache hit is
        // only a cache hit when the whole output set maps to one existing
        // job of the same rule. Any other overlap, including a collision
        // on a non-first output, means two jobs would write the same file.
        let claimed: Vec<(usize, JobId)> = outputs
            .iter()
            .enumerate()
            .filter_map(|(index, o)| {
                self.arena
                    .producer_of(o.file.path())
                    .map(|id| (index, id))
            })
            .collect();
        if let Some(&(index, existing)) = claimed.first() {
            let cached = self.arena.get(existing);
            let exact = claimed.len() == outputs.len()
                && claimed.iter().all(|&(_, id)| id == existing);
            if exact && cached.rule == rule.name() {
                return Ok(existing);
            }
            return Err(PipelineError::AmbiguousRule {
                file: outputs[index].file.path().to_string(),
                first: cached.rule.clone(),
                second: rule.name().to_string(),
            });
        }

        let inputs = rule.concrete_inputs(&bindings)?;

        visited.push(key);
        let mut upstream: Vec<JobId> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        for input in &inputs {
            let path = input.file.path();
            if let Some(existing) = self.arena.producer_of(path) {
                upstream.push(existing);
                continue;
            }
            let producers = self.workflow.producers(path, Some(rule.name()));
            match producers.as_slice() {
                [] => {
                    if !fs::exists(path) {
                        missing.push(path.to_string());
                    }
                }
                [producer] => {
                    let child = self.expand_inner(producer, Some(path), false, visited)?;
                    upstream.push(child);
                }
                [first, second, ..] => {
                    return Err(PipelineError::AmbiguousRule {
                        file: path.to_string(),
                        first: first.name().to_string(),
                        second: second.name().to_string(),
                    });
                }
            }
        }
        visited.pop();

        if !missing.is_empty() {
            return Err(PipelineError::MissingInput {
                rule: rule.name().to_string(),
                files: missing,
            });
        }

        upstream.sort_unstable();
        upstream.dedup();

        let upstream_rebuilds = upstream.iter().any(|&id| self.arena.get(id).needs_run);
        let (needs_run, reason) = self.compute_needs_run(
            is_target,
            &inputs,
            &outputs,
            upstream_rebuilds,
        );

        let threads = rule.threads();
        let message = rule
            .message()
            .map(|t| rule.render_template(t, &bindings, &inputs, &outputs, threads))
            .transpose()?;
        let command = rule
            .action()
            .map(|t| rule.render_template(t, &bindings, &inputs, &outputs, threads))
            .transpose()?;

        let strip = |entries: Vec<IoEntry>| -> Vec<IoFile> {
            entries.into_iter().map(|e| e.file).collect()
        };
        let id = self.arena.insert(Job {
            id: 0,
            rule: rule.name().to_string(),
            bindings,
            inputs: strip(inputs),
            outputs: strip(outputs),
            upstream,
            state: JobState::Pending,
            needs_run,
            reason,
            threads,
            message,
            command,
        });
        self.counter.add();
        Ok(id)
    }

    /// Decides whether a job must execute this run, and why
    ///
    /// A job is skipped only when all outputs exist, every input is no
    /// newer than the oldest output, no ancestor rebuilds and no force
    /// flag applies.
    fn compute_needs_run(
        &self,
        is_target: bool,
        inputs: &[IoEntry],
        outputs: &[IoEntry],
        upstream_rebuilds: bool,
    ) -> (bool, RunReason) {
        if self.flags.forceall {
            return (true, RunReason::ForcedAll);
        }
        if self.flags.forcethis && is_target {
            return (true, RunReason::ForcedTarget);
        }
        for output in outputs {
            if !fs::exists(output.file.path()) {
                return (
                    true,
                    RunReason::MissingOutput(output.file.path().to_string()),
                );
            }
        }
        let oldest_output = outputs
            .iter()
            .filter_map(|o| fs::mtime(o.file.path()).ok())
            .min();
        if let Some(oldest) = oldest_output {
            for input in inputs {
                if let Ok(input_mtime) = fs::mtime(input.file.path()) {
                    if input_mtime > oldest {
                        return (
                            true,
                            RunReason::UpdatedInput(input.file.path().to_string()),
                        );
                    }
                }
            }
        }
        if upstream_rebuilds {
            return (true, RunReason::UpstreamRebuild);
        }
        (false, RunReason::UpToDate)
    }
}

/// Builds a petgraph view of the arena, edges pointing producer to consumer
pub fn job_graph(arena: &JobArena) -> (DiGraph<JobId, ()>, Vec<NodeIndex>) {
    let mut graph = DiGraph::new();
    let nodes: Vec<NodeIndex> = arena.iter().map(|job| graph.add_node(job.id)).collect();
    for job in arena.iter() {
        for &up in &job.upstream {
            graph.add_edge(nodes[up], nodes[job.id], ());
        }
    }
    (graph, nodes)
}

/// Jobs in topological order, producers before consumers
///
/// The expander rejects cycles, so the sort cannot fail on an arena it
/// produced; a failure here still surfaces as an error rather than a
/// panic.
pub fn topological_order(arena: &JobArena) -> Result<Vec<JobId>, PipelineError> {
    let (graph, _) = job_graph(arena);
    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|n| graph[n]).collect()),
        Err(cycle) => Err(PipelineError::CyclicGraph {
            rule: arena.get(graph[cycle.node_id()]).rule.clone(),
        }),
    }
}
