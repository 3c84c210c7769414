//! Execute Run use case module
//!
//! Drives one full run: validate the workflow, resolve targets into the
//! job arena, then either emit the graph (dag mode), list the planned
//! jobs (dry run), refresh output mtimes (touch mode) or hand the arena
//! to the scheduler for real execution.

use std::sync::Arc;

use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use tracing::info;

use crate::application::services::resolver::{self, ForceFlags};
use crate::application::services::scheduler::{self, ScheduleReport, Scheduler, SchedulerMode};
use crate::application::use_cases::resolve_targets::{ResolveTargets, ResolvedRun};
use crate::domain::entities::job::JobArena;
use crate::domain::entities::workflow::Workflow;
use crate::domain::errors::PipelineError;
use crate::domain::repositories::action_runner::ActionRunner;
use crate::domain::value_objects::job_counter::JobCounter;
use crate::domain::value_objects::job_state::JobState;

/// Flags controlling one run, as collected by the CLI
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dryrun: bool,
    pub touch: bool,
    pub dag: bool,
    pub forcethis: bool,
    pub forceall: bool,
    pub reason: bool,
    /// Submission command; its presence selects the cluster scheduler
    pub cluster: Option<String>,
}

/// Counts reported after an executed (or touched) run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionStats {
    pub total: usize,
    pub executed: usize,
    pub skipped: usize,
}

/// What a run produced, depending on the selected mode
#[derive(Debug)]
pub enum RunOutcome {
    /// Graphviz dot rendering of the resolved job graph
    Dag(String),
    /// Display lines of the jobs that would run, in topological order
    DryRun(Vec<String>),
    Executed(ExecutionStats),
}

/// Use case running targets end to end
pub struct ExecuteRun;

impl ExecuteRun {
    pub fn execute(
        workflow: &mut Workflow,
        targets: &[String],
        options: &RunOptions,
        runner: Arc<dyn ActionRunner>,
        progress: Option<&mut dyn FnMut(&JobCounter)>,
    ) -> Result<RunOutcome, PipelineError> {
        workflow.check_rules()?;
        let flags = ForceFlags {
            forceall: options.forceall,
            forcethis: options.forcethis,
        };
        let ResolvedRun {
            mut arena,
            mut counter,
            ..
        } = ResolveTargets::new(workflow, flags).execute(targets)?;

        if options.dag {
            return Ok(RunOutcome::Dag(render_dag(&arena)));
        }

        let planned: Vec<_> = resolver::topological_order(&arena)?
            .into_iter()
            .filter(|&id| arena.get(id).needs_run)
            .collect();
        if options.reason {
            for &id in &planned {
                let job = arena.get(id);
                info!("{}: {}", job.label(), job.reason);
            }
        }

        if options.dryrun {
            let lines = planned
                .iter()
                .map(|&id| {
                    let job = arena.get(id);
                    if options.reason {
                        format!("{} ({})", job.display_line(), job.reason)
                    } else {
                        job.display_line()
                    }
                })
                .collect();
            return Ok(RunOutcome::DryRun(lines));
        }

        let report = if options.touch {
            scheduler::touch_all(&mut arena, &mut counter)
        } else {
            let mode = if options.cluster.is_some() {
                SchedulerMode::Cluster
            } else {
                SchedulerMode::Local {
                    cores: workflow.cores(),
                }
            };
            Scheduler::new(mode, runner).schedule(&mut arena, &mut counter, progress)
        };
        Self::finish(workflow, &arena, report)
    }

    fn finish(
        workflow: &mut Workflow,
        arena: &JobArena,
        report: ScheduleReport,
    ) -> Result<RunOutcome, PipelineError> {
        for (rule, seconds) in &report.runtimes {
            workflow.report_runtime(rule, *seconds);
        }
        if let Some(error) = report.error {
            return Err(error);
        }
        let executed = arena
            .iter()
            .filter(|j| j.needs_run && j.state == JobState::Done)
            .count();
        let skipped = arena.iter().filter(|j| !j.needs_run).count();
        Ok(RunOutcome::Executed(ExecutionStats {
            total: arena.len(),
            executed,
            skipped,
        }))
    }
}

/// Renders the resolved job graph in Graphviz dot format
fn render_dag(arena: &JobArena) -> String {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let nodes: Vec<_> = arena.iter().map(|job| graph.add_node(job.label())).collect();
    for job in arena.iter() {
        for &up in &job.upstream {
            graph.add_edge(nodes[up], nodes[job.id], ());
        }
    }
    format!("{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::rule::{IoEntry, Rule, SourceLocation};
    use crate::domain::repositories::action_runner::MockActionRunner;

    fn rule(name: &str, inputs: &[&str], outputs: &[&str], action: Option<&str>) -> Rule {
        let mut r = Rule::new(
            name,
            SourceLocation {
                file: "pipeline.json".to_string(),
                line: 1,
            },
        );
        r.set_input(inputs.iter().map(|p| IoEntry::positional(*p)).collect());
        r.set_output(outputs.iter().map(|p| IoEntry::positional(*p)).collect());
        if let Some(action) = action {
            r.set_action(action);
        }
        r
    }

    fn in_dir(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_string()
    }

    fn chain_workflow(dir: &tempfile::TempDir) -> (Workflow, String) {
        let (a, b, c) = (in_dir(dir, "a"), in_dir(dir, "b"), in_dir(dir, "c"));
        let mut wf = Workflow::new();
        wf.add_rule(rule("make_a", &[], &[&a], Some(&format!("create {}", a))))
            .unwrap();
        wf.add_rule(rule(
            "make_b",
            &[&a],
            &[&b],
            Some(&format!("create {}", b)),
        ))
        .unwrap();
        wf.add_rule(rule(
            "make_c",
            &[&b],
            &[&c],
            Some(&format!("create {}", c)),
        ))
        .unwrap();
        (wf, c)
    }

    fn creating_runner() -> Arc<MockActionRunner> {
        let mut runner = MockActionRunner::new();
        runner.expect_run().returning(|_, command| {
            for path in command.split_whitespace().skip(1) {
                std::fs::write(path, b"data").map_err(PipelineError::Io)?;
            }
            Ok(())
        });
        Arc::new(runner)
    }

    #[test]
    fn test_dryrun_lists_jobs_in_topological_order() {
        let dir = tempfile::tempdir().unwrap();
        let (mut wf, c) = chain_workflow(&dir);
        let options = RunOptions {
            dryrun: true,
            ..RunOptions::default()
        };
        let outcome = ExecuteRun::execute(
            &mut wf,
            &[c],
            &options,
            Arc::new(MockActionRunner::new()),
            None,
        )
        .unwrap();
        match outcome {
            RunOutcome::DryRun(lines) => {
                assert_eq!(lines.len(), 3);
                assert!(lines[0].starts_with("make_a"));
                assert!(lines[2].starts_with("make_c"));
            }
            other => panic!("expected dry run, got {other:?}"),
        }
    }

    #[test]
    fn test_dag_mode_renders_rules() {
        let dir = tempfile::tempdir().unwrap();
        let (mut wf, c) = chain_workflow(&dir);
        let options = RunOptions {
            dag: true,
            ..RunOptions::default()
        };
        let outcome = ExecuteRun::execute(
            &mut wf,
            &[c],
            &options,
            Arc::new(MockActionRunner::new()),
            None,
        )
        .unwrap();
        match outcome {
            RunOutcome::Dag(dot) => {
                assert!(dot.contains("digraph"));
                assert!(dot.contains("make_a"));
                assert!(dot.contains("make_c"));
            }
            other => panic!("expected dag, got {other:?}"),
        }
    }

    #[test]
    fn test_executed_run_builds_chain_and_records_runtimes() {
        let dir = tempfile::tempdir().unwrap();
        let (mut wf, c) = chain_workflow(&dir);
        let outcome = ExecuteRun::execute(
            &mut wf,
            &[c.clone()],
            &RunOptions::default(),
            creating_runner(),
            None,
        )
        .unwrap();
        match outcome {
            RunOutcome::Executed(stats) => {
                assert_eq!(stats.total, 3);
                assert_eq!(stats.executed, 3);
                assert_eq!(stats.skipped, 0);
            }
            other => panic!("expected executed stats, got {other:?}"),
        }
        assert!(crate::infrastructure::fs::exists(&c));
        assert_eq!(wf.runtimes().len(), 3);
    }

    #[test]
    fn test_up_to_date_run_executes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut wf, c) = chain_workflow(&dir);
        ExecuteRun::execute(
            &mut wf,
            &[c.clone()],
            &RunOptions::default(),
            creating_runner(),
            None,
        )
        .unwrap();
        // Second run over fresh outputs has nothing to do.
        let outcome = ExecuteRun::execute(
            &mut wf,
            &[c],
            &RunOptions::default(),
            Arc::new(MockActionRunner::new()),
            None,
        )
        .unwrap();
        match outcome {
            RunOutcome::Executed(stats) => {
                assert_eq!(stats.executed, 0);
                assert_eq!(stats.skipped, 3);
            }
            other => panic!("expected executed stats, got {other:?}"),
        }
    }

    #[test]
    fn test_touch_mode_creates_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let (mut wf, c) = chain_workflow(&dir);
        let options = RunOptions {
            touch: true,
            ..RunOptions::default()
        };
        let outcome = ExecuteRun::execute(
            &mut wf,
            &[c.clone()],
            &options,
            Arc::new(MockActionRunner::new()),
            None,
        )
        .unwrap();
        match outcome {
            RunOutcome::Executed(stats) => assert_eq!(stats.executed, 3),
            other => panic!("expected executed stats, got {other:?}"),
        }
        assert!(crate::infrastructure::fs::exists(&c));
    }
}
