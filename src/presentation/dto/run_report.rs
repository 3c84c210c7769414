//! Run report DTO module
//!
//! Serializable summary of a finished run: aggregate job counts plus the
//! per-rule runtime statistics collected by the scheduler. Written to
//! disk by `--stats` and used for the console summary.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::application::use_cases::execute_run::ExecutionStats;
use crate::domain::entities::workflow::Workflow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: RunSummaryOutput,
    pub rules: Vec<RuleRuntimeOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummaryOutput {
    pub total_jobs: usize,
    pub executed_jobs: usize,
    pub skipped_jobs: usize,
    pub finished_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRuntimeOutput {
    pub rule: String,
    pub runs: usize,
    pub min_seconds: f64,
    pub max_seconds: f64,
    pub total_seconds: f64,
    pub mean_seconds: f64,
}

impl RunReport {
    pub fn from_run(stats: &ExecutionStats, workflow: &Workflow) -> Self {
        let rules = workflow
            .runtimes()
            .into_iter()
            .map(|r| RuleRuntimeOutput {
                rule: r.rule,
                runs: r.runs,
                min_seconds: r.min,
                max_seconds: r.max,
                total_seconds: r.total,
                mean_seconds: r.mean,
            })
            .collect();
        Self {
            summary: RunSummaryOutput {
                total_jobs: stats.total,
                executed_jobs: stats.executed,
                skipped_jobs: stats.skipped,
                finished_at: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            },
            rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serialises() {
        let mut wf = Workflow::new();
        let mut rule = crate::domain::entities::rule::Rule::new(
            "clean",
            crate::domain::entities::rule::SourceLocation {
                file: "pipeline.json".to_string(),
                line: 1,
            },
        );
        rule.set_output(vec![crate::domain::entities::rule::IoEntry::positional(
            "out/{s}.csv",
        )]);
        wf.add_rule(rule).unwrap();
        wf.report_runtime("clean", 2.5);

        let stats = ExecutionStats {
            total: 1,
            executed: 1,
            skipped: 0,
        };
        let report = RunReport::from_run(&stats, &wf);
        let json = serde_json::to_string_pretty(&report).unwrap();
        assert!(json.contains("executed_jobs"));
        assert!(json.contains("clean"));
        assert!(json.contains("2.5"));
    }
}
