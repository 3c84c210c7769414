//! Workflow entity module
//!
//! The workflow is the insertion-ordered registry of rules plus the run
//! configuration that spans a process: the distinguished first rule, the
//! core budget, the work directory and per-rule runtime statistics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::entities::rule::Rule;
use crate::domain::errors::PipelineError;

/// Aggregated wall-clock statistics for one rule across a run
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRuntime {
    pub rule: String,
    pub runs: usize,
    pub min: f64,
    pub max: f64,
    pub total: f64,
    pub mean: f64,
}

/// Registry of rules and process-wide run configuration
#[derive(Debug, Default)]
pub struct Workflow {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    first: Option<String>,
    cores: usize,
    workdir: Option<PathBuf>,
    runtimes: HashMap<String, Vec<f64>>,
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            cores: 1,
            ..Self::default()
        }
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    pub fn set_cores(&mut self, cores: usize) {
        self.cores = cores.max(1);
    }

    /// Registers a rule, failing on a duplicate name
    ///
    /// The first successfully added rule becomes the default target.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), PipelineError> {
        if self.index.contains_key(rule.name()) {
            return Err(PipelineError::CreateRule {
                name: rule.name().to_string(),
            });
        }
        if self.first.is_none() {
            self.first = Some(rule.name().to_string());
        }
        self.index.insert(rule.name().to_string(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    pub fn is_rule(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Gets a rule by name
    pub fn rule(&self, name: &str) -> Result<&Rule, PipelineError> {
        if self.rules.is_empty() {
            return Err(PipelineError::NoRules);
        }
        self.index
            .get(name)
            .map(|&i| &self.rules[i])
            .ok_or_else(|| PipelineError::UnknownRule {
                name: name.to_string(),
            })
    }

    /// Rules in declaration order
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// The default target rule
    pub fn first_rule(&self) -> Result<&Rule, PipelineError> {
        match &self.first {
            Some(name) => self.rule(name),
            None => Err(PipelineError::NoRules),
        }
    }

    pub fn first_rule_name(&self) -> Option<&str> {
        self.first.as_deref()
    }

    /// Repoints the default target; used when an included file elects to
    /// overwrite the first rule
    pub fn set_first_rule(&mut self, name: &str) -> Result<(), PipelineError> {
        self.rule(name)?;
        self.first = Some(name.to_string());
        Ok(())
    }

    /// Rules whose output patterns match the given file, in declaration
    /// order, optionally excluding one rule
    pub fn producers(&self, file: &str, exclude: Option<&str>) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| Some(rule.name()) != exclude)
            .filter(|rule| rule.is_producer(file))
            .collect()
    }

    /// Validates every rule, aggregating all failures
    pub fn check_rules(&self) -> Result<(), PipelineError> {
        let errors: Vec<PipelineError> = self
            .rules
            .iter()
            .filter_map(|rule| rule.check().err())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::composite(errors))
        }
    }

    /// Records the work directory on first call; later calls are no-ops
    ///
    /// Returns true when the caller should create and enter the directory.
    pub fn set_workdir(&mut self, path: &Path) -> bool {
        if self.workdir.is_some() {
            return false;
        }
        self.workdir = Some(path.to_path_buf());
        true
    }

    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    /// Records one job's wall-clock runtime for its rule
    pub fn report_runtime(&mut self, rule: &str, seconds: f64) {
        self.runtimes.entry(rule.to_string()).or_default().push(seconds);
    }

    /// Per-rule runtime statistics, in rule declaration order
    pub fn runtimes(&self) -> Vec<RuleRuntime> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let samples = self.runtimes.get(rule.name())?;
                if samples.is_empty() {
                    return None;
                }
                let total: f64 = samples.iter().sum();
                Some(RuleRuntime {
                    rule: rule.name().to_string(),
                    runs: samples.len(),
                    min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
                    max: samples.iter().cloned().fold(0.0, f64::max),
                    total,
                    mean: total / samples.len() as f64,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::rule::{IoEntry, SourceLocation};

    fn rule(name: &str, output: &str) -> Rule {
        let mut r = Rule::new(
            name,
            SourceLocation {
                file: "pipeline.json".to_string(),
                line: 1,
            },
        );
        r.set_output(vec![IoEntry::positional(output)]);
        r
    }

    #[test]
    fn test_first_added_rule_is_default() {
        let mut wf = Workflow::new();
        wf.add_rule(rule("all", "out/report.html")).unwrap();
        wf.add_rule(rule("clean", "out/{s}.csv")).unwrap();
        assert_eq!(wf.first_rule().unwrap().name(), "all");
    }

    #[test]
    fn test_duplicate_rule_name_rejected() {
        let mut wf = Workflow::new();
        wf.add_rule(rule("all", "a")).unwrap();
        let err = wf.add_rule(rule("all", "b")).unwrap_err();
        assert!(matches!(err, PipelineError::CreateRule { .. }));
    }

    #[test]
    fn test_unknown_rule_and_empty_workflow() {
        let mut wf = Workflow::new();
        assert!(matches!(wf.rule("x"), Err(PipelineError::NoRules)));
        wf.add_rule(rule("all", "a")).unwrap();
        assert!(matches!(
            wf.rule("x"),
            Err(PipelineError::UnknownRule { .. })
        ));
    }

    #[test]
    fn test_producers_respects_exclude() {
        let mut wf = Workflow::new();
        wf.add_rule(rule("a", "out/{s}.csv")).unwrap();
        wf.add_rule(rule("b", "out/fixed.csv")).unwrap();
        let all = wf.producers("out/fixed.csv", None);
        assert_eq!(all.len(), 2);
        let without_a = wf.producers("out/fixed.csv", Some("a"));
        assert_eq!(without_a.len(), 1);
        assert_eq!(without_a[0].name(), "b");
    }

    #[test]
    fn test_workdir_set_once() {
        let mut wf = Workflow::new();
        assert!(wf.set_workdir(Path::new("build")));
        assert!(!wf.set_workdir(Path::new("elsewhere")));
        assert_eq!(wf.workdir(), Some(Path::new("build")));
    }

    #[test]
    fn test_runtime_statistics() {
        let mut wf = Workflow::new();
        wf.add_rule(rule("clean", "out/{s}.csv")).unwrap();
        wf.report_runtime("clean", 1.0);
        wf.report_runtime("clean", 3.0);
        let stats = wf.runtimes();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].runs, 2);
        assert_eq!(stats[0].min, 1.0);
        assert_eq!(stats[0].max, 3.0);
        assert_eq!(stats[0].mean, 2.0);
    }
}
