//! Pipeline definition parser
//!
//! Reads a JSON pipeline file and registers its rules against a
//! workflow, in declaration order. Including a file preserves the
//! workflow's original first-rule pointer unless the caller elects to
//! overwrite it.

use std::io::Read;

use anyhow::{Context, Result};

use crate::domain::entities::rule::{Rule, SourceLocation};
use crate::domain::entities::workflow::Workflow;
use crate::infrastructure::fs;
use crate::infrastructure::parsers::pipeline_models::PipelineFile;

/// What an include pass added and requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeSummary {
    /// Number of rules registered
    pub added: usize,
    /// Work directory requested by the file, if any
    pub workdir: Option<String>,
}

pub struct PipelineParser;

impl PipelineParser {
    pub fn new() -> Self {
        Self
    }

    /// Includes a pipeline file into the workflow
    ///
    /// Rules are registered in declaration order; each one records the
    /// line of its declaration for diagnostics. Duplicate rule names
    /// fail the include.
    pub fn include(
        &self,
        workflow: &mut Workflow,
        path: &str,
        overwrite_first_rule: bool,
    ) -> Result<IncludeSummary> {
        let mut text = String::new();
        fs::open(path)
            .with_context(|| format!("Failed to open pipeline file {}", path))?
            .read_to_string(&mut text)
            .with_context(|| format!("Failed to read pipeline file {}", path))?;
        let spec: PipelineFile = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse pipeline file {}", path))?;

        let first_before = workflow.first_rule_name().map(str::to_string);
        let mut added = 0;
        for rule_spec in &spec.rules {
            let line = declaration_line(&text, &rule_spec.name);
            let mut rule = Rule::new(
                rule_spec.name.as_str(),
                SourceLocation {
                    file: path.to_string(),
                    line,
                },
            );
            rule.set_input(rule_spec.input.iter().map(|s| s.to_entry()).collect());
            rule.set_output(rule_spec.output.iter().map(|s| s.to_entry()).collect());
            if let Some(threads) = rule_spec.threads {
                rule.set_threads(threads);
            }
            if let Some(message) = &rule_spec.message {
                rule.set_message(message.as_str());
            }
            if let Some(shell) = &rule_spec.shell {
                rule.set_action(shell.as_str());
            }
            workflow
                .add_rule(rule)
                .with_context(|| format!("Failed to register rule from {}:{}", path, line))?;
            added += 1;
        }

        if overwrite_first_rule {
            if let Some(first_new) = spec.rules.first() {
                workflow.set_first_rule(&first_new.name)?;
            }
        } else if let Some(first) = first_before {
            workflow.set_first_rule(&first)?;
        }

        Ok(IncludeSummary {
            added,
            workdir: spec.workdir,
        })
    }
}

impl Default for PipelineParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Line on which a rule's name literal appears, 1-based
///
/// Good enough for diagnostics; duplicate names fail registration before
/// the ambiguity could matter.
fn declaration_line(text: &str, name: &str) -> usize {
    let needle = format!("\"{}\"", name);
    text.lines()
        .position(|line| line.contains(&needle))
        .map(|index| index + 1)
        .unwrap_or(0)
}
