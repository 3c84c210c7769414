//! Rule entity module
//!
//! This module defines the declarative transform at the heart of the
//! engine: input patterns, output patterns, a thread requirement, an
//! optional message template and an opaque shell action. Rules are
//! created at workflow load time and never mutated after load completes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::entities::iofile::IoFile;
use crate::domain::errors::PipelineError;
use crate::domain::value_objects::wildcards::{self, WildcardBindings};

/// Where a rule was declared, for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One input or output pattern, optionally keyed for template access
///
/// Positional entries have no key; keyed entries can be referenced in
/// message and action templates as `{input.key}` / `{output.key}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IoEntry {
    pub key: Option<String>,
    pub file: IoFile,
}

impl IoEntry {
    pub fn positional(file: impl Into<IoFile>) -> Self {
        Self {
            key: None,
            file: file.into(),
        }
    }

    pub fn keyed(key: impl Into<String>, file: impl Into<IoFile>) -> Self {
        Self {
            key: Some(key.into()),
            file: file.into(),
        }
    }
}

/// A declarative transform: input patterns to output patterns plus action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    name: String,
    inputs: Vec<IoEntry>,
    outputs: Vec<IoEntry>,
    threads: usize,
    message: Option<String>,
    action: Option<String>,
    source: SourceLocation,
}

impl Rule {
    pub fn new(name: impl Into<String>, source: SourceLocation) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            threads: 1,
            message: None,
            action: None,
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[IoEntry] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[IoEntry] {
        &self.outputs
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn source(&self) -> &SourceLocation {
        &self.source
    }

    /// Sets the input patterns; called once by the parser
    pub fn set_input(&mut self, entries: Vec<IoEntry>) {
        self.inputs = entries;
    }

    /// Sets the output patterns; called once by the parser
    pub fn set_output(&mut self, entries: Vec<IoEntry>) {
        self.outputs = entries;
    }

    /// Stores the raw thread requirement; clamping to the core budget
    /// happens at scheduling time, not here
    pub fn set_threads(&mut self, threads: usize) {
        self.threads = threads.max(1);
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn set_action(&mut self, action: impl Into<String>) {
        self.action = Some(action.into());
    }

    /// Validates the rule's patterns
    ///
    /// Output patterns must be non-empty, every input wildcard must appear
    /// in at least one output, and every output pattern must bind the same
    /// wildcard set so that matching any one output determines them all.
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.outputs.is_empty() {
            return Err(PipelineError::NoOutputs {
                rule: self.name.clone(),
            });
        }
        let output_names: Vec<Vec<String>> = self
            .outputs
            .iter()
            .map(|e| {
                let mut names = wildcards::wildcard_names(e.file.path());
                names.sort();
                names.dedup();
                names
            })
            .collect();
        for (index, names) in output_names.iter().enumerate().skip(1) {
            if *names != output_names[0] {
                return Err(PipelineError::UnboundWildcard {
                    rule: self.name.clone(),
                    pattern: self.outputs[index].file.path().to_string(),
                });
            }
        }
        let bound = &output_names[0];
        for entry in &self.inputs {
            for name in wildcards::wildcard_names(entry.file.path()) {
                if !bound.contains(&name) {
                    return Err(PipelineError::UnboundWildcard {
                        rule: self.name.clone(),
                        pattern: entry.file.path().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns true iff `file` matches one of this rule's output patterns
    /// under some wildcard binding
    pub fn is_producer(&self, file: &str) -> bool {
        self.outputs
            .iter()
            .any(|e| wildcards::match_pattern(e.file.path(), file).is_some())
    }

    /// Binds wildcards by matching a requested output against the output
    /// patterns; the earliest declared pattern wins
    pub fn bind_output(&self, requested: &str) -> Option<WildcardBindings> {
        self.outputs
            .iter()
            .find_map(|e| wildcards::match_pattern(e.file.path(), requested))
    }

    /// Substitutes bindings into the output patterns
    ///
    /// Fails with `UnboundWildcard` when a pattern references a wildcard
    /// the bindings do not cover, which happens when a wildcard rule is
    /// requested by name instead of by file.
    pub fn concrete_outputs(
        &self,
        bindings: &WildcardBindings,
    ) -> Result<Vec<IoEntry>, PipelineError> {
        self.substitute_entries(&self.outputs, bindings)
    }

    /// Substitutes bindings into the input patterns
    pub fn concrete_inputs(
        &self,
        bindings: &WildcardBindings,
    ) -> Result<Vec<IoEntry>, PipelineError> {
        self.substitute_entries(&self.inputs, bindings)
    }

    fn substitute_entries(
        &self,
        entries: &[IoEntry],
        bindings: &WildcardBindings,
    ) -> Result<Vec<IoEntry>, PipelineError> {
        entries
            .iter()
            .map(|entry| {
                wildcards::substitute(entry.file.path(), bindings)
                    .map(|path| IoEntry {
                        key: entry.key.clone(),
                        file: entry.file.with_path(path),
                    })
                    .ok_or_else(|| PipelineError::UnboundWildcard {
                        rule: self.name.clone(),
                        pattern: entry.file.path().to_string(),
                    })
            })
            .collect()
    }

    /// Expands a message or action template for one concrete job
    ///
    /// Besides the job's wildcards, templates may reference `{input}`,
    /// `{output}` (space-joined), `{input.key}`, `{output.key}` and
    /// `{threads}`.
    pub fn render_template(
        &self,
        template: &str,
        bindings: &WildcardBindings,
        inputs: &[IoEntry],
        outputs: &[IoEntry],
        threads: usize,
    ) -> Result<String, PipelineError> {
        let mut extended = bindings.clone();
        let join = |entries: &[IoEntry]| {
            entries
                .iter()
                .map(|e| e.file.path().to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        extended.insert("input", join(inputs));
        extended.insert("output", join(outputs));
        extended.insert("threads", threads.to_string());
        for entry in inputs {
            if let Some(key) = &entry.key {
                extended.insert(format!("input.{}", key), entry.file.path());
            }
        }
        for entry in outputs {
            if let Some(key) = &entry.key {
                extended.insert(format!("output.{}", key), entry.file.path());
            }
        }
        wildcards::substitute(template, &extended).ok_or_else(|| PipelineError::UnboundWildcard {
            rule: self.name.clone(),
            pattern: template.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str) -> Rule {
        Rule::new(
            name,
            SourceLocation {
                file: "pipeline.json".to_string(),
                line: 1,
            },
        )
    }

    #[test]
    fn test_check_requires_outputs() {
        let r = rule("empty");
        assert!(r.check().is_err());
    }

    #[test]
    fn test_check_accepts_symmetric_wildcards() {
        let mut r = rule("convert");
        r.set_input(vec![IoEntry::positional("raw/{sample}.csv")]);
        r.set_output(vec![IoEntry::positional("out/{sample}.parquet")]);
        assert!(r.check().is_ok());
    }

    #[test]
    fn test_check_rejects_input_only_wildcard() {
        let mut r = rule("aggregate");
        r.set_input(vec![IoEntry::positional("raw/{batch}.csv")]);
        r.set_output(vec![IoEntry::positional("out/summary.csv")]);
        assert!(matches!(
            r.check(),
            Err(PipelineError::UnboundWildcard { .. })
        ));
    }

    #[test]
    fn test_check_rejects_diverging_output_wildcards() {
        let mut r = rule("split");
        r.set_output(vec![
            IoEntry::positional("out/{a}.left"),
            IoEntry::positional("out/{b}.right"),
        ]);
        assert!(r.check().is_err());
    }

    #[test]
    fn test_is_producer_matches_pattern() {
        let mut r = rule("convert");
        r.set_output(vec![IoEntry::positional("out/{sample}.parquet")]);
        assert!(r.is_producer("out/s1.parquet"));
        assert!(!r.is_producer("out/s1.csv"));
    }

    #[test]
    fn test_bind_output_earliest_pattern_wins() {
        let mut r = rule("multi");
        r.set_output(vec![
            IoEntry::positional("out/{x}.txt"),
            IoEntry::positional("{x}/extra.txt"),
        ]);
        let bindings = r.bind_output("out/a.txt").unwrap();
        assert_eq!(bindings.get("x"), Some("a"));
    }

    #[test]
    fn test_concrete_io_substitution() {
        let mut r = rule("convert");
        r.set_input(vec![IoEntry::positional("raw/{sample}.csv")]);
        r.set_output(vec![IoEntry::positional("out/{sample}.parquet")]);
        let bindings = r.bind_output("out/s1.parquet").unwrap();
        let inputs = r.concrete_inputs(&bindings).unwrap();
        assert_eq!(inputs[0].file.path(), "raw/s1.csv");
    }

    #[test]
    fn test_unbound_output_wildcard_reported() {
        let mut r = rule("convert");
        r.set_output(vec![IoEntry::positional("out/{sample}.parquet")]);
        let err = r.concrete_outputs(&WildcardBindings::new()).unwrap_err();
        assert!(matches!(err, PipelineError::UnboundWildcard { .. }));
    }

    #[test]
    fn test_render_template_builtins() {
        let mut r = rule("convert");
        r.set_input(vec![IoEntry::keyed("raw", "raw/{sample}.csv")]);
        r.set_output(vec![IoEntry::positional("out/{sample}.parquet")]);
        let bindings = r.bind_output("out/s1.parquet").unwrap();
        let inputs = r.concrete_inputs(&bindings).unwrap();
        let outputs = r.concrete_outputs(&bindings).unwrap();
        let rendered = r
            .render_template(
                "convert {input.raw} -> {output} with {threads} threads for {sample}",
                &bindings,
                &inputs,
                &outputs,
                4,
            )
            .unwrap();
        assert_eq!(
            rendered,
            "convert raw/s1.csv -> out/s1.parquet with 4 threads for s1"
        );
    }
}
