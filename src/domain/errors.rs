//! Pipeline error module
//!
//! This module defines the error kinds surfaced by resolution and
//! execution. Resolution failures are collected into a composite so the
//! user sees every problem in one pass instead of one at a time.

use thiserror::Error;

/// Errors raised while resolving targets into jobs or executing them
///
/// Every kind stays distinguishable to the driver; `Composite` carries the
/// aggregated resolution failures for a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A requested file has no producing rule and does not exist on disk
    #[error("no rule produces {file} and the file is not present")]
    MissingRule { file: String },

    /// A rule would run but required inputs are neither present nor producible
    #[error("missing input files for rule {rule}: {}", .files.join(", "))]
    MissingInput { rule: String, files: Vec<String> },

    /// Two or more rules claim the same concrete output file
    #[error("rules {first} and {second} both produce {file}")]
    AmbiguousRule {
        file: String,
        first: String,
        second: String,
    },

    /// The expander revisited a (rule, bindings) pair during recursion
    #[error("cyclic dependency detected involving rule {rule}")]
    CyclicGraph { rule: String },

    /// Duplicate rule name at registration time
    #[error("the name {name} is already used by another rule")]
    CreateRule { name: String },

    /// A target names a rule that does not exist in the workflow
    #[error("there is no rule named {name}")]
    UnknownRule { name: String },

    /// The workflow contains no rules at all
    #[error("the workflow does not define any rules")]
    NoRules,

    /// A job would overwrite an output marked protected
    #[error("output {file} is protected and already exists")]
    ProtectedOutput { file: String },

    /// A declared output is still absent after the action exited successfully
    #[error("rule {rule} finished but did not produce: {}", .files.join(", "))]
    MissingOutput { rule: String, files: Vec<String> },

    /// A rule declares no output patterns at all
    #[error("rule {rule} does not declare any output")]
    NoOutputs { rule: String },

    /// A rule-name target cannot materialise outputs containing wildcards
    #[error("cannot run rule {rule} directly: output pattern {pattern} has unbound wildcards")]
    UnboundWildcard { rule: String, pattern: String },

    /// The job's action failed to spawn or exited with a nonzero status
    #[error("action of rule {rule} failed: {detail}")]
    Action { rule: String, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Container aggregating several resolution failures
    #[error("{}", .errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n"))]
    Composite { errors: Vec<PipelineError> },
}

impl PipelineError {
    /// Folds a list of errors into one, unwrapping a single element
    pub fn composite(mut errors: Vec<PipelineError>) -> PipelineError {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            PipelineError::Composite { errors }
        }
    }

    /// Returns true for errors raised during resolution rather than execution
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingRule { .. }
                | PipelineError::MissingInput { .. }
                | PipelineError::AmbiguousRule { .. }
                | PipelineError::CyclicGraph { .. }
                | PipelineError::UnknownRule { .. }
                | PipelineError::NoRules
                | PipelineError::NoOutputs { .. }
                | PipelineError::UnboundWildcard { .. }
                | PipelineError::Composite { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_unwraps_single_error() {
        let err = PipelineError::composite(vec![PipelineError::NoRules]);
        assert!(matches!(err, PipelineError::NoRules));
    }

    #[test]
    fn test_composite_display_joins_lines() {
        let err = PipelineError::composite(vec![
            PipelineError::MissingRule {
                file: "a.txt".to_string(),
            },
            PipelineError::MissingRule {
                file: "b.txt".to_string(),
            },
        ]);
        let text = err.to_string();
        assert!(text.contains("a.txt"));
        assert!(text.contains("b.txt"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_missing_input_lists_files() {
        let err = PipelineError::MissingInput {
            rule: "clean".to_string(),
            files: vec!["raw/x.csv".to_string(), "raw/y.csv".to_string()],
        };
        assert!(err.to_string().contains("raw/x.csv, raw/y.csv"));
    }
}
