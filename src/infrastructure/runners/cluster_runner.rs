//! Cluster action runner
//!
//! Submits each job's command through a configured submission command
//! (for example `qsub -sync y`) and waits for the submitter to exit. The
//! submitter is responsible for its own synchronisation with the
//! cluster; the engine only observes its exit status.

use std::process::Command;

use tracing::debug;

use crate::domain::errors::PipelineError;
use crate::domain::repositories::action_runner::ActionRunner;

pub struct ClusterRunner {
    submitcmd: String,
}

impl ClusterRunner {
    pub fn new(submitcmd: impl Into<String>) -> Self {
        Self {
            submitcmd: submitcmd.into(),
        }
    }
}

/// Single-quotes a command so the submitter receives it as one argument
fn shell_quote(command: &str) -> String {
    format!("'{}'", command.replace('\'', r"'\''"))
}

impl ActionRunner for ClusterRunner {
    fn run(&self, rule: &str, command: &str) -> Result<(), PipelineError> {
        let submission = format!("{} {}", self.submitcmd, shell_quote(command));
        debug!("submitting rule {} to cluster: {}", rule, submission);
        let status = Command::new("sh")
            .arg("-c")
            .arg(&submission)
            .status()
            .map_err(|error| PipelineError::Action {
                rule: rule.to_string(),
                detail: format!("could not spawn submit command: {}", error),
            })?;
        if status.success() {
            Ok(())
        } else {
            let detail = match status.code() {
                Some(code) => format!("submit command exited with status {}", code),
                None => "submit command terminated by signal".to_string(),
            };
            Err(PipelineError::Action {
                rule: rule.to_string(),
                detail,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submits_command_as_single_argument() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("submitted");
        // "sh -c" as submitter executes the quoted job command locally.
        let runner = ClusterRunner::new("sh -c");
        runner
            .run("make", &format!("echo cluster > {}", out.display()))
            .unwrap();
        assert!(out.exists());
    }

    #[test]
    fn test_quoting_preserves_single_quotes() {
        assert_eq!(shell_quote("echo 'a b'"), r"'echo '\''a b'\'''");
    }

    #[test]
    fn test_failing_submitter_is_reported() {
        let runner = ClusterRunner::new("false");
        let err = runner.run("job", "exit 0").unwrap_err();
        assert!(matches!(err, PipelineError::Action { .. }));
    }
}
