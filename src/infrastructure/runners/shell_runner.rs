//! Shell action runner
//!
//! Executes a job's formatted command as a subprocess through `sh -c`,
//! blocking the calling worker thread until the process exits.

use std::process::Command;

use tracing::debug;

use crate::domain::errors::PipelineError;
use crate::domain::repositories::action_runner::ActionRunner;

pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRunner for ShellRunner {
    fn run(&self, rule: &str, command: &str) -> Result<(), PipelineError> {
        debug!("running shell command for rule {}: {}", rule, command);
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .map_err(|error| PipelineError::Action {
                rule: rule.to_string(),
                detail: format!("could not spawn shell: {}", error),
            })?;
        if status.success() {
            Ok(())
        } else {
            let detail = match status.code() {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
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
    fn test_successful_command() {
        let runner = ShellRunner::new();
        assert!(runner.run("noop", "exit 0").is_ok());
    }

    #[test]
    fn test_nonzero_exit_is_reported() {
        let runner = ShellRunner::new();
        let err = runner.run("broken", "exit 3").unwrap_err();
        match err {
            PipelineError::Action { rule, detail } => {
                assert_eq!(rule, "broken");
                assert!(detail.contains("3"));
            }
            other => panic!("expected action error, got {other:?}"),
        }
    }

    #[test]
    fn test_command_side_effect() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("made");
        let runner = ShellRunner::new();
        runner
            .run("make", &format!("echo data > {}", out.display()))
            .unwrap();
        assert!(out.exists());
    }
}
