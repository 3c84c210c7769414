use crate::domain::errors::PipelineError;

#[cfg(test)]
use mockall::automock;

/// Executes one job's formatted command, blocking until it finishes.
/// Implementations decide what "execute" means: a local subprocess, or a
/// submission to an external cluster that is awaited to completion.
#[cfg_attr(test, automock)]
pub trait ActionRunner: Send + Sync {
    fn run(&self, rule: &str, command: &str) -> Result<(), PipelineError>;
}
