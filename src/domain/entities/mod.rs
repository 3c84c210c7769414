pub mod iofile;
pub mod job;
pub mod rule;
pub mod workflow;

pub use iofile::{dynamic, protected, temp, IoFile, IoFlags};
pub use job::{Job, JobArena, JobId};
pub use rule::{IoEntry, Rule, SourceLocation};
pub use workflow::{RuleRuntime, Workflow};
