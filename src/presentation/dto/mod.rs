pub mod run_report;

pub use run_report::{RuleRuntimeOutput, RunReport, RunSummaryOutput};
