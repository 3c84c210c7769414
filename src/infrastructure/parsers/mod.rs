pub mod pipeline_models;
pub mod pipeline_parser;

pub use pipeline_models::{IoSpec, PipelineFile, RuleSpec};
pub use pipeline_parser::{IncludeSummary, PipelineParser};
