//! Pipeline definition file models
//!
//! Serde models for the JSON pipeline format. A definition carries an
//! optional work directory and a list of rules in declaration order;
//! every rule maps input patterns to output patterns with an optional
//! shell action, message template and thread requirement.

use serde::{Deserialize, Serialize};

use crate::domain::entities::iofile::IoFile;
use crate::domain::entities::rule::IoEntry;

/// Top-level structure of a pipeline definition file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineFile {
    /// Directory to create and enter before running
    #[serde(default)]
    pub workdir: Option<String>,
    pub rules: Vec<RuleSpec>,
}

/// One rule declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    #[serde(default)]
    pub input: Vec<IoSpec>,
    #[serde(default)]
    pub output: Vec<IoSpec>,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub shell: Option<String>,
}

/// An input or output pattern: a bare string, or an object carrying a
/// key and attribute flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IoSpec {
    Plain(String),
    Tagged {
        path: String,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        protected: bool,
        #[serde(default)]
        temp: bool,
        #[serde(default)]
        dynamic: bool,
    },
}

impl IoSpec {
    /// Converts the spec into a rule pattern entry
    pub fn to_entry(&self) -> IoEntry {
        match self {
            IoSpec::Plain(path) => IoEntry::positional(path.as_str()),
            IoSpec::Tagged {
                path,
                key,
                protected,
                temp,
                dynamic,
            } => {
                let mut file = IoFile::new(path.as_str());
                if *protected {
                    file = crate::domain::entities::iofile::protected(file);
                }
                if *temp {
                    file = crate::domain::entities::iofile::temp(file);
                }
                if *dynamic {
                    file = crate::domain::entities::iofile::dynamic(file);
                }
                match key {
                    Some(key) => IoEntry::keyed(key.as_str(), file),
                    None => IoEntry {
                        key: None,
                        file,
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_spec_parses() {
        let spec: IoSpec = serde_json::from_str("\"raw/{sample}.csv\"").unwrap();
        let entry = spec.to_entry();
        assert_eq!(entry.file.path(), "raw/{sample}.csv");
        assert!(entry.key.is_none());
    }

    #[test]
    fn test_tagged_spec_parses_flags() {
        let spec: IoSpec = serde_json::from_str(
            r#"{"path": "out/final.csv", "key": "result", "protected": true, "temp": true}"#,
        )
        .unwrap();
        let entry = spec.to_entry();
        assert_eq!(entry.key.as_deref(), Some("result"));
        assert!(entry.file.is_protected());
        assert!(entry.file.is_temp());
        assert!(!entry.file.is_dynamic());
    }

    #[test]
    fn test_rule_spec_defaults() {
        let spec: RuleSpec =
            serde_json::from_str(r#"{"name": "all", "output": ["report.html"]}"#).unwrap();
        assert!(spec.input.is_empty());
        assert_eq!(spec.output.len(), 1);
        assert!(spec.threads.is_none());
        assert!(spec.shell.is_none());
    }
}
