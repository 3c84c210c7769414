//! IoFile entity module
//!
//! This module defines the path value that flows through rules and jobs.
//! A path optionally carries attribute flags that change how the scheduler
//! treats it: `protected` outputs are never overwritten or deleted, `temp`
//! outputs are removed once all consumers finish, and `dynamic` outputs
//! defer their post-run existence check to a scan of actual files.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Orthogonal, composable attribute flags carried by a path
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct IoFlags {
    pub protected: bool,
    pub temp: bool,
    pub dynamic: bool,
}

/// A filesystem-relative path plus its attribute flags
///
/// Used both for patterns (which may contain `{wildcard}` placeholders)
/// and for the concrete paths of an expanded job; flags survive
/// substitution unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct IoFile {
    path: String,
    #[serde(default)]
    flags: IoFlags,
}

impl IoFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            flags: IoFlags::default(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn flags(&self) -> IoFlags {
        self.flags
    }

    pub fn is_protected(&self) -> bool {
        self.flags.protected
    }

    pub fn is_temp(&self) -> bool {
        self.flags.temp
    }

    pub fn is_dynamic(&self) -> bool {
        self.flags.dynamic
    }

    /// Returns a copy with the same flags but a different path
    ///
    /// Used when substituting wildcard bindings into a pattern.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            flags: self.flags,
        }
    }
}

/// Marks a path as protected: the scheduler refuses to overwrite it
pub fn protected(file: impl Into<IoFile>) -> IoFile {
    let mut file = file.into();
    file.flags.protected = true;
    file
}

/// Marks a path as temporary: deleted once all consumers have finished
pub fn temp(file: impl Into<IoFile>) -> IoFile {
    let mut file = file.into();
    file.flags.temp = true;
    file
}

/// Marks a path as dynamic: its wildcards are resolved by inspecting the
/// filesystem after the producing job has run
pub fn dynamic(file: impl Into<IoFile>) -> IoFile {
    let mut file = file.into();
    file.flags.dynamic = true;
    file
}

impl From<&str> for IoFile {
    fn from(path: &str) -> Self {
        IoFile::new(path)
    }
}

impl From<String> for IoFile {
    fn from(path: String) -> Self {
        IoFile::new(path)
    }
}

impl fmt::Display for IoFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}
