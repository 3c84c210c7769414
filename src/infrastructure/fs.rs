//! Filesystem primitives
//!
//! Thin wrappers around `std::fs` used by resolution and scheduling.
//! Rebuild decisions are derived purely from this state at run start;
//! nothing else is persisted between runs.

use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::SystemTime;

use crate::domain::value_objects::wildcards;

pub fn exists(path: &str) -> bool {
    Path::new(path).exists()
}

/// Modification time of a file as a UTC timestamp
pub fn mtime(path: &str) -> io::Result<DateTime<Utc>> {
    let meta = std::fs::metadata(path)?;
    Ok(DateTime::<Utc>::from(meta.modified()?))
}

pub fn unlink(path: &str) -> io::Result<()> {
    std::fs::remove_file(path)
}

/// Creates the file if absent and sets its mtime to now
pub fn touch(path: &str) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.set_modified(SystemTime::now())
}

pub fn mkdir_p(path: &str) -> io::Result<()> {
    std::fs::create_dir_all(path)
}

/// Creates the parent directory of a file path if it has one
pub fn ensure_parent_dir(path: &str) -> io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Finds files on disk matching a pattern with `{wildcard}` placeholders
///
/// Used for dynamic outputs, whose concrete names are only known after
/// the producing job has run. The scan starts at the deepest literal
/// directory prefix of the pattern and walks it recursively.
pub fn find_matching(pattern: &str) -> Vec<String> {
    let literal_prefix: &str = match pattern.find('{') {
        Some(brace) => &pattern[..brace],
        None => {
            return if exists(pattern) {
                vec![pattern.to_string()]
            } else {
                Vec::new()
            };
        }
    };
    let root = match literal_prefix.rfind('/') {
        Some(slash) => &literal_prefix[..slash],
        None => ".",
    };
    let mut matches = Vec::new();
    walk(Path::new(root), &mut |path| {
        if wildcards::match_pattern(pattern, path).is_some() {
            matches.push(path.to_string());
        }
    });
    matches.sort();
    matches
}

fn walk(dir: &Path, visit: &mut impl FnMut(&str)) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, visit);
        } else if let Some(p) = path.to_str() {
            visit(p.strip_prefix("./").unwrap_or(p));
        }
    }
}

/// Opens a file for reading
pub fn open(path: &str) -> io::Result<File> {
    File::open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_touch_creates_and_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stamp");
        let path = path.to_str().unwrap();
        assert!(!exists(path));
        touch(path).unwrap();
        assert!(exists(path));
        let first = mtime(path).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        touch(path).unwrap();
        assert!(mtime(path).unwrap() >= first);
    }

    #[test]
    fn test_ensure_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c.txt");
        let nested = nested.to_str().unwrap();
        ensure_parent_dir(nested).unwrap();
        std::fs::File::create(nested).unwrap();
        assert!(exists(nested));
    }

    #[test]
    fn test_find_matching_scans_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_str().unwrap();
        mkdir_p(&format!("{}/out", base)).unwrap();
        for name in ["a.csv", "b.csv", "c.txt"] {
            let mut f = std::fs::File::create(format!("{}/out/{}", base, name)).unwrap();
            writeln!(f, "x").unwrap();
        }
        let found = find_matching(&format!("{}/out/{{part}}.csv", base));
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a.csv"));
        assert!(found[1].ends_with("b.csv"));
    }
}
