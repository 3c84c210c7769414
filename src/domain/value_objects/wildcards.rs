//! Wildcard bindings value object module
//!
//! This module implements `{name}` placeholder matching and substitution
//! for input and output patterns. A binding maps each placeholder name to
//! the literal substring it matched in a concrete path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Map from wildcard name to the literal substring it was bound to
///
/// Bindings are derived by matching a concrete path against a pattern.
/// The same name appearing several times in one pattern, or across the
/// input and output patterns of a rule, always denotes the same binding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WildcardBindings(BTreeMap<String, String>);

impl WildcardBindings {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|s| s.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for WildcardBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// One lexical element of a pattern
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    Wildcard(String),
}

/// Splits a pattern into literal and wildcard tokens
///
/// Returns None for malformed patterns (unbalanced or empty braces).
fn tokenize(pattern: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return None,
                        Some(c) => name.push(c),
                    }
                }
                if name.is_empty() {
                    return None;
                }
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Wildcard(name));
            }
            '}' => return None,
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Some(tokens)
}

/// Extracts the wildcard names appearing in a pattern, in order
pub fn wildcard_names(pattern: &str) -> Vec<String> {
    match tokenize(pattern) {
        Some(tokens) => tokens
            .into_iter()
            .filter_map(|t| match t {
                Token::Wildcard(name) => Some(name),
                Token::Literal(_) => None,
            })
            .collect(),
        None => Vec::new(),
    }
}

/// Returns true if the pattern contains at least one wildcard
pub fn has_wildcards(pattern: &str) -> bool {
    !wildcard_names(pattern).is_empty()
}

/// Matches a concrete path against a pattern, anchored at both ends
///
/// Each wildcard matches a non-empty substring; matching is deterministic,
/// taking the shortest candidate for each wildcard before backtracking.
/// A name bound earlier in the pattern must match the same substring again.
pub fn match_pattern(pattern: &str, path: &str) -> Option<WildcardBindings> {
    let tokens = tokenize(pattern)?;
    let mut bindings = BTreeMap::new();
    if match_tokens(&tokens, path, &mut bindings) {
        Some(WildcardBindings(bindings))
    } else {
        None
    }
}

fn match_tokens(tokens: &[Token], path: &str, bindings: &mut BTreeMap<String, String>) -> bool {
    let Some((first, rest)) = tokens.split_first() else {
        return path.is_empty();
    };
    match first {
        Token::Literal(lit) => match path.strip_prefix(lit.as_str()) {
            Some(remainder) => match_tokens(rest, remainder, bindings),
            None => false,
        },
        Token::Wildcard(name) => {
            if let Some(bound) = bindings.get(name) {
                // Re-occurrence of an already bound name must repeat its value.
                let bound = bound.clone();
                return match path.strip_prefix(bound.as_str()) {
                    Some(remainder) => match_tokens(rest, remainder, bindings),
                    None => false,
                };
            }
            for end in 1..=path.len() {
                if !path.is_char_boundary(end) {
                    continue;
                }
                let (candidate, remainder) = path.split_at(end);
                bindings.insert(name.clone(), candidate.to_string());
                if match_tokens(rest, remainder, bindings) {
                    return true;
                }
                bindings.remove(name);
            }
            false
        }
    }
}

/// Substitutes bindings into a pattern, failing on an unbound wildcard
///
/// Returns None when the pattern is malformed or references a wildcard
/// that has no binding.
pub fn substitute(pattern: &str, bindings: &WildcardBindings) -> Option<String> {
    let tokens = tokenize(pattern)?;
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Literal(lit) => out.push_str(&lit),
            Token::Wildcard(name) => out.push_str(bindings.get(&name)?),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_single_wildcard() {
        let bindings = match_pattern("data/{sample}.csv", "data/2026-01.csv").unwrap();
        assert_eq!(bindings.get("sample"), Some("2026-01"));
    }

    #[test]
    fn test_match_multiple_wildcards() {
        let bindings = match_pattern("{region}/{day}.json", "eu/monday.json").unwrap();
        assert_eq!(bindings.get("region"), Some("eu"));
        assert_eq!(bindings.get("day"), Some("monday"));
    }

    #[test]
    fn test_match_is_anchored() {
        assert!(match_pattern("out/{x}.txt", "prefix/out/a.txt").is_none());
        assert!(match_pattern("out/{x}.txt", "out/a.txt.bak").is_none());
    }

    #[test]
    fn test_wildcard_requires_nonempty_match() {
        assert!(match_pattern("{x}.txt", ".txt").is_none());
    }

    #[test]
    fn test_repeated_name_must_agree() {
        assert!(match_pattern("{x}/{x}.txt", "a/a.txt").is_some());
        assert!(match_pattern("{x}/{x}.txt", "a/b.txt").is_none());
    }

    #[test]
    fn test_literal_pattern_matches_itself_only() {
        assert!(match_pattern("report.html", "report.html").is_some());
        assert!(match_pattern("report.html", "report.json").is_none());
    }

    #[test]
    fn test_malformed_pattern_rejected() {
        assert!(match_pattern("data/{x.csv", "data/a.csv").is_none());
        assert!(match_pattern("data/{}.csv", "data/a.csv").is_none());
    }

    #[test]
    fn test_substitute_known_bindings() {
        let mut bindings = WildcardBindings::new();
        bindings.insert("sample", "s1");
        assert_eq!(
            substitute("out/{sample}.parquet", &bindings),
            Some("out/s1.parquet".to_string())
        );
    }

    #[test]
    fn test_substitute_unbound_fails() {
        let bindings = WildcardBindings::new();
        assert_eq!(substitute("out/{sample}.parquet", &bindings), None);
    }

    #[test]
    fn test_wildcard_names_in_order() {
        assert_eq!(wildcard_names("{a}/{b}/{a}.txt"), vec!["a", "b", "a"]);
    }
}
