//! Inclusion and extension directive scanning.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Identifiers referenced by a fragment, in appearance order with duplicates kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Directives {
    /// Targets of `{{> IDENT }}`.
    pub includes: Vec<String>,
    /// Targets of `{{#extend "IDENT"}}`.
    pub extends: Vec<String>,
}

impl Directives {
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.extends.is_empty()
    }
}

fn include_re() -> &'static Regex {
    static INCLUDE_RE: OnceLock<Regex> = OnceLock::new();
    INCLUDE_RE.get_or_init(|| Regex::new(r"\{\{>\s*([\w-]+)\s*\}\}").unwrap())
}

fn extend_re() -> &'static Regex {
    static EXTEND_RE: OnceLock<Regex> = OnceLock::new();
    EXTEND_RE.get_or_init(|| Regex::new(r#"\{\{#extend\s+"([\w-]+)"\}\}"#).unwrap())
}

/// Collect every inclusion and extension target in `source`.
///
/// Malformed directives simply fail to match.
pub fn extract_directives(source: &str) -> Directives {
    Directives {
        includes: captures(include_re(), source),
        extends: captures(extend_re(), source),
    }
}

fn captures(re: &Regex, source: &str) -> Vec<String> {
    re.captures_iter(source)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
