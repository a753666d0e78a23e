//! Structural integrity checks for a loaded graph.

use hbs_core::graph::{EdgeKind, Node, NodeGraph};
use serde::Serialize;
use std::collections::HashSet;

/// Minimum normalized Levenshtein similarity for a key to be suggested.
const SUGGESTION_THRESHOLD: f64 = 0.6;
const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum Issue {
    /// Two records share a key. Only seen through `storage::load_unchecked`.
    DuplicateKey {
        key: String,
    },
    /// A forward edge points at a key with no node.
    UnknownTarget {
        source: String,
        target: String,
    },
    /// A forward edge whose target does not list the source back.
    MissingBackEdge {
        source: String,
        target: String,
        edge: &'static str,
    },
    /// A back-edge with no matching forward edge on the claimed source.
    StrayBackEdge {
        node: String,
        claimed_source: String,
        edge: &'static str,
    },
    /// Referenced but never defined. Usually a typo or a deleted fragment.
    Dangling {
        key: String,
        referenced_by: Vec<String>,
        suggestions: Vec<String>,
    },
}

impl Issue {
    /// Dangling references are expected output, everything else is corruption.
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Dangling { .. })
    }
}

fn edge_name(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Includes => "includes",
        EdgeKind::Extends => "extends",
    }
}

fn forward(node: &Node, kind: EdgeKind) -> &[String] {
    match kind {
        EdgeKind::Includes => &node.includes,
        EdgeKind::Extends => &node.extends_from,
    }
}

fn backward(node: &Node, kind: EdgeKind) -> &[String] {
    match kind {
        EdgeKind::Includes => &node.included_by,
        EdgeKind::Extends => &node.extended_by,
    }
}

/// Closest real keys to `key`, best first.
pub fn suggest_keys(graph: &NodeGraph, key: &str) -> Vec<String> {
    let mut scored: Vec<(f64, &str)> = graph
        .nodes()
        .iter()
        .filter(|n| !n.is_placeholder() && n.key != key)
        .map(|n| (strsim::normalized_levenshtein(key, &n.key), n.key.as_str()))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, k)| k.to_string())
        .collect()
}

/// Check every node and edge; issues are listed in graph order.
pub fn validate(graph: &NodeGraph) -> Vec<Issue> {
    let mut issues = Vec::new();

    let mut seen = HashSet::new();
    for node in graph.nodes() {
        if !seen.insert(node.key.as_str()) {
            issues.push(Issue::DuplicateKey {
                key: node.key.clone(),
            });
        }
    }

    for node in graph.nodes() {
        for kind in [EdgeKind::Includes, EdgeKind::Extends] {
            for target in forward(node, kind) {
                match graph.get(target) {
                    None => issues.push(Issue::UnknownTarget {
                        source: node.key.clone(),
                        target: target.clone(),
                    }),
                    Some(t) if !backward(t, kind).contains(&node.key) => {
                        issues.push(Issue::MissingBackEdge {
                            source: node.key.clone(),
                            target: target.clone(),
                            edge: edge_name(kind),
                        });
                    }
                    Some(_) => {}
                }
            }
            for claimed in backward(node, kind) {
                let matched = graph
                    .get(claimed)
                    .is_some_and(|s| forward(s, kind).contains(&node.key));
                if !matched {
                    issues.push(Issue::StrayBackEdge {
                        node: node.key.clone(),
                        claimed_source: claimed.clone(),
                        edge: edge_name(kind),
                    });
                }
            }
        }

        if node.is_placeholder() {
            issues.push(Issue::Dangling {
                key: node.key.clone(),
                referenced_by: node
                    .included_by
                    .iter()
                    .chain(&node.extended_by)
                    .cloned()
                    .collect(),
                suggestions: suggest_keys(graph, &node.key),
            });
        }
    }

    issues
}
