//! "What changed since release X": nodes whose version is newer than a release.

use hbs_core::graph::{NodeGraph, NodeKind};
use hbs_core::version::{CompareOptions, compare_versions};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedNode {
    pub key: String,
    pub kind: NodeKind,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeReport {
    pub since: String,
    /// Nodes with a version newer than `since`, in graph order.
    pub changed: Vec<ChangedNode>,
    /// Keys whose version cannot be ordered against `since`.
    pub incomparable: Vec<String>,
}

/// Collect nodes released (or pending) after `release`. Placeholders are skipped.
pub fn changed_since(graph: &NodeGraph, release: &str, options: &CompareOptions) -> ChangeReport {
    let mut report = ChangeReport {
        since: release.to_string(),
        ..ChangeReport::default()
    };

    for node in graph.nodes().iter().filter(|n| !n.is_placeholder()) {
        match compare_versions(&node.version, release, options) {
            Some(Ordering::Greater) => report.changed.push(ChangedNode {
                key: node.key.clone(),
                kind: node.kind,
                version: node.version.clone(),
            }),
            Some(_) => {}
            None => report.incomparable.push(node.key.clone()),
        }
    }
    report
}
