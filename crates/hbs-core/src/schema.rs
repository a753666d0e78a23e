//! JSON encoding of the output document: an array of node records.

use crate::graph::NodeGraph;
use anyhow::{Context, Result};

/// Serialize a graph to a pretty-printed JSON array.
pub fn to_json(graph: &NodeGraph) -> Result<String> {
    serde_json::to_string_pretty(graph).context("failed to serialize graph to JSON")
}

/// Deserialize a graph and rebuild its key index, rejecting duplicate keys.
pub fn from_json(json: &str) -> Result<NodeGraph> {
    let mut graph = from_json_lenient(json)?;
    let duplicates = graph.rebuild_index();
    if !duplicates.is_empty() {
        anyhow::bail!("graph contains duplicate keys: {}", duplicates.join(", "));
    }
    Ok(graph)
}

/// Deserialize a graph as written, keeping duplicate records. The index
/// points at the first record for each key.
pub fn from_json_lenient(json: &str) -> Result<NodeGraph> {
    let mut graph: NodeGraph =
        serde_json::from_str(json).context("failed to deserialize graph from JSON")?;
    graph.rebuild_index();
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeKind;

    #[test]
    fn test_json_is_a_plain_array() {
        let mut graph = NodeGraph::new();
        graph.find_or_create("page");
        graph.link("page", "header", EdgeKind::Includes);

        let json = to_json(&graph).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["key"], "page");
        assert_eq!(records[1]["included_by"][0], "page");
        assert!(records[1]["path"].is_null());
        assert_eq!(records[1]["version"], "0");
        assert_eq!(records[1]["kind"], "unclassified");
    }

    #[test]
    fn test_from_json_rebuilds_index() {
        let mut graph = NodeGraph::new();
        graph.find_or_create("page");
        graph.link("page", "header", EdgeKind::Includes);

        let loaded = from_json(&to_json(&graph).unwrap()).unwrap();
        assert_eq!(loaded.get("header").unwrap().included_by, vec!["page"]);
    }

    #[test]
    fn test_from_json_rejects_duplicate_keys() {
        let json = r#"[
            {"key": "a", "path": null, "kind": "page", "includes": [], "included_by": [],
             "extends_from": [], "extended_by": [], "siblings": [], "version": "0"},
            {"key": "a", "path": null, "kind": "page", "includes": [], "included_by": [],
             "extends_from": [], "extended_by": [], "siblings": [], "version": "0"}
        ]"#;
        let err = from_json(json).unwrap_err();
        assert!(err.to_string().contains("duplicate keys"));

        let raw = from_json_lenient(json).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.get("a").unwrap().kind, crate::graph::NodeKind::Page);
    }
}
