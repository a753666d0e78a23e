//! Graph data model: one node per template fragment, keyed by base name.

use crate::version::{CompareOptions, NEVER_RELEASED, is_newer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Classification derived from the folder a fragment lives in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Component,
    Layout,
    Page,
    #[default]
    Unclassified,
}

/// A co-located file sharing the fragment's base name (`header.scss` next to `header.hbs`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sibling {
    pub extension: String,
    pub path: PathBuf,
    pub version: String,
}

/// A fragment in the graph. Placeholders have no `path` until their file is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub key: String,
    pub path: Option<PathBuf>,
    pub kind: NodeKind,
    /// Inclusion targets in appearance order, duplicates kept.
    pub includes: Vec<String>,
    pub included_by: Vec<String>,
    pub extends_from: Vec<String>,
    pub extended_by: Vec<String>,
    pub siblings: Vec<Sibling>,
    pub version: String,
}

impl Node {
    /// A fresh placeholder: no path, no edges, never released.
    pub fn placeholder(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            path: None,
            kind: NodeKind::Unclassified,
            includes: Vec::new(),
            included_by: Vec::new(),
            extends_from: Vec::new(),
            extended_by: Vec::new(),
            siblings: Vec::new(),
            version: NEVER_RELEASED.to_string(),
        }
    }

    /// True until the node's defining file has been processed.
    pub fn is_placeholder(&self) -> bool {
        self.path.is_none()
    }
}

/// Directed relationship between two fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Includes,
    Extends,
}

/// Deduplicated node registry. Serializes as a plain array of nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    /// Performance index: key → position in `nodes`.
    /// Rebuilt on load via `rebuild_index()`.
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the key index from the node list.
    /// Returns the keys that appear more than once (the later entry loses the index slot).
    pub fn rebuild_index(&mut self) -> Vec<String> {
        self.index.clear();
        let mut duplicates = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if self.index.contains_key(&node.key) {
                duplicates.push(node.key.clone());
            } else {
                self.index.insert(node.key.clone(), i);
            }
        }
        duplicates
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.index.get(key).map(|&i| &mut self.nodes[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Return the node for `key`, inserting a placeholder when absent.
    /// The flag is true when the node was created by this call.
    pub fn find_or_create(&mut self, key: &str) -> (&mut Node, bool) {
        let (i, created) = match self.index.get(key) {
            Some(&i) => (i, false),
            None => {
                self.nodes.push(Node::placeholder(key));
                let i = self.nodes.len() - 1;
                self.index.insert(key.to_string(), i);
                (i, true)
            }
        };
        (&mut self.nodes[i], created)
    }

    /// Fill in a node's defining file. Placeholders are upgraded in place.
    ///
    /// The version only moves from the sentinel to `version`; a node that already
    /// carries a version keeps it unless `version` is newer.
    pub fn complete(
        &mut self,
        key: &str,
        path: PathBuf,
        kind: NodeKind,
        version: &str,
        options: &CompareOptions,
    ) -> &mut Node {
        let (node, _) = self.find_or_create(key);
        node.path = Some(path);
        node.kind = kind;
        if node.version == NEVER_RELEASED || is_newer(version, &node.version, options) {
            node.version = version.to_string();
        }
        node
    }

    /// Record `source --kind--> target` and its back-edge in one step.
    /// Creates a placeholder for `target` when needed; returns true in that case.
    pub fn link(&mut self, source: &str, target: &str, kind: EdgeKind) -> bool {
        let (target_node, created) = self.find_or_create(target);
        let back = match kind {
            EdgeKind::Includes => &mut target_node.included_by,
            EdgeKind::Extends => &mut target_node.extended_by,
        };
        if !back.iter().any(|k| k == source) {
            back.push(source.to_string());
        }

        let (source_node, _) = self.find_or_create(source);
        match kind {
            EdgeKind::Includes => source_node.includes.push(target.to_string()),
            EdgeKind::Extends => source_node.extends_from.push(target.to_string()),
        }
        created
    }

    /// Iterate forward edges as `(source, target, kind)`, in node order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, EdgeKind)> {
        self.nodes.iter().flat_map(|node| {
            let includes = node
                .includes
                .iter()
                .map(move |t| (node.key.as_str(), t.as_str(), EdgeKind::Includes));
            let extends = node
                .extends_from
                .iter()
                .map(move |t| (node.key.as_str(), t.as_str(), EdgeKind::Extends));
            includes.chain(extends)
        })
    }

    /// Keys of nodes that were referenced but never defined.
    pub fn placeholder_keys(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.is_placeholder())
            .map(|n| n.key.as_str())
            .collect()
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

impl From<Vec<Node>> for NodeGraph {
    fn from(nodes: Vec<Node>) -> Self {
        let mut graph = Self {
            nodes,
            index: HashMap::new(),
        };
        graph.rebuild_index();
        graph
    }
}
