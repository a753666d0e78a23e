//! Impact radius: which fragments must be re-tested when one changes.

use hbs_core::graph::{EdgeKind, Node, NodeGraph};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Follow `included_by` / `extended_by`: everything that consumes the origin.
    #[default]
    Dependents,
    /// Follow `includes` / `extends_from`: everything the origin consumes.
    Dependencies,
}

/// A single fragment in the impact set with its path from the origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactEntry {
    pub key: String,
    pub depth: usize,
    /// `(from, edge)` hops from the origin to this entry.
    pub edge_path: Vec<(String, EdgeLabel)>,
    pub version: String,
    pub placeholder: bool,
}

/// Serializable edge label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeLabel {
    Includes,
    Extends,
}

impl From<EdgeKind> for EdgeLabel {
    fn from(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Includes => Self::Includes,
            EdgeKind::Extends => Self::Extends,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactResult {
    pub origin: String,
    pub reachable: Vec<ImpactEntry>,
    pub max_depth_reached: usize,
}

fn neighbors(node: &Node, direction: Direction) -> impl Iterator<Item = (&str, EdgeKind)> {
    let (included, extended) = match direction {
        Direction::Dependents => (&node.included_by, &node.extended_by),
        Direction::Dependencies => (&node.includes, &node.extends_from),
    };
    included
        .iter()
        .map(|k| (k.as_str(), EdgeKind::Includes))
        .chain(extended.iter().map(|k| (k.as_str(), EdgeKind::Extends)))
}

/// Breadth-first walk from `key`, ordered by depth. `None` if `key` is unknown.
pub fn compute_impact(
    graph: &NodeGraph,
    key: &str,
    direction: Direction,
    max_depth: usize,
) -> Option<ImpactResult> {
    graph.get(key)?;

    let mut visited = HashSet::new();
    visited.insert(key.to_string());

    #[allow(clippy::type_complexity)]
    let mut queue: VecDeque<(String, usize, Vec<(String, EdgeLabel)>)> = VecDeque::new();
    queue.push_back((key.to_string(), 0, Vec::new()));

    let mut reachable = Vec::new();
    let mut max_depth_reached = 0;

    while let Some((current, depth, path)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some(node) = graph.get(&current) else {
            continue;
        };

        for (neighbor, kind) in neighbors(node, direction) {
            if !visited.insert(neighbor.to_string()) {
                continue;
            }
            let Some(target) = graph.get(neighbor) else {
                continue;
            };

            let mut new_path = path.clone();
            new_path.push((current.clone(), kind.into()));
            let new_depth = depth + 1;
            max_depth_reached = max_depth_reached.max(new_depth);

            reachable.push(ImpactEntry {
                key: neighbor.to_string(),
                depth: new_depth,
                edge_path: new_path.clone(),
                version: target.version.clone(),
                placeholder: target.is_placeholder(),
            });
            queue.push_back((neighbor.to_string(), new_depth, new_path));
        }
    }

    Some(ImpactResult {
        origin: key.to_string(),
        reachable,
        max_depth_reached,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeGraph {
        let mut graph = NodeGraph::new();
        graph.find_or_create("icon");
        graph.link("button", "icon", EdgeKind::Includes);
        graph.link("card", "button", EdgeKind::Includes);
        graph.link("home", "card", EdgeKind::Includes);
        graph.link("home", "main", EdgeKind::Extends);
        graph.link("about", "main", EdgeKind::Extends);
        graph
    }

    #[test]
    fn test_dependents_walk_back_edges_by_depth() {
        let result = compute_impact(&sample(), "icon", Direction::Dependents, 10).unwrap();
        let keys: Vec<(&str, usize)> = result
            .reachable
            .iter()
            .map(|e| (e.key.as_str(), e.depth))
            .collect();
        assert_eq!(keys, vec![("button", 1), ("card", 2), ("home", 3)]);
        assert_eq!(result.max_depth_reached, 3);
        assert_eq!(
            result.reachable[2].edge_path,
            vec![
                ("icon".to_string(), EdgeLabel::Includes),
                ("button".to_string(), EdgeLabel::Includes),
                ("card".to_string(), EdgeLabel::Includes),
            ]
        );
    }

    #[test]
    fn test_extend_back_edges_are_followed() {
        let result = compute_impact(&sample(), "main", Direction::Dependents, 5).unwrap();
        let keys: Vec<&str> = result.reachable.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["home", "about"]);
        assert_eq!(result.reachable[0].edge_path[0].1, EdgeLabel::Extends);
    }

    #[test]
    fn test_depth_limit() {
        let result = compute_impact(&sample(), "icon", Direction::Dependents, 1).unwrap();
        assert_eq!(result.reachable.len(), 1);
        assert_eq!(result.reachable[0].key, "button");
    }

    #[test]
    fn test_dependencies_direction() {
        let result = compute_impact(&sample(), "home", Direction::Dependencies, 10).unwrap();
        let keys: Vec<&str> = result.reachable.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["card", "main", "button", "icon"]);
        assert!(result.reachable.iter().all(|e| e.placeholder));
    }

    #[test]
    fn test_cycles_terminate() {
        let mut graph = NodeGraph::new();
        graph.find_or_create("a");
        graph.link("a", "b", EdgeKind::Includes);
        graph.link("b", "a", EdgeKind::Includes);
        let result = compute_impact(&graph, "a", Direction::Dependents, 10).unwrap();
        assert_eq!(result.reachable.len(), 1);
    }

    #[test]
    fn test_unknown_origin() {
        assert!(compute_impact(&sample(), "nope", Direction::Dependents, 3).is_none());
    }
}
