//! Version propagation along include and extend edges.
//!
//! Applied once per edge at the moment the edge is created:
//! - include `A → B`: `B` takes `A`'s version when `A` is newer;
//! - extend `A → B`: with cascading on, `A` takes `B`'s version when `B` is newer.
//!
//! Placeholders are never raised. Incomparable versions leave both sides alone.

use hbs_core::graph::{EdgeKind, Node, NodeGraph};
use hbs_core::version::{CompareOptions, compare_versions};
use std::cmp::Ordering;
use tracing::debug;

/// Result of one propagation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Raised,
    Unchanged,
    /// The versions could not be ordered; nothing was changed.
    Incomparable,
    /// The rule does not apply (cascade off, placeholder, or unknown key).
    Skipped,
}

/// Running totals across a crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    pub raised: usize,
    pub incomparable: usize,
}

#[derive(Debug, Clone)]
pub struct Propagator {
    options: CompareOptions,
    cascade_extend: bool,
    stats: PropagationStats,
}

impl Propagator {
    pub fn new(options: CompareOptions, cascade_extend: bool) -> Self {
        Self {
            options,
            cascade_extend,
            stats: PropagationStats::default(),
        }
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    pub fn stats(&self) -> PropagationStats {
        self.stats
    }

    /// Include rule: the included node is shipped at least as recently as its consumer.
    pub fn on_include(&mut self, graph: &mut NodeGraph, source: &str, target: &str) -> Outcome {
        let Some(candidate) = graph.get(source).map(|n| n.version.clone()) else {
            return Outcome::Skipped;
        };
        match graph.get_mut(target) {
            Some(node) if !node.is_placeholder() => self.raise(node, &candidate),
            _ => Outcome::Skipped,
        }
    }

    /// Extend rule: a specialization inherits its base's newer release.
    pub fn on_extend(&mut self, graph: &mut NodeGraph, source: &str, base: &str) -> Outcome {
        if !self.cascade_extend {
            return Outcome::Skipped;
        }
        let candidate = match graph.get(base) {
            Some(node) if !node.is_placeholder() => node.version.clone(),
            _ => return Outcome::Skipped,
        };
        match graph.get_mut(source) {
            Some(node) if !node.is_placeholder() => self.raise(node, &candidate),
            _ => Outcome::Skipped,
        }
    }

    /// Re-apply both rules over every edge until nothing changes.
    /// Returns the number of raises performed by the closure pass.
    pub fn close_transitively(&mut self, graph: &mut NodeGraph) -> usize {
        let edges: Vec<(String, String, EdgeKind)> = graph
            .edges()
            .map(|(source, target, kind)| (source.to_string(), target.to_string(), kind))
            .collect();

        let mut total = 0;
        loop {
            let mut raised = 0;
            for (source, target, kind) in &edges {
                let outcome = match kind {
                    EdgeKind::Includes => self.on_include(graph, source, target),
                    EdgeKind::Extends => self.on_extend(graph, source, target),
                };
                if outcome == Outcome::Raised {
                    raised += 1;
                }
            }
            total += raised;
            if raised == 0 {
                break;
            }
        }
        debug!(raised = total, "transitive closure settled");
        total
    }

    fn raise(&mut self, node: &mut Node, candidate: &str) -> Outcome {
        match compare_versions(candidate, &node.version, &self.options) {
            Some(Ordering::Greater) => {
                debug!(key = %node.key, from = %node.version, to = candidate, "version raised");
                node.version = candidate.to_string();
                self.stats.raised += 1;
                Outcome::Raised
            }
            Some(_) => Outcome::Unchanged,
            None => {
                debug!(
                    key = %node.key,
                    current = %node.version,
                    candidate,
                    "incomparable versions, propagation skipped"
                );
                self.stats.incomparable += 1;
                Outcome::Incomparable
            }
        }
    }
}
