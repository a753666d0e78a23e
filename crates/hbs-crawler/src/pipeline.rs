//! Two-phase crawl: stamp every path from release history, then build the
//! graph one fragment at a time.
//!
//! Phase 2 is a single writer. Fragments are visited in discovery order and
//! each one is fully applied (node, edges, propagation, siblings) before the
//! next is read, because propagation results depend on visiting order.

use crate::discovery::discover_fragments;
use crate::history::HistoryProvider;
use crate::propagation::Propagator;
use crate::siblings::{fold_sibling_versions, resolve_siblings};
use crate::stamps::{StampMap, StampOptions, stamp_changes};
use anyhow::{Context, Result};
use hbs_core::config::HbsConfig;
use hbs_core::graph::{EdgeKind, NodeGraph};
use hbs_core::version::CompareOptions;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Summary of a graph build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Fragments read and applied to the graph.
    pub processed: usize,
    /// Fragments that could not be read and were left out.
    pub skipped: Vec<PathBuf>,
    /// Keys defined by more than one fragment file.
    pub duplicate_keys: Vec<String>,
    /// Nodes that were referenced but never defined.
    pub placeholders: usize,
    /// Versions raised by edge propagation, including the closure pass.
    pub raised: usize,
    /// Propagations skipped because the versions could not be ordered.
    pub incomparable: usize,
    /// Versions raised by the transitive closure pass alone.
    pub closure_raised: usize,
}

/// Progress notifications for callers that draw a UI.
#[derive(Debug, Clone, Copy)]
pub enum CrawlEvent<'a> {
    Stamped { paths: usize, releases: usize },
    Discovered(usize),
    Processed(&'a Path),
}

/// Everything a crawl produces.
#[derive(Debug, Clone)]
pub struct CrawlOutput {
    pub graph: NodeGraph,
    pub stamps: StampMap,
    pub report: BuildReport,
}

/// Location of `project_root` inside the history root, used to translate
/// project-relative fragment paths into the paths history reports.
///
/// Empty when the project is the history root or lies outside it.
pub fn history_prefix(project_root: &Path, history_root: &Path) -> PathBuf {
    let root = project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf());
    let history = history_root
        .canonicalize()
        .unwrap_or_else(|_| history_root.to_path_buf());
    root.strip_prefix(&history)
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Builds the node graph from stamped fragments.
pub struct GraphBuilder<'a> {
    project_root: PathBuf,
    config: &'a HbsConfig,
    stamps: &'a StampMap,
    history_prefix: PathBuf,
    graph: NodeGraph,
    propagator: Propagator,
    report: BuildReport,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(project_root: &Path, config: &'a HbsConfig, stamps: &'a StampMap) -> Self {
        let options =
            CompareOptions::from_config(&config.versions, &config.history.pending_suffix);
        Self {
            project_root: project_root.to_path_buf(),
            config,
            stamps,
            history_prefix: PathBuf::new(),
            graph: NodeGraph::new(),
            propagator: Propagator::new(options, config.versions.cascade_extend_version),
            report: BuildReport::default(),
        }
    }

    #[must_use]
    pub fn with_history_prefix(mut self, prefix: PathBuf) -> Self {
        self.history_prefix = prefix;
        self
    }

    fn stamp_of(&self, rel: &Path) -> &'a str {
        let stamps: &'a StampMap = self.stamps;
        stamps.version_for(&self.history_prefix.join(rel))
    }

    /// Apply one fragment (path relative to the project root).
    /// Returns false when the file was skipped.
    pub fn process_fragment(&mut self, rel: &Path) -> bool {
        let source = match std::fs::read_to_string(self.project_root.join(rel)) {
            Ok(source) => source,
            Err(e) => {
                warn!(path = %rel.display(), error = %e, "fragment not readable, skipping");
                self.report.skipped.push(rel.to_path_buf());
                return false;
            }
        };
        let Some(key) = rel.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            warn!(path = %rel.display(), "fragment has no usable name, skipping");
            self.report.skipped.push(rel.to_path_buf());
            return false;
        };

        if let Some(existing) = self.graph.get(&key).and_then(|n| n.path.as_deref())
            && existing != rel
        {
            warn!(
                key = %key,
                first = %existing.display(),
                second = %rel.display(),
                "fragment key defined twice, later file wins"
            );
            self.report.duplicate_keys.push(key.clone());
        }

        let kind = self.config.crawl.classify(rel);
        let stamp = self.stamp_of(rel);
        self.graph.complete(
            &key,
            rel.to_path_buf(),
            kind,
            stamp,
            self.propagator.options(),
        );

        let directives = hbs_parser::extract_directives(&source);
        for target in &directives.includes {
            self.graph.link(&key, target, EdgeKind::Includes);
            self.propagator.on_include(&mut self.graph, &key, target);
        }
        for base in &directives.extends {
            self.graph.link(&key, base, EdgeKind::Extends);
            self.propagator.on_extend(&mut self.graph, &key, base);
        }

        let stamps = self.stamps;
        let prefix = &self.history_prefix;
        let siblings = resolve_siblings(
            &self.project_root,
            rel,
            &self.config.crawl.same_name_dependencies,
            |path| stamps.version_for(&prefix.join(path)),
        );
        if let Some(node) = self.graph.get_mut(&key) {
            node.siblings = siblings;
            fold_sibling_versions(node, self.propagator.options());
        }

        self.report.processed += 1;
        true
    }

    /// Run the optional closure pass and hand back the graph.
    pub fn finish(mut self) -> (NodeGraph, BuildReport) {
        if self.config.versions.transitive_closure {
            self.report.closure_raised = self.propagator.close_transitively(&mut self.graph);
        }
        let stats = self.propagator.stats();
        self.report.raised = stats.raised;
        self.report.incomparable = stats.incomparable;
        self.report.placeholders = self.graph.placeholder_keys().len();
        (self.graph, self.report)
    }
}

/// Stamp releases, discover fragments, and build the graph.
///
/// Stamping and discovery run concurrently; no node is created until both
/// have finished. Any history failure aborts the crawl.
pub async fn crawl<F>(
    project_root: &Path,
    config: &HbsConfig,
    provider: Arc<dyn HistoryProvider>,
    prefix: PathBuf,
    mut on_event: F,
) -> Result<CrawlOutput>
where
    F: FnMut(CrawlEvent<'_>),
{
    let options = StampOptions::from_config(&config.history);
    let stamping = async {
        stamp_changes(provider, &options)
            .await
            .context("failed to stamp release history")
    };
    let discovery = {
        let root = project_root.to_path_buf();
        let crawl = config.crawl.clone();
        async move {
            tokio::task::spawn_blocking(move || discover_fragments(&root, &crawl))
                .await
                .context("fragment discovery task failed")?
        }
    };
    let (stamps, fragments) = tokio::try_join!(stamping, discovery)?;

    info!(
        paths = stamps.len(),
        releases = stamps.releases().len(),
        "release stamping complete"
    );
    on_event(CrawlEvent::Stamped {
        paths: stamps.len(),
        releases: stamps.releases().len(),
    });
    on_event(CrawlEvent::Discovered(fragments.len()));

    let mut builder = GraphBuilder::new(project_root, config, &stamps).with_history_prefix(prefix);
    for rel in &fragments {
        builder.process_fragment(rel);
        on_event(CrawlEvent::Processed(rel));
    }
    let (graph, report) = builder.finish();

    info!(
        nodes = graph.len(),
        processed = report.processed,
        skipped = report.skipped.len(),
        placeholders = report.placeholders,
        "graph built"
    );
    Ok(CrawlOutput {
        graph,
        stamps,
        report,
    })
}
