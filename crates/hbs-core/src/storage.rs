//! Read/write graph documents from disk.

use crate::graph::NodeGraph;
use crate::schema;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const HBS_DIR: &str = ".hbs";
const GRAPH_FILE: &str = "graph.json";

/// Get the path to the working directory for a given project root.
pub fn hbs_dir(project_root: &Path) -> PathBuf {
    project_root.join(HBS_DIR)
}

/// Default graph location for a project root.
pub fn default_graph_file(project_root: &Path) -> PathBuf {
    hbs_dir(project_root).join(GRAPH_FILE)
}

/// Load a graph document.
pub fn load(path: &Path) -> Result<NodeGraph> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph from {}", path.display()))?;
    schema::from_json(&json)
}

/// Load a graph document without rejecting duplicate keys, for integrity checks.
pub fn load_unchecked(path: &Path) -> Result<NodeGraph> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph from {}", path.display()))?;
    schema::from_json_lenient(&json)
}

/// Save a graph document, creating parent directories if needed.
pub fn save(path: &Path, graph: &NodeGraph) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }

    let json = schema::to_json(graph)?;
    fs::write(path, json).with_context(|| format!("failed to write graph to {}", path.display()))?;
    tracing::debug!(path = %path.display(), nodes = graph.len(), "graph saved");

    Ok(())
}
