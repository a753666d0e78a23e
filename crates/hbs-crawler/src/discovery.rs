//! Fragment discovery: walk the project tree and pick out template fragments.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use hbs_core::config::CrawlConfig;
use std::path::{Path, PathBuf};

/// Per-project ignore file, read in addition to `.gitignore`.
pub const IGNORE_FILE: &str = ".hbsignore";

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        builder.add(Glob::new(p).with_context(|| format!("invalid glob {p:?}"))?);
    }
    Ok(Some(builder.build().context("invalid glob set")?))
}

/// Fragment paths relative to `project_root`, in lexicographic order.
///
/// Hidden entries (including the `.hbs/` output directory) are skipped, and
/// `.gitignore` / `.hbsignore` rules are honored.
pub fn discover_fragments(project_root: &Path, crawl: &CrawlConfig) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&crawl.sources)?;
    let exclude_set = build_globset(&crawl.exclude)?;

    let walker = ignore::WalkBuilder::new(project_root)
        .hidden(true)
        .git_ignore(true)
        .add_custom_ignore_filename(IGNORE_FILE)
        .build();

    let mut fragments = Vec::new();
    for entry in walker.flatten() {
        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(crawl.fragment_extension.as_str()) {
            continue;
        }
        let rel = path.strip_prefix(project_root).unwrap_or(path);
        if let Some(ref inc) = include_set
            && !inc.is_match(rel)
        {
            continue;
        }
        if let Some(ref exc) = exclude_set
            && exc.is_match(rel)
        {
            continue;
        }
        fragments.push(rel.to_path_buf());
    }

    fragments.sort();
    tracing::debug!(count = fragments.len(), "fragments discovered");
    Ok(fragments)
}
