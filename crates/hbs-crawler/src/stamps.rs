//! Change stamping: map every file path to the release that last touched it.
//!
//! Consecutive releases are diffed pairwise (the first against an empty
//! snapshot), then the latest release is diffed against the integration branch
//! tip and those paths get an in-progress stamp. Diffs run concurrently on
//! blocking tasks but are applied strictly in release order, so later releases
//! overwrite earlier ones.

use crate::history::{HistoryError, HistoryProvider, Snapshot};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use hbs_core::config::{HistoryConfig, ReleaseOrder};
use hbs_core::version::{NEVER_RELEASED, pending_stamp};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Stamping parameters, usually taken from [`HistoryConfig`].
#[derive(Debug, Clone)]
pub struct StampOptions {
    pub integration_branch: String,
    pub pending_suffix: String,
    pub release_order: ReleaseOrder,
    pub concurrency: usize,
}

impl StampOptions {
    pub fn from_config(history: &HistoryConfig) -> Self {
        Self {
            integration_branch: history.integration_branch.clone(),
            pending_suffix: history.pending_suffix.clone(),
            release_order: history.release_order,
            concurrency: history.diff_concurrency.max(1),
        }
    }
}

/// Path → release that last changed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StampMap {
    stamps: BTreeMap<PathBuf, String>,
    /// Releases in the order they were applied.
    releases: Vec<String>,
}

impl StampMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp every path in `paths`, overwriting earlier stamps.
    pub fn record<I>(&mut self, paths: I, stamp: &str)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for path in paths {
            debug!(path = %path.display(), stamp, "stamped");
            self.stamps.insert(path, stamp.to_string());
        }
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.stamps.get(path).map(String::as_str)
    }

    /// The stamp for `path`, or the never-released sentinel.
    pub fn version_for(&self, path: &Path) -> &str {
        self.get(path).unwrap_or(NEVER_RELEASED)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.stamps
            .iter()
            .map(|(path, stamp)| (path.as_path(), stamp.as_str()))
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn releases(&self) -> &[String] {
        &self.releases
    }
}

/// One diff request: paths changed between `from` and `to` get `stamp`.
#[derive(Debug, Clone)]
struct DiffJob {
    from: Option<Snapshot>,
    to: Snapshot,
    stamp: String,
}

/// Run a provider call on the blocking pool.
async fn blocking<T, F>(provider: &Arc<dyn HistoryProvider>, f: F) -> Result<T, HistoryError>
where
    T: Send + 'static,
    F: FnOnce(&dyn HistoryProvider) -> Result<T, HistoryError> + Send + 'static,
{
    let provider = Arc::clone(provider);
    tokio::task::spawn_blocking(move || f(provider.as_ref()))
        .await
        .map_err(|e| HistoryError::Task(e.to_string()))?
}

/// Order resolved releases before pairing them up.
pub fn order_releases(
    mut releases: Vec<(String, Snapshot)>,
    order: ReleaseOrder,
) -> Vec<(String, Snapshot)> {
    match order {
        ReleaseOrder::Listing => {}
        ReleaseOrder::Chronological => {
            releases.sort_by_key(|(_, snapshot)| (snapshot.time.is_none(), snapshot.time));
        }
        ReleaseOrder::Semver => {
            let (mut parsed, unparsed): (Vec<_>, Vec<_>) = releases
                .into_iter()
                .map(|(name, snapshot)| (parse_semver(&name), name, snapshot))
                .partition(|(version, _, _)| version.is_some());
            parsed.sort_by(|a, b| a.0.cmp(&b.0));
            releases = parsed
                .into_iter()
                .chain(unparsed)
                .map(|(_, name, snapshot)| (name, snapshot))
                .collect();
        }
    }
    releases
}

fn parse_semver(name: &str) -> Option<semver::Version> {
    let bare = name
        .strip_prefix('v')
        .or_else(|| name.strip_prefix('V'))
        .unwrap_or(name);
    semver::Version::parse(bare).ok()
}

/// Build the path → stamp map from release history.
///
/// Any failure to list, resolve or diff is fatal: a partial map would seed
/// wrong versions into every node.
pub async fn stamp_changes(
    provider: Arc<dyn HistoryProvider>,
    options: &StampOptions,
) -> Result<StampMap, HistoryError> {
    let concurrency = options.concurrency.max(1);

    let names = blocking(&provider, |p| p.list_releases()).await?;
    info!(releases = names.len(), "listed releases");

    let resolve_all = stream::iter(names)
        .map(|name| {
            blocking(&provider, move |p| {
                p.resolve_release(&name).map(|snapshot| (name, snapshot))
            })
        })
        .buffered(concurrency)
        .try_collect::<Vec<_>>();
    let branch = options.integration_branch.clone();
    let resolve_tip = blocking(&provider, move |p| p.resolve_branch_tip(&branch));
    let (resolved, tip) = tokio::try_join!(resolve_all, resolve_tip)?;

    let releases = order_releases(resolved, options.release_order);

    let mut jobs: Vec<DiffJob> = Vec::with_capacity(releases.len() + 1);
    let mut previous: Option<&Snapshot> = None;
    for (name, snapshot) in &releases {
        jobs.push(DiffJob {
            from: previous.cloned(),
            to: snapshot.clone(),
            stamp: name.clone(),
        });
        previous = Some(snapshot);
    }
    let last_release = releases.last().map(|(name, _)| name.as_str());
    jobs.push(DiffJob {
        from: previous.cloned(),
        to: tip,
        stamp: pending_stamp(last_release, &options.pending_suffix),
    });

    // `buffered` yields results in submission order regardless of which
    // diff finishes first.
    let diffs: Vec<(String, BTreeSet<PathBuf>)> = stream::iter(jobs)
        .map(|job| {
            blocking(&provider, move |p| {
                p.diff(job.from.as_ref(), &job.to)
                    .map(|paths| (job.stamp, paths))
            })
        })
        .buffered(concurrency)
        .try_collect()
        .await?;

    let mut map = StampMap::new();
    for (stamp, paths) in diffs {
        info!(stamp = %stamp, changed = paths.len(), "applying release diff");
        map.record(paths, &stamp);
    }
    map.releases = releases.into_iter().map(|(name, _)| name).collect();

    Ok(map)
}
