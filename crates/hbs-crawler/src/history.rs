//! Release history access: tags, branch tips and tree diffs.
//!
//! [`HistoryProvider`] is the seam between stamping and version control.
//! [`GitHistory`] backs it with git2; [`MemoryHistory`] is an in-memory
//! provider for tests and dry runs.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Errors from the history provider. All of them abort stamping.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("failed to open history at {path}: {source}")]
    Open {
        path: PathBuf,
        source: git2::Error,
    },
    #[error("failed to list releases in {path}: {source}")]
    List {
        path: PathBuf,
        source: git2::Error,
    },
    #[error("release '{name}' cannot be resolved to a snapshot: {source}")]
    UnresolvedRelease { name: String, source: git2::Error },
    #[error("branch '{name}' cannot be resolved to a snapshot: {source}")]
    UnresolvedBranch { name: String, source: git2::Error },
    #[error("failed to diff {from} against {to}: {source}")]
    Diff {
        from: String,
        to: String,
        source: git2::Error,
    },
    #[error("unknown {what} '{name}'")]
    Unknown { what: &'static str, name: String },
    #[error("history task failed: {0}")]
    Task(String),
}

/// A resolved point in history that can be diffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Provider-specific tree identifier.
    pub id: String,
    /// Commit time of the snapshot, when the provider knows it.
    pub time: Option<DateTime<Utc>>,
}

/// Source of releases and file-level changes between them.
pub trait HistoryProvider: Send + Sync {
    /// Release identifiers in the provider's listing order.
    fn list_releases(&self) -> Result<Vec<String>, HistoryError>;

    fn resolve_release(&self, name: &str) -> Result<Snapshot, HistoryError>;

    fn resolve_branch_tip(&self, name: &str) -> Result<Snapshot, HistoryError>;

    /// Paths that differ between `from` and `to`. With no `from`, every path in `to`.
    fn diff(&self, from: Option<&Snapshot>, to: &Snapshot)
    -> Result<BTreeSet<PathBuf>, HistoryError>;
}

// ---------------------------------------------------------------------------
// git2
// ---------------------------------------------------------------------------

/// Git-backed history. Each call opens its own repository handle so diffs can
/// run on separate blocking tasks.
#[derive(Debug, Clone)]
pub struct GitHistory {
    root: PathBuf,
    workdir: Option<PathBuf>,
}

impl GitHistory {
    /// Open the repository at `root`, failing early if it is not one.
    pub fn open(root: &Path) -> Result<Self, HistoryError> {
        let repo = git2::Repository::open(root).map_err(|source| HistoryError::Open {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            workdir: repo.workdir().map(Path::to_path_buf),
        })
    }

    /// Working tree root, absent for bare repositories.
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    fn repo(&self) -> Result<git2::Repository, HistoryError> {
        git2::Repository::open(&self.root).map_err(|source| HistoryError::Open {
            path: self.root.clone(),
            source,
        })
    }
}

fn snapshot_of(commit: &git2::Commit<'_>) -> Snapshot {
    Snapshot {
        id: commit.tree_id().to_string(),
        time: DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0),
    }
}

fn find_tree<'r>(
    repo: &'r git2::Repository,
    snapshot: &Snapshot,
) -> Result<git2::Tree<'r>, git2::Error> {
    let oid = git2::Oid::from_str(&snapshot.id)?;
    repo.find_tree(oid)
}

impl HistoryProvider for GitHistory {
    fn list_releases(&self) -> Result<Vec<String>, HistoryError> {
        let repo = self.repo()?;
        let tags = repo.tag_names(None).map_err(|source| HistoryError::List {
            path: self.root.clone(),
            source,
        })?;
        Ok(tags.iter().flatten().map(str::to_string).collect())
    }

    fn resolve_release(&self, name: &str) -> Result<Snapshot, HistoryError> {
        let repo = self.repo()?;
        // Peeling handles both annotated and lightweight tags.
        let commit = repo
            .revparse_single(&format!("refs/tags/{name}"))
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|source| HistoryError::UnresolvedRelease {
                name: name.to_string(),
                source,
            })?;
        Ok(snapshot_of(&commit))
    }

    fn resolve_branch_tip(&self, name: &str) -> Result<Snapshot, HistoryError> {
        let repo = self.repo()?;
        let branch = repo
            .find_branch(name, git2::BranchType::Local)
            .or_else(|_| repo.find_branch(&format!("origin/{name}"), git2::BranchType::Remote))
            .map_err(|source| HistoryError::UnresolvedBranch {
                name: name.to_string(),
                source,
            })?;
        let commit =
            branch
                .get()
                .peel_to_commit()
                .map_err(|source| HistoryError::UnresolvedBranch {
                    name: name.to_string(),
                    source,
                })?;
        Ok(snapshot_of(&commit))
    }

    fn diff(
        &self,
        from: Option<&Snapshot>,
        to: &Snapshot,
    ) -> Result<BTreeSet<PathBuf>, HistoryError> {
        let diff_error = |source: git2::Error| HistoryError::Diff {
            from: from.map_or_else(|| "<empty>".to_string(), |s| s.id.clone()),
            to: to.id.clone(),
            source,
        };

        let repo = self.repo()?;
        let to_tree = find_tree(&repo, to).map_err(diff_error)?;
        let from_tree = from
            .map(|s| find_tree(&repo, s))
            .transpose()
            .map_err(diff_error)?;

        let diff = repo
            .diff_tree_to_tree(from_tree.as_ref(), Some(&to_tree), None)
            .map_err(diff_error)?;

        Ok(diff
            .deltas()
            .filter_map(|delta| {
                delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(Path::to_path_buf)
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct MemoryTree {
    files: BTreeMap<PathBuf, String>,
    time: Option<DateTime<Utc>>,
}

/// In-memory history: each release or branch is a full listing of
/// `path → content`, and diffs compare listings.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    releases: Vec<String>,
    trees: HashMap<String, MemoryTree>,
}

fn tree_of(files: &[(&str, &str)], time: Option<DateTime<Utc>>) -> MemoryTree {
    MemoryTree {
        files: files
            .iter()
            .map(|(path, content)| (PathBuf::from(*path), (*content).to_string()))
            .collect(),
        time,
    }
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a release whose snapshot contains `files`.
    #[must_use]
    pub fn release(self, name: &str, files: &[(&str, &str)]) -> Self {
        self.release_at(name, None, files)
    }

    /// Append a release with an explicit snapshot time.
    #[must_use]
    pub fn release_at(
        mut self,
        name: &str,
        time: Option<DateTime<Utc>>,
        files: &[(&str, &str)],
    ) -> Self {
        self.releases.push(name.to_string());
        self.trees
            .insert(format!("release:{name}"), tree_of(files, time));
        self
    }

    /// Set the tip of a branch.
    #[must_use]
    pub fn branch(mut self, name: &str, files: &[(&str, &str)]) -> Self {
        self.trees
            .insert(format!("branch:{name}"), tree_of(files, None));
        self
    }

    fn snapshot(&self, id: String, what: &'static str, name: &str) -> Result<Snapshot, HistoryError> {
        match self.trees.get(&id) {
            Some(tree) => Ok(Snapshot {
                time: tree.time,
                id,
            }),
            None => Err(HistoryError::Unknown {
                what,
                name: name.to_string(),
            }),
        }
    }

    fn tree(&self, snapshot: &Snapshot) -> Result<&MemoryTree, HistoryError> {
        self.trees.get(&snapshot.id).ok_or_else(|| HistoryError::Unknown {
            what: "snapshot",
            name: snapshot.id.clone(),
        })
    }
}

impl HistoryProvider for MemoryHistory {
    fn list_releases(&self) -> Result<Vec<String>, HistoryError> {
        Ok(self.releases.clone())
    }

    fn resolve_release(&self, name: &str) -> Result<Snapshot, HistoryError> {
        self.snapshot(format!("release:{name}"), "release", name)
    }

    fn resolve_branch_tip(&self, name: &str) -> Result<Snapshot, HistoryError> {
        self.snapshot(format!("branch:{name}"), "branch", name)
    }

    fn diff(
        &self,
        from: Option<&Snapshot>,
        to: &Snapshot,
    ) -> Result<BTreeSet<PathBuf>, HistoryError> {
        let to = self.tree(to)?;
        let Some(from) = from else {
            return Ok(to.files.keys().cloned().collect());
        };
        let from = self.tree(from)?;

        Ok(from
            .files
            .keys()
            .chain(to.files.keys())
            .filter(|path| from.files.get(*path) != to.files.get(*path))
            .cloned()
            .collect())
    }
}
