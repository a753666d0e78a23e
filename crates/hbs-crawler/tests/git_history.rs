//! Crawls against a real git repository built in a temp directory.

use git2::{IndexAddOption, Oid, Repository, Signature};
use hbs_core::config::{HbsConfig, ReleaseOrder};
use hbs_crawler::{
    GitHistory, HistoryError, HistoryProvider, StampOptions, crawl, history_prefix, stamp_changes,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn commit_all(repo: &Repository, message: &str) -> Oid {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Fixture", "fixture@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// Two releases and a develop branch:
/// - v1.0 (lightweight): header + page
/// - v2.0 (annotated): page changed
/// - develop: footer added
fn fixture(root: &Path, subdir: &str) -> Repository {
    let repo = Repository::init(root).unwrap();
    let project = root.join(subdir);
    let sig = Signature::now("Fixture", "fixture@example.com").unwrap();

    write(&project, "components/header.hbs", "<header></header>");
    write(&project, "pages/page.hbs", "{{> header }}");
    let v1 = commit_all(&repo, "first release");
    {
        let obj = repo.find_object(v1, None).unwrap();
        repo.tag_lightweight("v1.0", &obj, false).unwrap();
    }

    write(&project, "pages/page.hbs", "{{> header }}{{> footer }}");
    let v2 = commit_all(&repo, "second release");
    {
        let obj = repo.find_object(v2, None).unwrap();
        repo.tag("v2.0", &obj, &sig, "release 2.0", false).unwrap();
        let head = repo.find_commit(v2).unwrap();
        repo.branch("develop", &head, false).unwrap();
    }
    repo.set_head("refs/heads/develop").unwrap();

    write(&project, "components/footer.hbs", "<footer></footer>");
    commit_all(&repo, "add footer");
    repo
}

#[tokio::test]
async fn test_git_stamps_follow_tags_and_branch() {
    let tmp = tempfile::tempdir().unwrap();
    let _repo = fixture(tmp.path(), "");

    let history = GitHistory::open(tmp.path()).unwrap();
    assert_eq!(history.list_releases().unwrap(), vec!["v1.0", "v2.0"]);

    let options = StampOptions::from_config(&HbsConfig::default().history);
    let stamps = stamp_changes(Arc::new(history), &options).await.unwrap();
    assert_eq!(stamps.get(Path::new("components/header.hbs")), Some("v1.0"));
    assert_eq!(stamps.get(Path::new("pages/page.hbs")), Some("v2.0"));
    assert_eq!(
        stamps.get(Path::new("components/footer.hbs")),
        Some("v2.0-pending")
    );
}

#[tokio::test]
async fn test_git_crawl_builds_graph() {
    let tmp = tempfile::tempdir().unwrap();
    let _repo = fixture(tmp.path(), "");

    let history = GitHistory::open(tmp.path()).unwrap();
    let out = crawl(
        tmp.path(),
        &HbsConfig::default(),
        Arc::new(history),
        PathBuf::new(),
        |_| {},
    )
    .await
    .unwrap();

    assert_eq!(out.graph.get("page").unwrap().version, "v2.0");
    // Raised by page, which includes it.
    assert_eq!(out.graph.get("header").unwrap().version, "v2.0");
    // Already newer than page, so the include leaves it alone.
    assert_eq!(out.graph.get("footer").unwrap().version, "v2.0-pending");
    assert_eq!(out.graph.get("footer").unwrap().included_by, vec!["page"]);
}

#[tokio::test]
async fn test_git_project_in_subdirectory() {
    let tmp = tempfile::tempdir().unwrap();
    let _repo = fixture(tmp.path(), "web/templates");

    let project = tmp.path().join("web/templates");
    let history = GitHistory::open(tmp.path()).unwrap();
    let workdir = history.workdir().unwrap().to_path_buf();
    let prefix = history_prefix(&project, &workdir);
    assert_eq!(prefix, PathBuf::from("web/templates"));

    let out = crawl(&project, &HbsConfig::default(), Arc::new(history), prefix, |_| {})
        .await
        .unwrap();
    let page = out.graph.get("page").unwrap();
    assert_eq!(page.path.as_deref(), Some(Path::new("pages/page.hbs")));
    assert_eq!(page.version, "v2.0");
}

#[tokio::test]
async fn test_chronological_order_matches_listing_for_linear_history() {
    let tmp = tempfile::tempdir().unwrap();
    let _repo = fixture(tmp.path(), "");

    let mut config = HbsConfig::default();
    config.history.release_order = ReleaseOrder::Chronological;
    let options = StampOptions::from_config(&config.history);
    let stamps = stamp_changes(Arc::new(GitHistory::open(tmp.path()).unwrap()), &options)
        .await
        .unwrap();
    assert_eq!(stamps.releases(), ["v1.0", "v2.0"]);
}

#[test]
fn test_unknown_branch_is_unresolved() {
    let tmp = tempfile::tempdir().unwrap();
    let _repo = fixture(tmp.path(), "");

    let history = GitHistory::open(tmp.path()).unwrap();
    assert!(matches!(
        history.resolve_branch_tip("release/next"),
        Err(HistoryError::UnresolvedBranch { .. })
    ));
    assert!(matches!(
        history.resolve_release("v9.9"),
        Err(HistoryError::UnresolvedRelease { .. })
    ));
}
