use hbs_core::graph::*;
use hbs_core::storage;
use hbs_core::version::CompareOptions;
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_graph() -> NodeGraph {
    let options = CompareOptions::default();
    let mut graph = NodeGraph::new();
    graph.complete(
        "home",
        PathBuf::from("src/pages/home/home.hbs"),
        NodeKind::Page,
        "v1.1",
        &options,
    );
    graph.link("home", "header", EdgeKind::Includes);
    graph.link("home", "base", EdgeKind::Extends);
    graph.get_mut("home").unwrap().siblings.push(Sibling {
        extension: "js".to_string(),
        path: PathBuf::from("src/pages/home/home.js"),
        version: "v1.1".to_string(),
    });
    graph
}

#[test]
fn test_save_and_load_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let path = storage::default_graph_file(tmp.path());

    let graph = sample_graph();
    storage::save(&path, &graph).unwrap();
    assert!(path.exists());

    let loaded = storage::load(&path).unwrap();
    assert_eq!(loaded.nodes(), graph.nodes());
    let home = loaded.get("home").unwrap();
    assert_eq!(home.kind, NodeKind::Page);
    assert_eq!(home.siblings[0].extension, "js");
    assert_eq!(loaded.get("base").unwrap().extended_by, vec!["home"]);
}

#[test]
fn test_save_is_byte_stable() {
    let tmp = TempDir::new().unwrap();
    let first = tmp.path().join("a.json");
    let second = tmp.path().join("b.json");

    storage::save(&first, &sample_graph()).unwrap();
    storage::save(&second, &sample_graph()).unwrap();

    assert_eq!(
        std::fs::read(&first).unwrap(),
        std::fs::read(&second).unwrap()
    );
}

#[test]
fn test_load_nonexistent_fails() {
    let tmp = TempDir::new().unwrap();
    assert!(storage::load(&tmp.path().join("missing.json")).is_err());
}

#[test]
fn test_save_leaves_project_files_alone() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join(".gitignore"), "node_modules\n").unwrap();

    storage::save(&storage::default_graph_file(tmp.path()), &sample_graph()).unwrap();

    let mut entries: Vec<String> = std::fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    assert_eq!(entries, vec![".gitignore", ".hbs"]);
    assert_eq!(
        std::fs::read_to_string(tmp.path().join(".gitignore")).unwrap(),
        "node_modules\n"
    );
}

#[test]
fn test_load_unchecked_keeps_duplicate_records() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("graph.json");
    let mut nodes = sample_graph().into_nodes();
    nodes.push(Node::placeholder("home"));
    storage::save(&path, &NodeGraph::from(nodes)).unwrap();

    assert!(storage::load(&path).is_err());
    let raw = storage::load_unchecked(&path).unwrap();
    assert_eq!(raw.len(), 4);
    assert_eq!(raw.get("home").unwrap().kind, NodeKind::Page);
}
