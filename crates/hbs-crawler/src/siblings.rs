//! Co-located files that share a fragment's base name.

use hbs_core::graph::{Node, Sibling};
use hbs_core::version::{CompareOptions, compare_versions};
use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;

/// Probe `fragment` (relative to `project_root`) for `<base>.<ext>` siblings.
///
/// `stamp_of` maps a sibling's relative path to its stamped version. The
/// fragment's own extension is never reported as a sibling of itself.
pub fn resolve_siblings<'s, F>(
    project_root: &Path,
    fragment: &Path,
    extensions: &[String],
    stamp_of: F,
) -> Vec<Sibling>
where
    F: Fn(&Path) -> &'s str,
{
    let own_extension = fragment.extension().and_then(|e| e.to_str());

    extensions
        .iter()
        .filter(|ext| Some(ext.as_str()) != own_extension)
        .filter_map(|ext| {
            let path = fragment.with_extension(ext);
            if !project_root.join(&path).is_file() {
                return None;
            }
            let version = stamp_of(&path).to_string();
            Some(Sibling {
                extension: ext.clone(),
                path,
                version,
            })
        })
        .collect()
}

/// Raise `node.version` to the newest sibling version.
/// Returns how many times the version moved.
pub fn fold_sibling_versions(node: &mut Node, options: &CompareOptions) -> usize {
    let mut raised = 0;
    for sibling in &node.siblings {
        match compare_versions(&sibling.version, &node.version, options) {
            Some(Ordering::Greater) => {
                debug!(
                    key = %node.key,
                    sibling = %sibling.path.display(),
                    from = %node.version,
                    to = %sibling.version,
                    "version raised by sibling"
                );
                node.version.clone_from(&sibling.version);
                raised += 1;
            }
            Some(_) => {}
            None => debug!(
                key = %node.key,
                current = %node.version,
                candidate = %sibling.version,
                "incomparable sibling version, skipped"
            ),
        }
    }
    raised
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_resolve_finds_existing_siblings_only() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("components/header");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("header.hbs"), "").unwrap();
        std::fs::write(dir.join("header.scss"), "").unwrap();

        let siblings = resolve_siblings(
            tmp.path(),
            Path::new("components/header/header.hbs"),
            &exts(&["scss", "js"]),
            |_| "v2.0",
        );
        assert_eq!(
            siblings,
            vec![Sibling {
                extension: "scss".to_string(),
                path: PathBuf::from("components/header/header.scss"),
                version: "v2.0".to_string(),
            }]
        );
    }

    #[test]
    fn test_resolve_skips_own_extension() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("card.hbs"), "").unwrap();

        let siblings = resolve_siblings(tmp.path(), Path::new("card.hbs"), &exts(&["hbs"]), |_| "0");
        assert!(siblings.is_empty());
    }

    #[test]
    fn test_fold_raises_to_newest_sibling() {
        let mut node = Node::placeholder("header");
        node.version = "v1.0".to_string();
        node.siblings = vec![
            Sibling {
                extension: "scss".to_string(),
                path: PathBuf::from("header.scss"),
                version: "v2.0".to_string(),
            },
            Sibling {
                extension: "js".to_string(),
                path: PathBuf::from("header.js"),
                version: "v1.5".to_string(),
            },
        ];

        assert_eq!(fold_sibling_versions(&mut node, &CompareOptions::default()), 1);
        assert_eq!(node.version, "v2.0");
    }

    #[test]
    fn test_fold_ignores_incomparable_sibling() {
        let mut node = Node::placeholder("header");
        node.version = "v1.0".to_string();
        node.siblings = vec![Sibling {
            extension: "js".to_string(),
            path: PathBuf::from("header.js"),
            version: "nightly".to_string(),
        }];

        assert_eq!(fold_sibling_versions(&mut node, &CompareOptions::default()), 0);
        assert_eq!(node.version, "v1.0");
    }
}
