//! Configuration for crawling fragments and stamping releases.
//!
//! Load order: `.hbs/config.toml` → environment variables → defaults.

use crate::graph::NodeKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HbsConfig {
    pub crawl: CrawlConfig,
    pub history: HistoryConfig,
    pub versions: VersionConfig,
}

/// Maps a path substring to a node kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRule {
    pub pattern: String,
    pub kind: NodeKind,
}

impl FolderRule {
    fn new(pattern: &str, kind: NodeKind) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind,
        }
    }
}

/// Fragment discovery and classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Include globs, relative to the project root.
    pub sources: Vec<String>,
    /// Exclude globs, relative to the project root.
    pub exclude: Vec<String>,
    /// Extension (without dot) that marks a file as a fragment.
    pub fragment_extension: String,
    /// Folder rules checked in order; first match wins.
    pub element_type_folders: Vec<FolderRule>,
    /// Extensions probed for co-located files sharing a fragment's base name.
    pub same_name_dependencies: Vec<String>,
    /// Joins keys in `info` output.
    pub separator: String,
    /// Terminates the key list in `info` output.
    pub punctuation: String,
    /// Graph output file, relative to the project root.
    pub output: PathBuf,
}

/// Release history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Repository root, relative to the project root.
    pub history_path: PathBuf,
    /// Unreleased branch diffed against the latest release.
    pub integration_branch: String,
    /// Appended to the latest release name for in-progress stamps.
    pub pending_suffix: String,
    pub release_order: ReleaseOrder,
    /// Maximum concurrent diff requests while stamping.
    pub diff_concurrency: usize,
}

/// How releases are ordered before consecutive pairs are diffed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOrder {
    /// Trust the order the history provider lists releases in.
    #[default]
    Listing,
    /// Sort by the commit time of each release snapshot.
    Chronological,
    /// Sort by semantic version; unparsable names keep their order at the end.
    Semver,
}

/// Version propagation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionConfig {
    /// Let extending fragments inherit a newer base version.
    pub cascade_extend_version: bool,
    pub lexicographical: bool,
    pub zero_extend: bool,
    /// Re-run propagation to a fixpoint after every fragment is processed.
    pub transitive_closure: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            sources: vec!["**/*".to_string()],
            exclude: Vec::new(),
            fragment_extension: "hbs".to_string(),
            element_type_folders: vec![
                FolderRule::new("/components/", NodeKind::Component),
                FolderRule::new("/layouts/", NodeKind::Layout),
                FolderRule::new("/pages/", NodeKind::Page),
            ],
            same_name_dependencies: vec!["scss".to_string(), "js".to_string()],
            separator: ", ".to_string(),
            punctuation: ".".to_string(),
            output: PathBuf::from(".hbs").join("graph.json"),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from("."),
            integration_branch: "develop".to_string(),
            pending_suffix: "-pending".to_string(),
            release_order: ReleaseOrder::Listing,
            diff_concurrency: 8,
        }
    }
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            cascade_extend_version: true,
            lexicographical: false,
            zero_extend: false,
            transitive_closure: false,
        }
    }
}

impl CrawlConfig {
    /// Classify a fragment path by the first matching folder rule.
    pub fn classify(&self, path: &Path) -> NodeKind {
        // Rules like "/pages/" must also match a path that starts with "pages/".
        let haystack = format!("/{}", path.to_string_lossy().replace('\\', "/"));
        self.element_type_folders
            .iter()
            .find(|rule| haystack.contains(&rule.pattern))
            .map_or(NodeKind::Unclassified, |rule| rule.kind)
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl HbsConfig {
    /// Load config from `.hbs/config.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let config_path = project_root.join(".hbs").join("config.toml");

        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
                    path: config_path.clone(),
                    source,
                })?;
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: config_path.clone(),
                source,
            })?
        } else {
            Self::default()
        };

        env_override("HBS_HISTORY_PATH", &mut config.history.history_path);
        env_override(
            "HBS_INTEGRATION_BRANCH",
            &mut config.history.integration_branch,
        );
        env_override(
            "HBS_CASCADE_EXTEND_VERSION",
            &mut config.versions.cascade_extend_version,
        );
        env_override(
            "HBS_DIFF_CONCURRENCY",
            &mut config.history.diff_concurrency,
        );
        env_override(
            "HBS_TRANSITIVE_CLOSURE",
            &mut config.versions.transitive_closure,
        );

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Strip leading dots from sibling extensions and the fragment extension.
    pub fn normalize(&mut self) {
        self.crawl.fragment_extension = self
            .crawl
            .fragment_extension
            .trim_start_matches('.')
            .to_string();
        for ext in &mut self.crawl.same_name_dependencies {
            *ext = ext.trim_start_matches('.').to_string();
        }
    }

    /// Check invariants that would otherwise surface as confusing crawl results.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawl.fragment_extension.is_empty() {
            return Err(ConfigError::Invalid(
                "crawl.fragment_extension must not be empty".to_string(),
            ));
        }
        if self.history.pending_suffix.is_empty() {
            return Err(ConfigError::Invalid(
                "history.pending_suffix must not be empty".to_string(),
            ));
        }
        if self.history.diff_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "history.diff_concurrency must be at least 1".to_string(),
            ));
        }
        if let Some(rule) = self
            .crawl
            .element_type_folders
            .iter()
            .find(|r| r.pattern.is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "element_type_folders entry for {:?} has an empty pattern",
                rule.kind
            )));
        }
        if self.crawl.same_name_dependencies.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid(
                "same_name_dependencies must not contain empty extensions".to_string(),
            ));
        }
        for pattern in self.crawl.sources.iter().chain(&self.crawl.exclude) {
            globset::Glob::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("invalid glob {:?}: {}", pattern, e))
            })?;
        }
        Ok(())
    }
}
