//! CLI binary for building and querying template fragment hierarchy graphs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hbs_core::config::HbsConfig;
use hbs_core::graph::{NodeGraph, NodeKind};
use hbs_core::version::CompareOptions;
use hbs_crawler::{CrawlEvent, GitHistory, HistoryProvider, StampOptions, crawl, history_prefix};
use hbs_nav::impact::{Direction, compute_impact};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hbs-crawl", about = "Template fragment hierarchy crawler")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Graph file written by `crawl` and read by the queries (defaults to crawl.output)
    #[arg(short, long, global = true)]
    graph: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stamp releases and build the fragment graph
    Crawl {
        /// Integration branch diffed against the latest release
        #[arg(long)]
        branch: Option<String>,

        /// Do not let extending fragments inherit a newer base version
        #[arg(long)]
        no_cascade: bool,

        /// Propagate versions to a fixpoint after all fragments are processed
        #[arg(long)]
        closure: bool,
    },

    /// Print the release that last touched each path
    Stamps {
        /// Integration branch diffed against the latest release
        #[arg(long)]
        branch: Option<String>,
    },

    /// List fragments affected by a change to KEY
    Impact {
        /// Fragment key
        key: String,

        /// Maximum traversal depth
        #[arg(long, default_value = "3")]
        depth: usize,

        /// Walk what KEY depends on instead of what depends on KEY
        #[arg(long)]
        dependencies: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List fragments with a version newer than RELEASE
    Since {
        /// Release identifier, e.g. v1.2
        release: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate graph integrity (missing back-edges, dangling references, etc.)
    Validate {
        /// Print the issues as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show graph statistics
    Info,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;
    let mut config = HbsConfig::load(&project_root)?;
    tracing::debug!(project = %project_root.display(), ?config, "configuration loaded");
    let graph_path = graph_file(&project_root, &config, cli.graph.as_deref());

    match cli.command {
        Commands::Crawl {
            branch,
            no_cascade,
            closure,
        } => {
            if let Some(branch) = branch {
                config.history.integration_branch = branch;
            }
            if no_cascade {
                config.versions.cascade_extend_version = false;
            }
            if closure {
                config.versions.transitive_closure = true;
            }
            cmd_crawl(&project_root, &config, &graph_path).await
        }
        Commands::Stamps { branch } => {
            if let Some(branch) = branch {
                config.history.integration_branch = branch;
            }
            cmd_stamps(&project_root, &config).await
        }
        Commands::Impact {
            key,
            depth,
            dependencies,
            json,
        } => {
            let direction = if dependencies {
                Direction::Dependencies
            } else {
                Direction::Dependents
            };
            cmd_impact(&graph_path, &key, direction, depth, json)
        }
        Commands::Since { release, json } => cmd_since(&graph_path, &config, &release, json),
        Commands::Validate { json } => cmd_validate(&graph_path, json),
        Commands::Info => cmd_info(&graph_path, &config),
    }
}

/// Open the configured history and work out where the project sits inside it.
fn open_history(
    project_root: &Path,
    config: &HbsConfig,
) -> Result<(Arc<dyn HistoryProvider>, PathBuf)> {
    let history_root = project_root.join(&config.history.history_path);
    let history = GitHistory::open(&history_root)
        .with_context(|| format!("cannot open release history at {}", history_root.display()))?;
    let prefix = history
        .workdir()
        .map(|workdir| history_prefix(project_root, workdir))
        .unwrap_or_default();
    Ok((Arc::new(history), prefix))
}

/// `--graph` as given, otherwise the configured output under the project root.
fn graph_file(project_root: &Path, config: &HbsConfig, graph: Option<&Path>) -> PathBuf {
    graph.map_or_else(|| project_root.join(&config.crawl.output), Path::to_path_buf)
}

fn ensure_graph(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("No graph found at {}. Run `hbs-crawl crawl` first.", path.display());
    }
    Ok(())
}

fn load_graph(path: &Path) -> Result<NodeGraph> {
    ensure_graph(path)?;
    hbs_core::storage::load(path)
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Component => "component",
        NodeKind::Layout => "layout",
        NodeKind::Page => "page",
        NodeKind::Unclassified => "unclassified",
    }
}

async fn cmd_crawl(project_root: &Path, config: &HbsConfig, output_path: &Path) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let (history, prefix) = open_history(project_root, config)?;
    eprintln!(
        "Crawling {} (integration branch: {})",
        project_root.display(),
        config.history.integration_branch
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Processing [{bar:30.cyan/blue}] {pos}/{len} fragments")
            .expect("valid template")
            .progress_chars("##-"),
    );

    let out = crawl(project_root, config, history, prefix, |event| match event {
        CrawlEvent::Stamped { paths, releases } => {
            pb.println(format!("  Stamped {paths} paths across {releases} releases"));
        }
        CrawlEvent::Discovered(count) => pb.set_length(count as u64),
        CrawlEvent::Processed(_) => pb.inc(1),
    })
    .await?;
    pb.finish_and_clear();

    hbs_core::storage::save(output_path, &out.graph)?;

    let report = &out.report;
    eprintln!("Graph written to {}", output_path.display());
    eprintln!(
        "  {} nodes ({} fragments, {} placeholders)",
        out.graph.len(),
        report.processed,
        report.placeholders
    );
    eprintln!(
        "  {} versions raised, {} incomparable comparisons skipped",
        report.raised, report.incomparable
    );
    if config.versions.transitive_closure {
        eprintln!("  {} raised by the closure pass", report.closure_raised);
    }
    if !report.skipped.is_empty() {
        eprintln!("  {} fragments skipped:", report.skipped.len());
        for path in &report.skipped {
            eprintln!("    {}", path.display());
        }
    }
    if !report.duplicate_keys.is_empty() {
        eprintln!(
            "  duplicate keys (later file wins): {}",
            report.duplicate_keys.join(", ")
        );
    }
    Ok(())
}

async fn cmd_stamps(project_root: &Path, config: &HbsConfig) -> Result<()> {
    let (history, _) = open_history(project_root, config)?;
    let stamps = hbs_crawler::stamp_changes(history, &StampOptions::from_config(&config.history))
        .await
        .context("failed to stamp release history")?;

    for (path, stamp) in stamps.iter() {
        println!("{}\t{}", path.display(), stamp);
    }
    eprintln!(
        "{} paths across {} releases ({})",
        stamps.len(),
        stamps.releases().len(),
        stamps.releases().join(", ")
    );
    Ok(())
}

fn cmd_impact(
    graph_path: &Path,
    key: &str,
    direction: Direction,
    depth: usize,
    json: bool,
) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let Some(result) = compute_impact(&graph, key, direction, depth) else {
        let suggestions = hbs_nav::validate::suggest_keys(&graph, key);
        if suggestions.is_empty() {
            anyhow::bail!("unknown fragment: {key}");
        }
        anyhow::bail!(
            "unknown fragment: {key} (did you mean {}?)",
            suggestions.join(", ")
        );
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    if result.reachable.is_empty() {
        println!("Nothing reachable from {key}.");
        return Ok(());
    }
    for entry in &result.reachable {
        let via: Vec<&str> = entry.edge_path.iter().map(|(k, _)| k.as_str()).collect();
        println!(
            "{}{} [{}]{}  via {}",
            "  ".repeat(entry.depth - 1),
            entry.key,
            entry.version,
            if entry.placeholder { " (missing)" } else { "" },
            via.join(" > ")
        );
    }
    eprintln!(
        "{} fragments within depth {}",
        result.reachable.len(),
        result.max_depth_reached
    );
    Ok(())
}

fn cmd_since(graph_path: &Path, config: &HbsConfig, release: &str, json: bool) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let options = CompareOptions::from_config(&config.versions, &config.history.pending_suffix);
    let report = hbs_nav::changes::changed_since(&graph, release, &options);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for node in &report.changed {
        println!("{}\t{}\t{}", node.key, kind_label(node.kind), node.version);
    }
    eprintln!("{} fragments changed since {}", report.changed.len(), release);
    if !report.incomparable.is_empty() {
        eprintln!(
            "  {} not comparable with {}: {}",
            report.incomparable.len(),
            release,
            report.incomparable.join(", ")
        );
    }
    Ok(())
}

fn print_issue(issue: &hbs_nav::validate::Issue) {
    use hbs_nav::validate::Issue;

    match issue {
        Issue::DuplicateKey { key } => println!("WARN: duplicate key: {key}"),
        Issue::UnknownTarget { source, target } => {
            println!("WARN: {source} references unknown node {target}");
        }
        Issue::MissingBackEdge {
            source,
            target,
            edge,
        } => println!("WARN: {source} {edge} {target} but {target} has no back-edge"),
        Issue::StrayBackEdge {
            node,
            claimed_source,
            edge,
        } => println!("WARN: {node} lists {claimed_source} as {edge} source, but it is not"),
        Issue::Dangling {
            key,
            referenced_by,
            suggestions,
        } => {
            let hint = if suggestions.is_empty() {
                String::new()
            } else {
                format!(" (did you mean {}?)", suggestions.join(", "))
            };
            println!(
                "NOTE: {key} is referenced by {} but has no fragment{hint}",
                referenced_by.join(", ")
            );
        }
    }
}

fn cmd_validate(graph_path: &Path, json: bool) -> Result<()> {
    ensure_graph(graph_path)?;
    // Duplicate records must survive loading to be reported.
    let graph = hbs_core::storage::load_unchecked(graph_path)?;
    let issues = hbs_nav::validate::validate(&graph);
    let errors = issues.iter().filter(|i| i.is_error()).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&issues)?);
    } else {
        issues.iter().for_each(print_issue);
    }

    if errors > 0 {
        anyhow::bail!("{errors} integrity issue(s) found");
    }
    if !json {
        println!("Graph is consistent ({} nodes).", graph.len());
    }
    Ok(())
}

fn cmd_info(path: &Path, config: &HbsConfig) -> Result<()> {
    if !path.exists() {
        eprintln!("No graph found. Run `hbs-crawl crawl` first.");
        return Ok(());
    }
    let graph = hbs_core::storage::load(path)?;

    let count = |kind: NodeKind| {
        graph
            .nodes()
            .iter()
            .filter(|n| !n.is_placeholder() && n.kind == kind)
            .count()
    };
    let placeholders = graph.placeholder_keys();
    let includes = graph.nodes().iter().map(|n| n.includes.len()).sum::<usize>();
    let extends = graph.nodes().iter().map(|n| n.extends_from.len()).sum::<usize>();
    let siblings = graph.nodes().iter().map(|n| n.siblings.len()).sum::<usize>();

    println!("Graph: {}", path.display());
    println!("Nodes: {}", graph.len());
    for kind in [
        NodeKind::Component,
        NodeKind::Layout,
        NodeKind::Page,
        NodeKind::Unclassified,
    ] {
        println!("  {}: {}", kind_label(kind), count(kind));
    }
    println!("  placeholders: {}", placeholders.len());
    println!("Include edges: {includes}");
    println!("Extend edges: {extends}");
    println!("Siblings: {siblings}");

    let keys: Vec<&str> = graph.nodes().iter().map(|n| n.key.as_str()).collect();
    println!(
        "\nKeys: {}{}",
        keys.join(&config.crawl.separator),
        config.crawl.punctuation
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_flag_reaches_every_command() {
        for args in [
            vec!["hbs-crawl", "crawl", "--graph", "out/g.json"],
            vec!["hbs-crawl", "--graph", "out/g.json", "impact", "header"],
            vec!["hbs-crawl", "since", "v1.0", "--graph", "out/g.json", "--json"],
            vec!["hbs-crawl", "validate", "-g", "out/g.json"],
            vec!["hbs-crawl", "info", "--graph", "out/g.json"],
        ] {
            let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
            let path = graph_file(
                Path::new("/proj"),
                &HbsConfig::default(),
                cli.graph.as_deref(),
            );
            assert_eq!(path, PathBuf::from("out/g.json"), "{args:?}");
        }
    }

    #[test]
    fn test_graph_defaults_to_configured_output() {
        let cli = Cli::try_parse_from(["hbs-crawl", "info"]).unwrap();
        let path = graph_file(
            Path::new("/proj"),
            &HbsConfig::default(),
            cli.graph.as_deref(),
        );
        assert_eq!(path, PathBuf::from("/proj/.hbs/graph.json"));
    }

    #[test]
    fn test_crawl_output_is_read_back_by_queries() {
        let tmp = tempfile::tempdir().unwrap();
        let custom = tmp.path().join("build/fragments.json");
        let mut graph = NodeGraph::new();
        graph.link("page", "header", hbs_core::graph::EdgeKind::Includes);
        hbs_core::storage::save(&custom, &graph).unwrap();

        assert_eq!(load_graph(&custom).unwrap().len(), 2);
        let missing = load_graph(&tmp.path().join(".hbs/graph.json")).unwrap_err();
        assert!(missing.to_string().contains("No graph found"));
    }

    #[test]
    fn test_json_flags_parse() {
        let cli = Cli::try_parse_from(["hbs-crawl", "validate", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Validate { json: true }));
        let cli = Cli::try_parse_from(["hbs-crawl", "impact", "icon", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Impact { json: true, .. }));
    }
}
