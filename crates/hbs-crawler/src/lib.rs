//! Graph construction for template fragment hierarchies.
//!
//! A crawl has two strictly ordered phases:
//!
//! 1. [`stamps::stamp_changes`] diffs consecutive releases (and the integration
//!    branch) through a [`history::HistoryProvider`] and maps every path to the
//!    release that last touched it.
//! 2. [`pipeline::GraphBuilder`] visits fragments in discovery order, records
//!    include/extend edges, and applies [`propagation::Propagator`] and sibling
//!    folding as each edge is created.

pub mod discovery;
pub mod history;
pub mod pipeline;
pub mod propagation;
pub mod siblings;
pub mod stamps;

pub use history::{GitHistory, HistoryError, HistoryProvider, MemoryHistory, Snapshot};
pub use pipeline::{BuildReport, CrawlEvent, CrawlOutput, GraphBuilder, crawl, history_prefix};
pub use stamps::{StampMap, StampOptions, stamp_changes};
