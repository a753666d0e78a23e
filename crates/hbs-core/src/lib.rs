//! Core types for the template fragment hierarchy graph.
//!
//! Provides the node registry ([`graph::NodeGraph`]), the release ordering used by
//! version propagation ([`version::compare_versions`]), typed configuration, and
//! JSON persistence of the output document.

pub mod config;
pub mod graph;
pub mod schema;
pub mod storage;
pub mod version;
