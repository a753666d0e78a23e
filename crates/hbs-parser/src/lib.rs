//! Directive extraction for Handlebars-style template fragments.
//!
//! A lexical scan, not a template parser: it finds `{{> partial }}` inclusions
//! and `{{#extend "layout"}}` extensions and nothing else.

pub mod directives;

pub use directives::{Directives, extract_directives};
