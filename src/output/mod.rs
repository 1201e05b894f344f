//! Output writers for reports and flamegraphs.
//!
//! This module handles delivering the finished analysis:
//! - JSON reports on disk
//! - SVG flamegraphs
//! - HTTP transmission to a collector endpoint

pub mod http;
pub mod json;
pub mod svg;

// Re-export main functions
pub use http::HttpSink;
pub use json::{read_report, write_report};
pub use svg::write_svg;
