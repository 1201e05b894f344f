//! Reqtrace Studio
//!
//! Request trace analysis and database-query attribution for
//! instrumented web applications.
//!
//! The instrumentation layer records, per request, a flat log of function
//! call/return events plus every database query with its captured call
//! stack. This crate rebuilds the causal call tree from that log,
//! attributes each query to the frame that issued it, and reports
//! per-model / per-query-type timing statistics.
//!
//! This crate provides the core implementation for the `reqtrace`
//! CLI tool.

pub mod analyzer;
pub mod commands;
pub mod flamegraph;
pub mod output;
pub mod parser;
pub mod utils;
