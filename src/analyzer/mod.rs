//! The reconstruction-and-attribution engine.
//!
//! This module transforms one complete, already-terminated event log into:
//! - A nested call tree (one node per concrete invocation)
//! - Query-to-frame attribution with source locations
//! - Aggregate per-model / per-query-type timing statistics
//!
//! The engine is a pure, synchronous transformation: no I/O, no shared
//! state, safe to invoke concurrently for independent traces.

pub mod attribution;
pub mod stats;
pub mod tree;

// Re-export main types and functions
pub use attribution::{attribute_queries, AttributionReport};
pub use stats::summarize_queries;
pub use tree::{CallTrace, FunctionCall, NodeId};

use crate::parser::events::{QueryRecord, TraceEvent};
use crate::parser::schema::QuerySummary;
use crate::utils::config::AnalyzerConfig;
use crate::utils::error::StructuralError;

/// Build the call tree from an ordered event stream.
///
/// Thin wrapper over [`CallTrace::build`], exposed as the engine's first
/// entry point.
pub fn build_trace(
    events: &[TraceEvent],
    config: &AnalyzerConfig,
) -> Result<CallTrace, StructuralError> {
    CallTrace::build(events, config)
}

/// Attribute every query to its frame, then fold them into statistics.
///
/// The engine's second entry point: annotates the tree in place and
/// returns the summary (including the attribution-miss count).
pub fn attribute_and_summarize(
    trace: &mut CallTrace,
    queries: &[QueryRecord],
    config: &AnalyzerConfig,
) -> QuerySummary {
    let report = attribute_queries(trace, queries, config);
    summarize_queries(trace.queries(), report.misses)
}
