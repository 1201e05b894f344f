//! Trace parsing and schema definitions.
//!
//! This module handles:
//! - Parsing recorded trace files from the instrumentation layer
//! - Strict call-site key and timestamp parsing at the boundary
//! - Traceback boundary scanning for query source attribution
//! - Defining the report output schema

pub mod events;
pub mod schema;
pub mod traceback;

// Re-export main types
pub use events::{
    load_trace_file, parse_events, parse_queries, CallSiteKey, QueryRecord, QueryType,
    RawQueryRecord, RawTraceEvent, RawTraceFile, TraceEvent,
};
pub use schema::{
    AttributedQuery, CallNodeBody, CallNodeRepr, CallStats, CodeLocation, LineNumbers,
    ModelQueryStats, QuerySummary, QueryTypeStats, Report, RequestInfo,
};
pub use traceback::{locate_query_source, parse_traceback_line};
