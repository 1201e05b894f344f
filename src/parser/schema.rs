//! Output JSON schema definitions for the analysis report.
//!
//! This module defines the structure of JSON files we write to disk.
//! Schema is versioned to allow future evolution.

use crate::parser::events::QueryType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level report structure written to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Schema version for compatibility checking
    pub version: String,

    /// Request metadata from the recorded trace, if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestInfo>,

    /// Annotated call tree, keyed by the root's call-site key
    pub trace: CallNodeRepr,

    /// Aggregated query statistics
    pub query_summary: QuerySummary,

    /// Timestamp when the report was generated
    pub generated_at: String,
}

/// Metadata about the instrumented request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInfo {
    pub path: String,
    pub method: String,

    /// Total request wall time in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_request_time: Option<f64>,
}

/// One tree node in its external representation: a single-entry map from
/// the call-site key to the node body. `BTreeMap` keeps serialization
/// deterministic.
pub type CallNodeRepr = BTreeMap<String, CallNodeBody>;

/// Body of one call node in the output tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallNodeBody {
    /// Duration of this invocation in seconds
    pub total_time: f64,

    /// Queries attributed to this invocation, in attribution order
    pub queries: Vec<AttributedQuery>,

    /// Call/return timing detail
    pub stats: CallStats,

    /// Visible child invocations, in execution order
    pub next: Vec<CallNodeRepr>,
}

/// Timing detail for one call node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallStats {
    /// Call timestamp, wire format
    pub call: String,

    /// Return timestamp, wire format
    #[serde(rename = "return")]
    pub ret: String,

    pub line_numbers: LineNumbers,
}

/// Start (call) and end (return) line numbers of one invocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LineNumbers {
    pub start: u32,
    pub end: u32,
}

/// A query after attribution: the record plus its resolved source location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributedQuery {
    pub model: String,
    pub query_type: QueryType,

    /// Duration in seconds
    pub query_time: f64,

    /// Most relevant source line, if the traceback scan found one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeLocation>,
}

/// A resolved source location from a query traceback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    pub file: String,
    pub function: String,
    pub line: u32,
    pub source_text: String,
}

/// Aggregated statistics over all attributed queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuerySummary {
    pub total_queries: u64,

    /// Sum of all query durations in seconds
    pub total_time_on_queries: f64,

    /// Queries whose key+timestamp had no exact index match and fell back
    /// to the root. Non-zero values signal a noisy or unreliable trace.
    pub attribution_misses: u64,

    /// Global per-query-type counters
    pub query_type: BTreeMap<QueryType, u64>,

    /// Per-model statistics
    pub model: BTreeMap<String, ModelQueryStats>,
}

/// Statistics for one model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelQueryStats {
    pub query_type: BTreeMap<QueryType, QueryTypeStats>,
    pub total_query_count: u64,
}

/// Statistics for one (model, query type) pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryTypeStats {
    pub count: u64,

    /// Sum of durations in seconds
    pub total_query_time: f64,

    /// Duration of the single slowest query
    pub max_query_time: f64,

    /// Source location of that slowest query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_query_time_code: Option<CodeLocation>,
}
