//! Query-to-frame attribution.
//!
//! Runs strictly after the tree is built: each query carries the call-site
//! key and start timestamp of its enclosing frame, captured at execution
//! time, so attribution is an exact index lookup rather than live stack
//! tracking. A query that misses the index attaches to the root — better
//! to over-attribute than to drop a query — and the miss is counted so
//! callers can detect a noisy trace.

use crate::analyzer::tree::CallTrace;
use crate::parser::events::QueryRecord;
use crate::parser::schema::AttributedQuery;
use crate::parser::traceback::locate_query_source;
use crate::utils::config::AnalyzerConfig;
use log::{debug, warn};

/// Outcome of an attribution pass
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributionReport {
    /// Queries processed (every one attaches somewhere)
    pub attributed: usize,

    /// Queries whose key+timestamp had no exact match and fell back to
    /// the root
    pub misses: usize,
}

/// Attribute every query to its call frame, in input order.
///
/// **Public** - second pass of the engine, after [`CallTrace::build`]
///
/// Each query's traceback is resolved to a source location on the way in,
/// so the attached record is the final output form.
pub fn attribute_queries(
    trace: &mut CallTrace,
    queries: &[QueryRecord],
    config: &AnalyzerConfig,
) -> AttributionReport {
    let mut report = AttributionReport::default();

    for query in queries {
        let node_id = match trace.find_node(&query.call_site, query.call_site_start) {
            Some(id) => id,
            None => {
                debug!(
                    "No frame for query on {} at {} ({}), attributing to root",
                    query.model, query.call_site_start, query.call_site
                );
                report.misses += 1;
                trace.root()
            }
        };

        let code = locate_query_source(
            &query.traceback,
            &config.orm_boundary_marker,
            &config.app_root,
        );

        trace.attach_query(
            node_id,
            AttributedQuery {
                model: query.model.clone(),
                query_type: query.query_type,
                query_time: query.query_time,
                code,
            },
        );
        report.attributed += 1;
    }

    if report.misses > 0 {
        warn!(
            "{} of {} queries fell back to root attribution",
            report.misses, report.attributed
        );
    }

    report
}
