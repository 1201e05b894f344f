//! Aggregate query statistics across the annotated tree.

use crate::parser::schema::{AttributedQuery, QuerySummary};
use log::debug;

/// Fold attributed queries into grouped statistics.
///
/// **Public** - final pass of the engine
///
/// Per-model entries are created once when a model is first seen and only
/// mutated in place afterwards; a repeat model never resets accumulated
/// counters. Per (model, query type): count, total time, and the single
/// slowest query with its attributed source location.
pub fn summarize_queries<'a>(
    queries: impl IntoIterator<Item = &'a AttributedQuery>,
    attribution_misses: usize,
) -> QuerySummary {
    let mut summary = QuerySummary {
        attribution_misses: attribution_misses as u64,
        ..QuerySummary::default()
    };

    for query in queries {
        *summary.query_type.entry(query.query_type).or_insert(0) += 1;

        let model_stats = summary.model.entry(query.model.clone()).or_default();
        model_stats.total_query_count += 1;

        let type_stats = model_stats.query_type.entry(query.query_type).or_default();
        type_stats.count += 1;
        type_stats.total_query_time += query.query_time;
        if query.query_time > type_stats.max_query_time {
            type_stats.max_query_time = query.query_time;
            type_stats.max_query_time_code = query.code.clone();
        }

        summary.total_queries += 1;
        summary.total_time_on_queries += query.query_time;
    }

    debug!(
        "Summarized {} queries across {} models ({:.4}s total)",
        summary.total_queries,
        summary.model.len(),
        summary.total_time_on_queries
    );

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::events::QueryType;
    use crate::parser::schema::CodeLocation;

    fn query(model: &str, query_type: QueryType, time: f64, line: u32) -> AttributedQuery {
        AttributedQuery {
            model: model.to_string(),
            query_type,
            query_time: time,
            code: Some(CodeLocation {
                file: "/srv/app/views.py".to_string(),
                function: "get".to_string(),
                line,
                source_text: String::new(),
            }),
        }
    }

    #[test]
    fn test_two_reads_on_one_model() {
        let queries = vec![
            query("Foo", QueryType::Read, 0.1, 10),
            query("Foo", QueryType::Read, 0.5, 20),
        ];
        let summary = summarize_queries(&queries, 0);

        let foo = &summary.model["Foo"];
        let reads = &foo.query_type[&QueryType::Read];
        assert_eq!(reads.count, 2);
        assert!((reads.total_query_time - 0.6).abs() < 1e-9);
        assert_eq!(reads.max_query_time, 0.5);
        assert_eq!(reads.max_query_time_code.as_ref().unwrap().line, 20);
        assert_eq!(foo.total_query_count, 2);
        assert_eq!(summary.query_type[&QueryType::Read], 2);
    }

    #[test]
    fn test_repeat_model_never_resets_entry() {
        // Interleave a second model between two Foo queries; Foo's counters
        // must survive the revisit.
        let queries = vec![
            query("Foo", QueryType::Read, 0.2, 1),
            query("Bar", QueryType::Write, 0.3, 2),
            query("Foo", QueryType::Read, 0.1, 3),
            query("Foo", QueryType::Write, 0.4, 4),
        ];
        let summary = summarize_queries(&queries, 0);

        let foo = &summary.model["Foo"];
        assert_eq!(foo.total_query_count, 3);
        assert_eq!(foo.query_type[&QueryType::Read].count, 2);
        assert_eq!(foo.query_type[&QueryType::Read].max_query_time, 0.2);
        assert_eq!(foo.query_type[&QueryType::Write].count, 1);
        assert_eq!(summary.model["Bar"].total_query_count, 1);
        assert!((summary.total_time_on_queries - 1.0).abs() < 1e-9);
        assert_eq!(summary.total_queries, 4);
    }

    #[test]
    fn test_tie_keeps_first_max_location() {
        let queries = vec![
            query("Foo", QueryType::Read, 0.5, 10),
            query("Foo", QueryType::Read, 0.5, 99),
        ];
        let summary = summarize_queries(&queries, 0);
        let reads = &summary.model["Foo"].query_type[&QueryType::Read];
        assert_eq!(reads.max_query_time_code.as_ref().unwrap().line, 10);
    }

    #[test]
    fn test_empty_summary() {
        let queries: Vec<AttributedQuery> = Vec::new();
        let summary = summarize_queries(&queries, 3);
        assert_eq!(summary.total_queries, 0);
        assert_eq!(summary.attribution_misses, 3);
        assert!(summary.model.is_empty());
    }
}
