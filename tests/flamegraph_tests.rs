//! Flamegraph collapse and rendering tests against a real built trace.

use reqtrace_studio::analyzer::{attribute_queries, build_trace};
use reqtrace_studio::flamegraph::{collapse_call_tree, generate_flamegraph, FlamegraphConfig};
use reqtrace_studio::parser::events::{
    parse_timestamp, CallSiteKey, QueryRecord, QueryType, TraceEvent,
};
use reqtrace_studio::utils::config::AnalyzerConfig;

fn call(key: &str, ts: &str) -> TraceEvent {
    TraceEvent::Call {
        key: CallSiteKey::parse(key).unwrap(),
        timestamp: parse_timestamp(ts).unwrap(),
    }
}

fn ret(key: &str, ts: &str) -> TraceEvent {
    TraceEvent::Return {
        key: CallSiteKey::parse(key).unwrap(),
        timestamp: parse_timestamp(ts).unwrap(),
    }
}

#[test]
fn collapse_uses_self_time() {
    // outer runs 1.0s total, inner accounts for 0.4s of it.
    let events = vec![
        call("m::outer:1", "2016-03-12T20:56:30.000000"),
        call("m::inner:2", "2016-03-12T20:56:30.300000"),
        ret("m::inner:3", "2016-03-12T20:56:30.700000"),
        ret("m::outer:4", "2016-03-12T20:56:31.000000"),
    ];

    let trace = build_trace(&events, &AnalyzerConfig::default()).unwrap();
    let stacks = collapse_call_tree(&trace);

    assert_eq!(stacks.len(), 2);
    let outer = stacks.iter().find(|s| s.stack == "m::outer").unwrap();
    let inner = stacks.iter().find(|s| s.stack == "m::outer;m::inner").unwrap();
    assert_eq!(outer.weight, 600_000);
    assert_eq!(inner.weight, 400_000);
}

#[test]
fn collapse_folds_recursive_paths() {
    // f calls itself; the two invocations share one path only at depth 1.
    let events = vec![
        call("m::f:1", "2016-03-12T20:56:30.000000"),
        call("m::f:1", "2016-03-12T20:56:30.100000"),
        ret("m::f:9", "2016-03-12T20:56:30.200000"),
        ret("m::f:9", "2016-03-12T20:56:30.400000"),
    ];

    let trace = build_trace(&events, &AnalyzerConfig::default()).unwrap();
    let stacks = collapse_call_tree(&trace);

    assert_eq!(stacks.len(), 2);
    let top = stacks.iter().find(|s| s.stack == "m::f").unwrap();
    let nested = stacks.iter().find(|s| s.stack == "m::f;m::f").unwrap();
    assert_eq!(top.weight, 300_000);
    assert_eq!(nested.weight, 100_000);
}

#[test]
fn collapse_carries_query_weight() {
    let events = vec![
        call("m::handler:1", "2016-03-12T20:56:30.000000"),
        ret("m::handler:9", "2016-03-12T20:56:31.000000"),
    ];
    let mut trace = build_trace(&events, &AnalyzerConfig::default()).unwrap();

    let query = QueryRecord {
        model: "Foo".to_string(),
        query_type: QueryType::Read,
        query_time: 0.25,
        traceback: Vec::new(),
        call_site: CallSiteKey::parse("m::handler:1").unwrap(),
        call_site_start: parse_timestamp("2016-03-12T20:56:30.000000").unwrap(),
    };
    attribute_queries(&mut trace, &[query], &AnalyzerConfig::default());

    let stacks = collapse_call_tree(&trace);
    assert_eq!(stacks[0].query_weight, 250_000);
}

#[test]
fn svg_renders_all_frames() {
    let events = vec![
        call("m::outer:1", "2016-03-12T20:56:30.000000"),
        call("m::inner:2", "2016-03-12T20:56:30.300000"),
        ret("m::inner:3", "2016-03-12T20:56:30.700000"),
        ret("m::outer:4", "2016-03-12T20:56:31.000000"),
    ];
    let trace = build_trace(&events, &AnalyzerConfig::default()).unwrap();
    let stacks = collapse_call_tree(&trace);

    let config = FlamegraphConfig::new().with_title("GET /api/foos/");
    let svg = generate_flamegraph(&stacks, Some(&config)).unwrap();

    assert!(svg.starts_with("<svg"));
    assert!(svg.contains("GET /api/foos/"));
    assert!(svg.contains("m::outer"));
    assert!(svg.contains("m::inner"));
}
