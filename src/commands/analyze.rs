//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Loads a recorded trace file
//! 2. Parses events and query records at the boundary
//! 3. Builds the call tree
//! 4. Attributes queries and summarizes them
//! 5. Generates the flamegraph (if requested)
//! 6. Writes output files and posts to the HTTP sink

use crate::analyzer::{attribute_and_summarize, build_trace};
use crate::flamegraph::{
    collapse_call_tree, generate_flamegraph, generate_text_summary, FlamegraphConfig,
};
use crate::output::{write_report, write_svg, HttpSink};
use crate::parser::events::{load_trace_file, parse_events, parse_queries};
use crate::parser::schema::{Report, RequestInfo};
use crate::utils::config::{AnalyzerConfig, SCHEMA_VERSION};
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// Path to the recorded trace file
    pub trace_file: PathBuf,

    /// Output path for the JSON report
    pub output_json: PathBuf,

    /// Output path for the SVG flamegraph (optional)
    pub output_svg: Option<PathBuf>,

    /// Flamegraph configuration
    pub flamegraph_config: Option<FlamegraphConfig>,

    /// Minimum duration (seconds) for a call to appear in the visible tree
    pub child_threshold: f64,

    /// Application source root for traceback attribution
    pub app_root: String,

    /// Path fragment marking ORM-layer frames
    pub orm_marker: String,

    /// HTTP endpoint to POST the report to (optional)
    pub http_url: Option<String>,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        let config = AnalyzerConfig::default();
        Self {
            trace_file: PathBuf::new(),
            output_json: PathBuf::from("report.json"),
            output_svg: None,
            flamegraph_config: None,
            child_threshold: config.child_threshold,
            app_root: config.app_root,
            orm_marker: config.orm_boundary_marker,
            http_url: None,
            print_summary: false,
        }
    }
}

/// Validate analyze arguments
///
/// **Public** - can be called before execute_analyze for early validation
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if args.trace_file.as_os_str().is_empty() {
        anyhow::bail!("Trace file path cannot be empty");
    }

    if !args.trace_file.exists() {
        anyhow::bail!("Trace file does not exist: {}", args.trace_file.display());
    }

    if args.child_threshold < 0.0 {
        anyhow::bail!("Threshold must not be negative");
    }

    if let Some(url) = &args.http_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("Sink URL must start with http:// or https://");
        }
    }

    Ok(())
}

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Trace file loading or parsing errors
/// * Structural defects in the event stream
/// * File write or sink errors
pub fn execute_analyze(args: AnalyzeArgs) -> Result<()> {
    let start_time = Instant::now();

    info!("Analyzing trace file: {}", args.trace_file.display());

    let analyzer_config = AnalyzerConfig::new()
        .with_child_threshold(args.child_threshold)
        .with_orm_boundary_marker(args.orm_marker.clone())
        .with_app_root(args.app_root.clone());

    // Step 1: Load the recorded trace
    info!("Step 1/6: Loading trace file...");
    let raw = load_trace_file(&args.trace_file).context("Failed to load trace file")?;

    // Step 2: Parse events and queries at the boundary
    info!("Step 2/6: Parsing {} events, {} queries...",
          raw.profiler_traces.len(), raw.queries.len());
    let events = parse_events(&raw.profiler_traces).context("Failed to parse trace events")?;
    let queries = parse_queries(&raw.queries).context("Failed to parse query records")?;

    // Step 3: Build the call tree
    info!("Step 3/6: Building call tree...");
    let mut trace = build_trace(&events, &analyzer_config)
        .context("Trace event stream is structurally invalid")?;

    debug!(
        "Built tree: {} invocations, depth {}",
        trace.node_count(),
        trace.depth()
    );

    // Step 4: Attribute queries and summarize
    info!("Step 4/6: Attributing {} queries...", queries.len());
    let summary = attribute_and_summarize(&mut trace, &queries, &analyzer_config);

    if summary.attribution_misses > 0 {
        info!(
            "{} queries fell back to root attribution",
            summary.attribution_misses
        );
    }

    // Step 5: Generate flamegraph (if requested)
    let stacks = collapse_call_tree(&trace);
    let svg_content = if args.output_svg.is_some() {
        info!("Step 5/6: Generating flamegraph...");
        let config = args.flamegraph_config.as_ref();
        let svg =
            generate_flamegraph(&stacks, config).context("Failed to generate flamegraph")?;
        Some(svg)
    } else {
        info!("Step 5/6: Skipping flamegraph generation (not requested)");
        None
    };

    // Step 6: Write outputs
    info!("Step 6/6: Writing output files...");

    let report = Report {
        version: SCHEMA_VERSION.to_string(),
        request: build_request_info(&raw),
        trace: trace.to_representation(),
        query_summary: summary,
        generated_at: chrono::Utc::now().to_rfc3339(),
    };

    write_report(&report, &args.output_json).context("Failed to write report JSON")?;
    info!("✓ Report written to: {}", args.output_json.display());

    if let (Some(svg), Some(svg_path)) = (svg_content, &args.output_svg) {
        write_svg(&svg, svg_path).context("Failed to write flamegraph SVG")?;
        info!("✓ Flamegraph written to: {}", svg_path.display());
    }

    if let Some(url) = &args.http_url {
        let sink = HttpSink::new(url.clone()).context("Failed to create HTTP sink")?;
        sink.post_report(&report).context("Failed to post report")?;
        info!("✓ Report posted to: {}", url);
    }

    if args.print_summary {
        print_summary(&report, &stacks);
    }

    let elapsed = start_time.elapsed();
    info!("Analysis completed in {:.2}s", elapsed.as_secs_f64());

    Ok(())
}

/// Carry request metadata from the trace file into the report
///
/// **Private** - internal helper for execute_analyze
fn build_request_info(raw: &crate::parser::events::RawTraceFile) -> Option<RequestInfo> {
    match (&raw.request, &raw.method) {
        (Some(path), Some(method)) => Some(RequestInfo {
            path: path.clone(),
            method: method.clone(),
            total_request_time: raw.total_request_time,
        }),
        _ => None,
    }
}

/// Print the stdout summary block
///
/// **Private** - internal helper for execute_analyze
fn print_summary(report: &Report, stacks: &[crate::flamegraph::CollapsedStack]) {
    let summary = &report.query_summary;

    println!("\n{}", "=".repeat(80));
    println!("TRACE SUMMARY");
    println!("{}", "=".repeat(80));
    if let Some(request) = &report.request {
        println!("Request:  {} {}", request.method, request.path);
        if let Some(total) = request.total_request_time {
            println!("Duration: {:.4}s", total);
        }
    }
    println!("Total SQL queries: {}", summary.total_queries);
    println!(
        "Total time on SQL queries: {:.4}s",
        summary.total_time_on_queries
    );
    if summary.attribution_misses > 0 {
        println!("Unattributed queries: {}", summary.attribution_misses);
    }
    for (model, stats) in &summary.model {
        println!("  {} ({} queries)", model, stats.total_query_count);
        for (query_type, type_stats) in &stats.query_type {
            println!(
                "    {}: count {}, total {:.4}s, max {:.4}s",
                query_type, type_stats.count, type_stats.total_query_time, type_stats.max_query_time
            );
        }
    }
    println!("\n{}", generate_text_summary(stacks, 10));
    println!("{}", "=".repeat(80));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_args_missing_file() {
        let args = AnalyzeArgs {
            trace_file: PathBuf::from("/nonexistent/trace.json"),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_empty_path() {
        let args = AnalyzeArgs::default();
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_negative_threshold() {
        let trace_file = tempfile::NamedTempFile::new().unwrap();
        let args = AnalyzeArgs {
            trace_file: trace_file.path().to_path_buf(),
            child_threshold: -1.0,
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_bad_sink_url() {
        let trace_file = tempfile::NamedTempFile::new().unwrap();
        let args = AnalyzeArgs {
            trace_file: trace_file.path().to_path_buf(),
            http_url: Some("ftp://collector/".to_string()),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_valid() {
        let trace_file = tempfile::NamedTempFile::new().unwrap();
        let args = AnalyzeArgs {
            trace_file: trace_file.path().to_path_buf(),
            ..Default::default()
        };
        assert!(validate_args(&args).is_ok());
    }
}
