//! Reqtrace Studio CLI
//!
//! Analyzes recorded request traces from instrumented web applications:
//! rebuilds the call tree, attributes database queries to the frames that
//! issued them, and writes a JSON report plus an optional flamegraph.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use reqtrace_studio::commands::{execute_analyze, validate_args, AnalyzeArgs};
use reqtrace_studio::flamegraph::FlamegraphConfig;
use reqtrace_studio::utils::config::{
    DEFAULT_CHILD_THRESHOLD_SECS, DEFAULT_ORM_BOUNDARY_MARKER, SCHEMA_VERSION,
};

/// Reqtrace Studio - Request trace analysis and query attribution
#[derive(Parser, Debug)]
#[command(name = "reqtrace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a recorded trace file
    Analyze {
        /// Path to the trace file written by the instrumentation layer
        #[arg(short, long)]
        trace: PathBuf,

        /// Output path for the JSON report
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Output path for the SVG flamegraph (optional)
        #[arg(short, long)]
        flamegraph: Option<PathBuf>,

        /// Minimum call duration (seconds) to appear in the visible tree
        #[arg(long, default_value_t = DEFAULT_CHILD_THRESHOLD_SECS)]
        threshold: f64,

        /// Application source root, used to attribute queries to app code
        #[arg(long, env = "REQTRACE_APP_ROOT", default_value = "")]
        app_root: String,

        /// Path fragment marking ORM-layer frames in tracebacks
        #[arg(long, default_value = DEFAULT_ORM_BOUNDARY_MARKER)]
        orm_marker: String,

        /// HTTP endpoint to POST the report to (optional)
        #[arg(long)]
        post_url: Option<String>,

        /// Flamegraph title
        #[arg(long)]
        title: Option<String>,

        /// Flamegraph width in pixels
        #[arg(long, default_value = "1200")]
        width: usize,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Validate a report JSON file
    Validate {
        /// Path to report JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Analyze {
            trace,
            output,
            flamegraph,
            threshold,
            app_root,
            orm_marker,
            post_url,
            title,
            width,
            summary,
        } => {
            // Create flamegraph config
            let fg_config = if flamegraph.is_some() {
                let mut config = FlamegraphConfig::new();

                if let Some(title_str) = title {
                    config = config.with_title(title_str);
                }

                config = config.with_width(width);

                Some(config)
            } else {
                None
            };

            // Create analyze args
            let args = AnalyzeArgs {
                trace_file: trace,
                output_json: output,
                output_svg: flamegraph,
                flamegraph_config: fg_config,
                child_threshold: threshold,
                app_root,
                orm_marker,
                http_url: post_url,
                print_summary: summary,
            };

            // Validate args first
            validate_args(&args)?;

            // Execute analysis
            execute_analyze(args)?;
        }

        Commands::Validate { file } => {
            validate_report_file(file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}

/// Validate a report JSON file
///
/// **Private** - internal command implementation
fn validate_report_file(file_path: PathBuf) -> Result<()> {
    use reqtrace_studio::output::read_report;

    println!("Validating report: {}", file_path.display());

    let report = read_report(&file_path)?;

    println!("✓ Valid report JSON");
    println!("  Version: {}", report.version);
    if let Some(request) = &report.request {
        println!("  Request: {} {}", request.method, request.path);
    }
    println!("  Root frames: {}", report.trace.len());
    println!("  Total queries: {}", report.query_summary.total_queries);
    println!("  Models: {}", report.query_summary.model.len());

    Ok(())
}

/// Display schema information
///
/// **Private** - internal command implementation
fn display_schema(show_details: bool) {
    println!("Reqtrace Studio Report Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  version: string           - Schema version (e.g., '1.0.0')");
        println!("  request: object?          - Request path/method/duration");
        println!("  trace: object             - Nested call tree keyed by call-site key");
        println!("    <key>: object           - One invocation");
        println!("      total_time: number    - Duration in seconds");
        println!("      queries: array        - Attributed queries with code locations");
        println!("      stats: object         - Call/return timestamps, line numbers");
        println!("      next: array           - Child invocations");
        println!("  query_summary: object     - Aggregated query statistics");
        println!("    query_type: object      - Global per-type counts");
        println!("    model: object           - Per-model, per-type count/total/max");
        println!("    attribution_misses: number - Queries that fell back to root");
        println!("  generated_at: string      - ISO 8601 timestamp");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
///
/// **Private** - internal command implementation
fn display_version() {
    println!("Reqtrace Studio v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Request trace analysis and query attribution for instrumented web applications.");
}
