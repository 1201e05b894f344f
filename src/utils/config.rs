//! Configuration and constants for the analyzer.

use std::time::Duration;

/// Default timeout for HTTP report sinks
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(30);

/// Current report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

// Timestamp formats for the event producer's wire format.
// The producer emits ISO-8601 with a microsecond fraction; parsing accepts
// a variable-width fraction, output always carries six digits.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
pub const TIMESTAMP_DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Path fragment marking frames that belong to the ORM execution layer
pub const DEFAULT_ORM_BOUNDARY_MARKER: &str = "django/db/models/query.py";

/// Minimum duration (seconds) for a closed call to appear as a visible child
pub const DEFAULT_CHILD_THRESHOLD_SECS: f64 = 0.0;

/// Analyzer configuration, passed explicitly into every engine invocation.
///
/// There is deliberately no process-wide state here: each trace gets its
/// own config reference and its own working state.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// A closed call must exceed this duration (seconds) to appear in the
    /// visible tree. Sub-threshold calls are still indexed for query
    /// attribution.
    pub child_threshold: f64,

    /// Path fragment identifying ORM-layer frames in query tracebacks
    pub orm_boundary_marker: String,

    /// Filesystem root of the instrumented application's own source.
    /// Empty means "not configured" and never matches a frame.
    pub app_root: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            child_threshold: DEFAULT_CHILD_THRESHOLD_SECS,
            orm_boundary_marker: DEFAULT_ORM_BOUNDARY_MARKER.to_string(),
            app_root: String::new(),
        }
    }
}

impl AnalyzerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child_threshold(mut self, seconds: f64) -> Self {
        self.child_threshold = seconds;
        self
    }

    pub fn with_orm_boundary_marker(mut self, marker: impl Into<String>) -> Self {
        self.orm_boundary_marker = marker.into();
        self
    }

    pub fn with_app_root(mut self, app_root: impl Into<String>) -> Self {
        self.app_root = app_root.into();
        self
    }
}
