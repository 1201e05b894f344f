//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while parsing a recorded trace file
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read trace file: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed call-site key {0:?}: expected \"module::function:line\"")]
    MalformedKey(String),

    #[error("invalid timestamp {value:?}: expected format {format}")]
    InvalidTimestamp { value: String, format: &'static str },

    #[error("invalid trace format: {0}")]
    InvalidFormat(String),
}

/// Structural defects in the call/return event stream.
///
/// These are never repaired silently: a repaired stream would fabricate
/// timing data, so the whole trace is rejected instead.
#[derive(Error, Debug)]
pub enum StructuralError {
    #[error("trace contains no events")]
    EmptyTrace,

    #[error("return event for {key} with no open call")]
    ReturnWithoutCall { key: String },

    #[error("return event {found} does not match open call {expected}")]
    MismatchedReturn { expected: String, found: String },

    #[error("second root-level call {key} after the trace stack drained")]
    MultipleRoots { key: String },

    #[error("{count} call(s) never returned before end of trace")]
    UnterminatedCalls { count: usize },
}

/// Errors that can occur during flamegraph generation
#[derive(Error, Debug)]
pub enum FlamegraphError {
    #[error("Empty stack data")]
    EmptyStacks,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Errors that can occur while posting a report to an HTTP sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("sink rejected report: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid sink URL: {0}")]
    InvalidUrl(String),
}
