//! Input parsing for recorded trace files.
//!
//! The instrumentation layer writes one JSON document per request:
//! call/return events under `profiler_traces`, query records under
//! `queries`, plus request metadata. This module turns that raw document
//! into typed events at the boundary, rejecting malformed input instead of
//! propagating partially-parsed strings.

use crate::utils::config::{TIMESTAMP_DISPLAY_FORMAT, TIMESTAMP_FORMAT};
use crate::utils::error::ParseError;
use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Identity of one textual call location: module, function, line.
///
/// Parsed from the producer's `"<module>::<function>:<line>"` identifiers.
/// Two keys are equal iff all three fields match; a return event is allowed
/// to carry a different line than its call (the return point differs from
/// the call point), which the tree builder accounts for by comparing only
/// module and function when pairing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSiteKey {
    pub module: String,
    pub function: String,
    pub line: u32,
}

impl CallSiteKey {
    /// Parse a formatted key identifier.
    ///
    /// # Errors
    /// * `ParseError::MalformedKey` - identifier does not match the
    ///   `module::function:line` shape
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let malformed = || ParseError::MalformedKey(raw.to_string());

        let (module, rest) = raw.split_once("::").ok_or_else(malformed)?;
        let (function, line) = rest.rsplit_once(':').ok_or_else(malformed)?;

        if module.is_empty() || module.contains(':') {
            return Err(malformed());
        }
        if function.is_empty() || function.contains(':') {
            return Err(malformed());
        }
        let line: u32 = line.parse().map_err(|_| malformed())?;

        Ok(Self {
            module: module.to_string(),
            function: function.to_string(),
            line,
        })
    }

    /// Identity used when pairing a return event with its open call:
    /// module and function only, the line may legitimately differ.
    pub fn same_function(&self, other: &CallSiteKey) -> bool {
        self.module == other.module && self.function == other.function
    }
}

impl fmt::Display for CallSiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}:{}", self.module, self.function, self.line)
    }
}

/// Parse a producer timestamp in the fixed wire format.
///
/// Any other shape fails fast rather than guessing.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ParseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|_| {
        ParseError::InvalidTimestamp {
            value: raw.to_string(),
            format: TIMESTAMP_FORMAT,
        }
    })
}

/// Format a timestamp back into the wire format (six-digit fraction).
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_DISPLAY_FORMAT).to_string()
}

/// A single call or return event, in execution order.
///
/// The position in the input sequence is the execution order; timestamps
/// are informational and only used for durations and index lookups.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Call {
        key: CallSiteKey,
        timestamp: NaiveDateTime,
    },
    Return {
        key: CallSiteKey,
        timestamp: NaiveDateTime,
    },
}

impl TraceEvent {
    pub fn key(&self) -> &CallSiteKey {
        match self {
            TraceEvent::Call { key, .. } | TraceEvent::Return { key, .. } => key,
        }
    }
}

/// Kind of database query
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Read,
    Write,
    Update,
    Delete,
    Other,
}

impl FromStr for QueryType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "read" | "select" => Self::Read,
            "write" | "insert" => Self::Write,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Other,
        })
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A database query captured during the request, fully typed.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub model: String,
    pub query_type: QueryType,
    /// Total query duration in seconds
    pub query_time: f64,
    /// Raw traceback lines, outermost frame first
    pub traceback: Vec<String>,
    /// Call-site key of the enclosing call frame, captured at query time
    pub call_site: CallSiteKey,
    /// Start timestamp of that frame, captured at query time
    pub call_site_start: NaiveDateTime,
}

/// Raw trace file as written by the instrumentation layer
#[derive(Debug, Clone, Deserialize)]
pub struct RawTraceFile {
    /// Request path (e.g. "/api/foos/")
    #[serde(default)]
    pub request: Option<String>,

    /// HTTP method
    #[serde(default)]
    pub method: Option<String>,

    /// Total request wall time in seconds
    #[serde(default)]
    pub total_request_time: Option<f64>,

    /// Flat call/return event log
    #[serde(default)]
    pub profiler_traces: Vec<RawTraceEvent>,

    /// Captured database queries
    #[serde(default)]
    pub queries: Vec<RawQueryRecord>,
}

/// One raw event record: exactly one of `start_time` / `end_time` is set
#[derive(Debug, Clone, Deserialize)]
pub struct RawTraceEvent {
    pub key: String,

    #[serde(default)]
    pub start_time: Option<String>,

    #[serde(default)]
    pub end_time: Option<String>,
}

/// One raw query record
#[derive(Debug, Clone, Deserialize)]
pub struct RawQueryRecord {
    pub model: String,

    /// Duration in seconds
    pub total_query_time: f64,

    /// Missing in older trace files; those queries default to reads
    #[serde(default)]
    pub query_type: Option<String>,

    #[serde(default)]
    pub traceback: Vec<String>,

    /// Two-element `[key, timestamp]` array identifying the enclosing frame
    pub function_call_key: (String, String),
}

/// Load and deserialize a recorded trace file
pub fn load_trace_file(path: impl AsRef<Path>) -> Result<RawTraceFile, ParseError> {
    let path = path.as_ref();
    debug!("Loading trace file: {}", path.display());

    let file = std::fs::File::open(path)?;
    let raw: RawTraceFile = serde_json::from_reader(std::io::BufReader::new(file))?;

    debug!(
        "Loaded {} events, {} queries",
        raw.profiler_traces.len(),
        raw.queries.len()
    );
    Ok(raw)
}

/// Convert raw event records into typed events, in input order.
///
/// # Errors
/// * `ParseError::MalformedKey` - bad call-site identifier
/// * `ParseError::InvalidTimestamp` - timestamp not in the wire format
/// * `ParseError::InvalidFormat` - record has both or neither of
///   `start_time` / `end_time`
pub fn parse_events(raw_events: &[RawTraceEvent]) -> Result<Vec<TraceEvent>, ParseError> {
    let mut events = Vec::with_capacity(raw_events.len());

    for raw in raw_events {
        let key = CallSiteKey::parse(&raw.key)?;
        let event = match (&raw.start_time, &raw.end_time) {
            (Some(start), None) => TraceEvent::Call {
                key,
                timestamp: parse_timestamp(start)?,
            },
            (None, Some(end)) => TraceEvent::Return {
                key,
                timestamp: parse_timestamp(end)?,
            },
            _ => {
                return Err(ParseError::InvalidFormat(format!(
                    "event {} must carry exactly one of start_time / end_time",
                    raw.key
                )))
            }
        };
        events.push(event);
    }

    Ok(events)
}

/// Convert raw query records into typed records, in input order.
pub fn parse_queries(raw_queries: &[RawQueryRecord]) -> Result<Vec<QueryRecord>, ParseError> {
    let mut queries = Vec::with_capacity(raw_queries.len());

    for raw in raw_queries {
        let (raw_key, raw_timestamp) = &raw.function_call_key;
        let query_type = raw
            .query_type
            .as_deref()
            .unwrap_or("read")
            .parse()
            .unwrap_or(QueryType::Other);

        queries.push(QueryRecord {
            model: raw.model.clone(),
            query_type,
            query_time: raw.total_query_time,
            traceback: raw.traceback.clone(),
            call_site: CallSiteKey::parse(raw_key)?,
            call_site_start: parse_timestamp(raw_timestamp)?,
        });
    }

    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        let key = CallSiteKey::parse("myapp.views::get_foos:42").unwrap();
        assert_eq!(key.module, "myapp.views");
        assert_eq!(key.function, "get_foos");
        assert_eq!(key.line, 42);
        assert_eq!(key.to_string(), "myapp.views::get_foos:42");
    }

    #[test]
    fn test_parse_key_rejects_malformed() {
        for raw in [
            "",
            "no_separator:12",
            "mod::func",
            "mod::func:notaline",
            "::func:3",
            "mod:::3",
            "mod::func:",
        ] {
            assert!(
                matches!(CallSiteKey::parse(raw), Err(ParseError::MalformedKey(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_key_same_function_ignores_line() {
        let call = CallSiteKey::parse("m::f:5").unwrap();
        let ret = CallSiteKey::parse("m::f:7").unwrap();
        assert!(call.same_function(&ret));
        assert_ne!(call, ret);
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2016-03-12T20:56:30.812114").unwrap();
        assert_eq!(format_timestamp(ts), "2016-03-12T20:56:30.812114");
    }

    #[test]
    fn test_parse_timestamp_rejects_other_formats() {
        assert!(parse_timestamp("2016-03-12 20:56:30").is_err());
        assert!(parse_timestamp("1457815000").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_query_type_parsing() {
        assert_eq!("read".parse::<QueryType>().unwrap(), QueryType::Read);
        assert_eq!("INSERT".parse::<QueryType>().unwrap(), QueryType::Write);
        assert_eq!("upsert".parse::<QueryType>().unwrap(), QueryType::Other);
    }

    #[test]
    fn test_parse_events_requires_one_timestamp() {
        let raw = RawTraceEvent {
            key: "m::f:1".to_string(),
            start_time: Some("2016-03-12T20:56:30.812114".to_string()),
            end_time: Some("2016-03-12T20:56:30.815226".to_string()),
        };
        assert!(matches!(
            parse_events(&[raw]),
            Err(ParseError::InvalidFormat(_))
        ));
    }
}
