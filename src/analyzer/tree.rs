//! Call tree reconstruction from a flat call/return event stream.
//!
//! The event log is unstructured: only key+timestamp identity, appended in
//! execution order. Rebuilding walks the log once with an explicit stack of
//! open invocations, producing an arena-backed tree plus an index from
//! call-site key to every invocation closed at that key. Structurally
//! inconsistent input (unbalanced or mismatched call/return pairs) rejects
//! the whole trace; a repaired stream would fabricate timing data.

use crate::parser::events::{format_timestamp, CallSiteKey, TraceEvent};
use crate::parser::schema::{AttributedQuery, CallNodeBody, CallNodeRepr, CallStats, LineNumbers};
use crate::utils::config::AnalyzerConfig;
use crate::utils::error::StructuralError;
use chrono::NaiveDateTime;
use log::debug;
use std::collections::HashMap;

/// Index into the trace's node arena
pub type NodeId = usize;

/// One concrete invocation of a function.
///
/// A node is **open** (awaiting its return) from creation until its
/// matching return event is processed, **closed** afterwards. The builder
/// never exposes open nodes: every node in a built [`CallTrace`] is closed.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    key: CallSiteKey,
    parent: Option<NodeId>,
    start_time: NaiveDateTime,
    end_time: Option<NaiveDateTime>,
    end_line: Option<u32>,
    total_time: Option<f64>,
    children: Vec<NodeId>,
    queries: Vec<AttributedQuery>,
}

impl FunctionCall {
    fn open(key: CallSiteKey, start_time: NaiveDateTime, parent: Option<NodeId>) -> Self {
        Self {
            key,
            parent,
            start_time,
            end_time: None,
            end_line: None,
            total_time: None,
            children: Vec::new(),
            queries: Vec::new(),
        }
    }

    fn close(&mut self, end_time: NaiveDateTime, end_line: u32) {
        self.end_time = Some(end_time);
        self.end_line = Some(end_line);
        self.total_time = Some(seconds_between(self.start_time, end_time));
    }

    /// Call-site key of the call event (module, function, call line)
    pub fn key(&self) -> &CallSiteKey {
        &self.key
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.end_time
    }

    /// Line number reported by the return event
    pub fn end_line(&self) -> Option<u32> {
        self.end_line
    }

    /// Duration in seconds; zero while the node is still open
    pub fn total_time(&self) -> f64 {
        self.total_time.unwrap_or(0.0)
    }

    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }

    /// Visible children (nested calls above the duration threshold),
    /// in execution order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Queries attributed to this invocation, in attribution order
    pub fn queries(&self) -> &[AttributedQuery] {
        &self.queries
    }
}

/// Duration between two producer timestamps, in seconds
fn seconds_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    let delta = end.signed_duration_since(start);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64,
    }
}

/// A fully built call tree: node arena, root, and the call-site index.
///
/// All working state lives in this value; building and annotating traces
/// for different requests can run concurrently without locking.
#[derive(Debug, Clone)]
pub struct CallTrace {
    nodes: Vec<FunctionCall>,
    root: NodeId,
    index: HashMap<CallSiteKey, Vec<NodeId>>,
}

impl CallTrace {
    /// Build the call tree from an ordered event stream.
    ///
    /// **Public** - main entry point for tree construction
    ///
    /// # Arguments
    /// * `events` - call/return events in execution order
    /// * `config` - analyzer configuration (child-visibility threshold)
    ///
    /// # Errors
    /// * `StructuralError::EmptyTrace` - no events
    /// * `StructuralError::ReturnWithoutCall` - stack underflow
    /// * `StructuralError::MismatchedReturn` - return does not pair with
    ///   the innermost open call
    /// * `StructuralError::MultipleRoots` - second call at root depth
    ///   after the stack drained
    /// * `StructuralError::UnterminatedCalls` - open calls at end of stream
    pub fn build(events: &[TraceEvent], config: &AnalyzerConfig) -> Result<Self, StructuralError> {
        if events.is_empty() {
            return Err(StructuralError::EmptyTrace);
        }

        debug!("Building call tree from {} events", events.len());

        let mut nodes: Vec<FunctionCall> = Vec::with_capacity(events.len() / 2);
        let mut index: HashMap<CallSiteKey, Vec<NodeId>> = HashMap::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;

        for event in events {
            match event {
                TraceEvent::Call { key, timestamp } => {
                    if stack.is_empty() && root.is_some() {
                        // A second independent trace in one log is never
                        // merged silently.
                        return Err(StructuralError::MultipleRoots {
                            key: key.to_string(),
                        });
                    }

                    let id = nodes.len();
                    nodes.push(FunctionCall::open(key.clone(), *timestamp, stack.last().copied()));
                    if stack.is_empty() {
                        root = Some(id);
                    }
                    stack.push(id);
                }

                TraceEvent::Return { key, timestamp } => {
                    let id = stack.pop().ok_or_else(|| StructuralError::ReturnWithoutCall {
                        key: key.to_string(),
                    })?;

                    if !nodes[id].key.same_function(key) {
                        return Err(StructuralError::MismatchedReturn {
                            expected: nodes[id].key.to_string(),
                            found: key.to_string(),
                        });
                    }

                    nodes[id].close(*timestamp, key.line);
                    index.entry(nodes[id].key.clone()).or_default().push(id);

                    // Sub-threshold calls stay indexed but invisible.
                    if let Some(&parent) = stack.last() {
                        if nodes[id].total_time() > config.child_threshold {
                            nodes[parent].children.push(id);
                        }
                    }
                }
            }
        }

        if !stack.is_empty() {
            return Err(StructuralError::UnterminatedCalls { count: stack.len() });
        }

        // A non-empty balanced stream always produced a root by now.
        let root = root.ok_or(StructuralError::EmptyTrace)?;

        debug!(
            "Built call tree: {} nodes, depth {}",
            nodes.len(),
            depth_from(&nodes, root)
        );

        Ok(Self { nodes, root, index })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &FunctionCall {
        &self.nodes[id]
    }

    /// Total number of invocations (equals the number of call events)
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the visible tree (root counts as 1)
    pub fn depth(&self) -> usize {
        depth_from(&self.nodes, self.root)
    }

    /// Locate the invocation closed at `key` whose start time equals
    /// `start_time` exactly. This is an exact-match lookup, not a
    /// nearest-time search: the pair was captured at query execution time
    /// and is expected to identify the frame uniquely.
    pub fn find_node(&self, key: &CallSiteKey, start_time: NaiveDateTime) -> Option<NodeId> {
        self.index
            .get(key)?
            .iter()
            .copied()
            .find(|&id| self.nodes[id].start_time == start_time)
    }

    /// Invocations closed at `key`, in close order
    pub fn nodes_for_key(&self, key: &CallSiteKey) -> &[NodeId] {
        self.index.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append a query to a closed node's query list.
    ///
    /// No other node state is touched; attribution happens strictly after
    /// the tree is fully built.
    pub fn attach_query(&mut self, id: NodeId, query: AttributedQuery) {
        debug_assert!(self.nodes[id].is_closed());
        self.nodes[id].queries.push(query);
    }

    /// All attributed queries, grouped by node in arena (creation) order
    pub fn queries(&self) -> impl Iterator<Item = &AttributedQuery> {
        self.nodes.iter().flat_map(|node| node.queries.iter())
    }

    /// External nested representation of the annotated tree
    pub fn to_representation(&self) -> CallNodeRepr {
        self.node_representation(self.root)
    }

    fn node_representation(&self, id: NodeId) -> CallNodeRepr {
        let node = &self.nodes[id];
        let body = CallNodeBody {
            total_time: node.total_time(),
            queries: node.queries.clone(),
            stats: CallStats {
                call: format_timestamp(node.start_time),
                ret: format_timestamp(node.end_time.unwrap_or(node.start_time)),
                line_numbers: LineNumbers {
                    start: node.key.line,
                    end: node.end_line.unwrap_or(node.key.line),
                },
            },
            next: node
                .children
                .iter()
                .map(|&child| self.node_representation(child))
                .collect(),
        };

        let mut repr = CallNodeRepr::new();
        repr.insert(node.key.to_string(), body);
        repr
    }
}

fn depth_from(nodes: &[FunctionCall], id: NodeId) -> usize {
    1 + nodes[id]
        .children
        .iter()
        .map(|&child| depth_from(nodes, child))
        .max()
        .unwrap_or(0)
}
