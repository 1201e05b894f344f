//! Flamegraph generation from the annotated call tree.
//!
//! This module collapses the call tree into weighted stacks and renders
//! them as an interactive SVG, highlighting where request time went and
//! which frames were query-bound.

pub mod generator;

// Re-export main types
pub use generator::{
    collapse_call_tree, generate_flamegraph, generate_text_summary, CollapsedStack,
    FlamegraphConfig,
};
