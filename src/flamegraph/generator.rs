//! SVG flamegraph generation from the annotated call tree.
//!
//! The call tree is collapsed into semicolon-separated stacks weighted by
//! self time (a frame's duration minus its visible children), then rendered
//! with a manual SVG generator:
//! - Frames that issued database queries are highlighted
//! - Inverted layout (root at bottom)
//! - No rendering dependencies

use crate::analyzer::tree::{CallTrace, NodeId};
use crate::utils::error::FlamegraphError;
use log::{debug, info};
use std::collections::HashMap;

/// A single collapsed stack entry
///
/// **Public** - used by the SVG generator and text summary
#[derive(Debug, Clone)]
pub struct CollapsedStack {
    /// Stack trace as semicolon-separated `module::function` names
    pub stack: String,

    /// Weight: self time of this stack in microseconds
    pub weight: u64,

    /// Time this frame spent in attributed queries, in microseconds
    pub query_weight: u64,
}

impl CollapsedStack {
    pub fn new(stack: String, weight: u64, query_weight: u64) -> Self {
        Self {
            stack,
            weight,
            query_weight,
        }
    }
}

/// Flamegraph configuration
#[derive(Debug, Clone)]
pub struct FlamegraphConfig {
    pub title: String,
    pub width: usize,
}

impl Default for FlamegraphConfig {
    fn default() -> Self {
        Self {
            title: "Request Trace Profile".to_string(),
            width: 1200,
        }
    }
}

impl FlamegraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

/// Collapse the call tree into weighted stacks.
///
/// **Public** - main entry point for stack collapsing
///
/// # Algorithm
/// 1. Walk the visible tree depth-first, keeping the frame path
/// 2. Weight each path by self time (duration minus visible children)
/// 3. Aggregate identical paths (recursive calls fold together)
/// 4. Sort by weight, descending
pub fn collapse_call_tree(trace: &CallTrace) -> Vec<CollapsedStack> {
    let mut stack_map: HashMap<String, (u64, u64)> = HashMap::new();
    let mut path: Vec<String> = Vec::new();

    collapse_node(trace, trace.root(), &mut path, &mut stack_map);

    let mut stacks: Vec<CollapsedStack> = stack_map
        .into_iter()
        .map(|(stack, (weight, query_weight))| CollapsedStack::new(stack, weight, query_weight))
        .collect();

    stacks.sort_by(|a, b| b.weight.cmp(&a.weight));

    debug!("Collapsed call tree into {} unique stacks", stacks.len());
    stacks
}

fn collapse_node(
    trace: &CallTrace,
    id: NodeId,
    path: &mut Vec<String>,
    stack_map: &mut HashMap<String, (u64, u64)>,
) {
    let node = trace.node(id);
    path.push(format!("{}::{}", node.key().module, node.key().function));

    let children_micros: u64 = node
        .children()
        .iter()
        .map(|&child| to_micros(trace.node(child).total_time()))
        .sum();
    let self_micros = to_micros(node.total_time()).saturating_sub(children_micros);
    let query_micros: u64 = node.queries().iter().map(|q| to_micros(q.query_time)).sum();

    let entry = stack_map.entry(path.join(";")).or_insert((0, 0));
    entry.0 += self_micros;
    entry.1 += query_micros;

    for &child in node.children() {
        collapse_node(trace, child, path, stack_map);
    }

    path.pop();
}

fn to_micros(seconds: f64) -> u64 {
    if seconds <= 0.0 {
        0
    } else {
        (seconds * 1_000_000.0).round() as u64
    }
}

/// Internal node structure for building the render tree
struct Node {
    name: String,
    value: u64,
    query_value: u64,
    children: HashMap<String, Node>,
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            value: 0,
            query_value: 0,
            children: HashMap::new(),
        }
    }

    fn insert(&mut self, stack: &[&str], value: u64, query_value: u64) {
        self.value += value;
        self.query_value += query_value;
        if let Some((head, tail)) = stack.split_first() {
            let child = self
                .children
                .entry(head.to_string())
                .or_insert_with(|| Node::new(head.to_string()));
            child.insert(tail, value, query_value);
        }
    }
}

/// Generate an SVG flamegraph from collapsed stacks
///
/// **Public** - main entry point for flamegraph rendering
pub fn generate_flamegraph(
    stacks: &[CollapsedStack],
    config: Option<&FlamegraphConfig>,
) -> Result<String, FlamegraphError> {
    if stacks.is_empty() {
        return Err(FlamegraphError::EmptyStacks);
    }

    let config = config.cloned().unwrap_or_default();
    info!("Generating flamegraph with {} stacks", stacks.len());

    // 1. Build the render tree
    let mut root = Node::new("request".to_string());
    for stack in stacks {
        let stack_parts: Vec<&str> = stack.stack.split(';').collect();
        root.insert(&stack_parts, stack.weight, stack.query_weight);
    }

    let max_depth = calculate_max_depth(&root);

    // 2. Render SVG
    let mut svg_content = String::new();
    let width = config.width;
    let height_per_level = 20;
    let graph_height = (max_depth + 1) * height_per_level;
    let legend_height = 60;
    let total_height = graph_height + legend_height;

    svg_content.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        width, total_height, width, total_height
    ));

    svg_content.push_str(
        r#"<style>.func { font: 12px sans-serif; } .func:hover { stroke: black; stroke-width: 1; cursor: pointer; opacity: 0.9; }</style>"#,
    );

    svg_content.push_str(&format!(
        r#"<text x="{}" y="20" font-size="16" text-anchor="middle" font-weight="bold">{}</text>"#,
        width / 2,
        config.title
    ));

    // Inverted layout: root at the bottom
    render_node(
        &root,
        0,
        0.0,
        width as f64,
        &mut svg_content,
        height_per_level,
        graph_height,
    );

    render_legend(&mut svg_content, graph_height);

    svg_content.push_str("</svg>");

    info!("Flamegraph generated successfully ({} bytes)", svg_content.len());
    Ok(svg_content)
}

/// Query-heavy frames stand out; everything else shades by query share.
fn get_node_color(node: &Node) -> &'static str {
    let query_share = if node.value > 0 {
        node.query_value as f64 / node.value as f64
    } else {
        0.0
    };

    if node.name == "request" {
        "rgb(100, 149, 237)" // Cornflower Blue
    } else if query_share > 0.5 {
        "rgb(220, 20, 60)" // Crimson (query-bound)
    } else if query_share > 0.1 {
        "rgb(255, 140, 0)" // Dark Orange
    } else if node.query_value > 0 {
        "rgb(255, 200, 80)" // Light Orange
    } else {
        "rgb(169, 169, 169)" // Gray (pure compute)
    }
}

fn calculate_max_depth(node: &Node) -> usize {
    if node.children.is_empty() {
        return 0;
    }
    let max_child_depth = node
        .children
        .values()
        .map(calculate_max_depth)
        .max()
        .unwrap_or(0);
    max_child_depth + 1
}

fn render_node(
    node: &Node,
    level: usize,
    x: f64,
    w: f64,
    out: &mut String,
    h: usize,
    graph_height: usize,
) {
    if w < 0.5 {
        return;
    }

    let color = get_node_color(node);

    // Y position inverted, with margin for the title
    let y = graph_height - ((level + 1) * h) + 30;

    let millis = node.value as f64 / 1000.0;
    out.push_str(&format!(
        r#"<rect x="{:.2}" y="{}" width="{:.2}" height="{}" fill="{}" class="func"><title>{} ({:.3} ms, {:.3} ms in queries)</title></rect>"#,
        x,
        y,
        w,
        h,
        color,
        node.name,
        millis,
        node.query_value as f64 / 1000.0
    ));

    if w > 35.0 {
        let char_width = 7.0;
        let max_chars = (w / char_width) as usize;
        let display_name = if node.name.len() > max_chars && max_chars > 3 {
            format!("{}...", &node.name[0..max_chars - 3])
        } else {
            node.name.clone()
        };

        if !display_name.is_empty() {
            out.push_str(&format!(
                r#"<text x="{:.2}" y="{}" dx="4" dy="14" font-size="12" fill="white" pointer-events="none">{}</text>"#,
                x, y, display_name
            ));
        }
    }

    let mut current_x = x;
    let mut children_vec: Vec<&Node> = node.children.values().collect();
    children_vec.sort_by(|a, b| b.value.cmp(&a.value));

    for child in children_vec {
        let child_w = (child.value as f64 / node.value.max(1) as f64) * w;
        render_node(child, level + 1, current_x, child_w, out, h, graph_height);
        current_x += child_w;
    }
}

fn render_legend(out: &mut String, graph_height: usize) {
    let legend_y = graph_height + 50;

    out.push_str(&format!(
        r#"<text x="10" y="{}" font-size="14" font-weight="bold">Legend:</text>"#,
        legend_y
    ));

    let items = [
        ("Query-bound", "rgb(220, 20, 60)"),
        ("Mixed", "rgb(255, 140, 0)"),
        ("Some queries", "rgb(255, 200, 80)"),
        ("Compute", "rgb(169, 169, 169)"),
    ];

    for (i, (label, color)) in items.iter().enumerate() {
        let x = 80 + (i * 130);
        out.push_str(&format!(
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}" rx="2"/>"#,
            x,
            legend_y - 12,
            color
        ));
        out.push_str(&format!(
            r#"<text x="{}" y="{}" font-size="12">{}</text>"#,
            x + 20,
            legend_y,
            label
        ));
    }
}

/// Create a text summary table of the hottest stacks
///
/// **Public** - used by the analyze command's `--summary` output
pub fn generate_text_summary(stacks: &[CollapsedStack], max_lines: usize) -> String {
    let mut lines = Vec::new();

    let total_micros: u64 = stacks.iter().map(|s| s.weight).sum();
    let total = total_micros.max(1);

    lines.push("  HOTTEST CALL PATHS (self time)".to_string());
    lines.push(format!(
        "  {:<52} {:>12} {:>12} {:>7}",
        "Call Path", "SELF (ms)", "QUERY (ms)", "%"
    ));

    for stack in stacks.iter().take(max_lines) {
        let percentage = (stack.weight as f64 / total as f64) * 100.0;

        let display_stack = if stack.stack.len() > 50 {
            format!("...{}", &stack.stack[stack.stack.len() - 47..])
        } else {
            stack.stack.clone()
        };

        lines.push(format!(
            "  {:<52} {:>12.3} {:>12.3} {:>6.1}%",
            display_stack,
            stack.weight as f64 / 1000.0,
            stack.query_weight as f64 / 1000.0,
            percentage
        ));
    }

    if stacks.len() > max_lines {
        lines.push(format!(
            "  (showing top {} of {} unique paths)",
            max_lines,
            stacks.len()
        ));
    }

    lines.join("\n")
}
