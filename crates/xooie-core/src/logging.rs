//! Logging and debugging facilities for Xooie.
//!
//! This module provides:
//! - Target names for filtering the crate's `tracing` output
//! - Debug visualization for document subtrees
//!
//! # Tracing Integration
//!
//! Xooie uses the `tracing` crate for instrumentation. To see logs, install a
//! subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("xooie=debug,xooie_core=trace")
//!     .init();
//! ```
//!
//! # Debug Visualization
//!
//! Use [`DocumentTreeDebug`] to render the markup a widget operates on:
//!
//! ```
//! use xooie_core::{Document, DocumentTreeDebug};
//!
//! let doc = Document::new();
//! let tabs = doc.create_element("div");
//! doc.set_attribute(tabs, "data-widget-type", "tab").unwrap();
//! doc.append_child(doc.body(), tabs).unwrap();
//!
//! let output = DocumentTreeDebug::new().format_subtree(&doc, doc.body());
//! assert!(output.contains("data-widget-type=\"tab\""));
//! ```

use std::fmt::Write as FmtWrite;

use crate::dom::{Document, NodeId, NodeKind};

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "xooie_core";
    /// Document tree target.
    pub const DOM: &str = "xooie_core::dom";
    /// Event dispatch target.
    pub const EVENT: &str = "xooie_core::event";
    /// Deferred task target.
    pub const TASK: &str = "xooie_core::task";
    /// Timer target.
    pub const TIMER: &str = "xooie_core::timer";
    /// Selector parsing and matching target.
    pub const SELECTOR: &str = "xooie_style::selector";
    /// Stylesheet rules target.
    pub const RULES: &str = "xooie_style::rules";
    /// Widget lifecycle target.
    pub const WIDGET: &str = "xooie::widget";
    /// Addon lifecycle target.
    pub const ADDON: &str = "xooie::addon";
    /// Instance registry target.
    pub const REGISTRY: &str = "xooie::registry";
    /// Role application target.
    pub const ROLE: &str = "xooie::role";
    /// Template rendering target.
    pub const RENDER: &str = "xooie::render";
    /// Configuration loading target.
    pub const CONFIG: &str = "xooie::config";
    /// Runtime scheduling and scanning target.
    pub const RUNTIME: &str = "xooie::runtime";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show node ids.
    pub show_ids: bool,
    /// Whether to show attributes.
    pub show_attributes: bool,
    /// Whether to show text nodes.
    pub show_text: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: false,
            show_attributes: true,
            show_text: true,
            max_depth: None,
        }
    }
}

impl TreeFormatOptions {
    /// Options for minimal output: tag names only.
    pub fn minimal() -> Self {
        Self {
            show_attributes: false,
            show_text: false,
            ..Default::default()
        }
    }
}

/// Debug utility for visualizing document subtrees.
#[derive(Debug, Clone, Default)]
pub struct DocumentTreeDebug {
    options: TreeFormatOptions,
}

impl DocumentTreeDebug {
    /// Create a new debug visualizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a debug visualizer with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format the subtree rooted at `root`.
    pub fn format_subtree(&self, doc: &Document, root: NodeId) -> String {
        let mut output = String::new();
        doc.with_read(|tree| {
            let mut lines = Vec::new();
            self.collect(tree, root, 0, &mut lines);
            for (depth, is_last, label) in lines {
                output.push_str(&self.build_prefix(depth, is_last));
                output.push_str(&label);
                output.push('\n');
            }
        });
        output
    }

    fn collect(
        &self,
        tree: &crate::dom::NodeTree,
        id: NodeId,
        depth: usize,
        lines: &mut Vec<(usize, bool, String)>,
    ) {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return;
        }
        let Some(kind) = tree.kind(id) else {
            return;
        };
        let is_last = tree
            .parent(id)
            .map(|parent| tree.children(parent).last() == Some(&id))
            .unwrap_or(true);

        let mut label = String::new();
        match kind {
            NodeKind::Element { tag, attributes } => {
                write!(label, "<{tag}").expect("write to String");
                if self.options.show_attributes {
                    for (name, value) in attributes {
                        write!(label, " {name}=\"{value}\"").expect("write to String");
                    }
                }
                label.push('>');
            }
            NodeKind::Text(text) => {
                if !self.options.show_text {
                    return;
                }
                write!(label, "{text:?}").expect("write to String");
            }
        }
        if self.options.show_ids {
            write!(label, " [{id:?}]").expect("write to String");
        }
        lines.push((depth, is_last, label));

        for &child in tree.children(id) {
            self.collect(tree, child, depth + 1, lines);
        }
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.push_str("  ");
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix
    }
}
