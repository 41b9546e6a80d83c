//! In-memory document model.
//!
//! The DOM is the sole identity and storage substrate of the widget runtime:
//! widgets are bound to element nodes, seeded from `data-*` attributes, and
//! marked with classes. This module provides an arena-backed document with
//! stable node ids, parent-child relationships, attributes, class lists and
//! a jQuery-compatible `dataset` view.
//!
//! # Key Types
//!
//! - [`Document`] - Shared, thread-safe handle to a document tree
//! - [`NodeId`] - Stable identifier for an element or text node
//! - [`NodeTree`] - The underlying arena, reachable via [`Document::with_read`]
//!
//! Nodes removed from the tree with [`Document::remove`] stay alive and keep
//! their attributes, mirroring detached DOM nodes. Only [`Document::destroy`]
//! frees a subtree.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use slotmap::{new_key_type, SlotMap};

use crate::error::{DomError, DomResult};
use crate::event::ListenerTable;

new_key_type! {
    /// A unique identifier for a node in a [`Document`].
    ///
    /// `NodeId`s stay valid while the node is detached and become invalid
    /// once the node is destroyed.
    pub struct NodeId;
}

impl NodeId {
    /// Convert the NodeId to a raw u64 value.
    #[inline]
    pub fn as_raw(self) -> u64 {
        use slotmap::Key;
        self.data().as_ffi()
    }
}

/// The payload of a node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// An element with a lower-case tag name and ordered attributes.
    Element {
        /// Tag name.
        tag: String,
        /// Attributes in insertion order.
        attributes: Vec<(String, String)>,
    },
    /// A text node.
    Text(String),
}

/// Internal data stored in the arena for each node.
#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
                attributes: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        }
    }

    fn text(text: &str) -> Self {
        Self {
            kind: NodeKind::Text(text.to_string()),
            parent: None,
            children: Vec::new(),
        }
    }

    fn attributes(&self) -> Option<&Vec<(String, String)>> {
        match &self.kind {
            NodeKind::Element { attributes, .. } => Some(attributes),
            NodeKind::Text(_) => None,
        }
    }
}

/// Arena holding every node of one document.
pub struct NodeTree {
    nodes: SlotMap<NodeId, NodeData>,
    html: NodeId,
    body: NodeId,
}

impl NodeTree {
    fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let html = nodes.insert(NodeData::element("html"));
        let body = nodes.insert(NodeData::element("body"));
        nodes[body].parent = Some(html);
        nodes[html].children.push(body);
        Self { nodes, html, body }
    }

    fn node(&self, id: NodeId) -> DomResult<&NodeData> {
        self.nodes.get(id).ok_or(DomError::InvalidNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut NodeData> {
        self.nodes.get_mut(id).ok_or(DomError::InvalidNode(id))
    }

    fn attributes_mut(&mut self, id: NodeId) -> DomResult<&mut Vec<(String, String)>> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element { attributes, .. } => Ok(attributes),
            NodeKind::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    /// Check if a node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Get the body element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Get the parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|d| d.parent)
    }

    /// Get the children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|d| d.children.as_slice())
            .unwrap_or(&[])
    }

    /// Check whether the node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|d| matches!(d.kind, NodeKind::Element { .. }))
    }

    /// Get an element's tag name.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// Get an attribute value.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(id)?
            .attributes()?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterate over the whitespace-separated classes of an element.
    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attribute(id, "class")
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    /// Get the index of a node among its parent's children.
    pub fn sibling_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Check if `ancestor` is `id` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(current_id) = current {
            if current_id == ancestor {
                return true;
            }
            current = self.parent(current_id);
        }
        false
    }

    /// Collect all descendants of a node in document (pre-)order, excluding the node itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        self.descendants_recursive(id, &mut result);
        result
    }

    fn descendants_recursive(&self, id: NodeId, result: &mut Vec<NodeId>) {
        for &child in self.children(id) {
            result.push(child);
            self.descendants_recursive(child, result);
        }
    }

    fn text_content_into(&self, id: NodeId, out: &mut String) {
        if let Some(data) = self.nodes.get(id) {
            match &data.kind {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Element { .. } => {
                    for &child in &data.children {
                        self.text_content_into(child, out);
                    }
                }
            }
        }
    }

    /// Get the node's kind (element or text).
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id).map(|d| &d.kind)
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent_id) = self.nodes.get(id).and_then(|d| d.parent) {
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                parent.children.retain(|&child| child != id);
            }
        }
        if let Some(data) = self.nodes.get_mut(id) {
            data.parent = None;
        }
    }

    fn clone_recursive(&mut self, id: NodeId, parent: Option<NodeId>) -> DomResult<NodeId> {
        let source = self.node(id)?;
        let kind = source.kind.clone();
        let children = source.children.clone();
        let copy = self.nodes.insert(NodeData {
            kind,
            parent,
            children: Vec::new(),
        });
        for child in children {
            let child_copy = self.clone_recursive(child, Some(copy))?;
            self.nodes[copy].children.push(child_copy);
        }
        Ok(copy)
    }
}

/// A thread-safe, cloneable handle to a document.
///
/// Cloning a `Document` yields another handle to the same tree. Listener
/// callbacks registered through [`Document::on`] are never invoked while
/// the tree lock is held, so handlers may freely mutate the document.
#[derive(Clone)]
pub struct Document {
    tree: Arc<RwLock<NodeTree>>,
    pub(crate) listeners: Arc<Mutex<ListenerTable>>,
}

impl Document {
    /// Create an empty document with an `<html><body></body></html>` skeleton.
    pub fn new() -> Self {
        Self {
            tree: Arc::new(RwLock::new(NodeTree::new())),
            listeners: Arc::new(Mutex::new(ListenerTable::default())),
        }
    }

    /// Check whether two handles refer to the same document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree)
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> NodeId {
        self.tree.read().html
    }

    /// The `<body>` element; nodes are attached when they descend from it.
    pub fn body(&self) -> NodeId {
        self.tree.read().body
    }

    // =========================================================================
    // Node creation and tree mutation
    // =========================================================================

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        let id = self.tree.write().nodes.insert(NodeData::element(tag));
        tracing::trace!(target: "xooie_core::dom", ?id, tag, "created element");
        id
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.tree.write().nodes.insert(NodeData::text(text))
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` under `parent` before `reference`, or last if `reference` is `None`.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        let mut tree = self.tree.write();
        if !tree.is_element(parent) {
            tree.node(parent)?;
            return Err(DomError::NotAnElement(parent));
        }
        tree.node(child)?;
        if tree.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest);
        }
        if let Some(reference) = reference {
            if tree.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild);
            }
        }

        tree.detach(child);
        let position = reference
            .and_then(|r| tree.children(parent).iter().position(|&c| c == r))
            .unwrap_or(tree.children(parent).len());
        tree.node_mut(parent)?.children.insert(position, child);
        tree.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach a node from its parent. The node and its subtree stay alive.
    pub fn remove(&self, id: NodeId) -> DomResult<()> {
        let mut tree = self.tree.write();
        tree.node(id)?;
        tree.detach(id);
        tracing::trace!(target: "xooie_core::dom", ?id, "detached node");
        Ok(())
    }

    /// Destroy a node and its whole subtree, dropping any bound listeners.
    #[tracing::instrument(skip(self), target = "xooie_core::dom", level = "trace")]
    pub fn destroy(&self, id: NodeId) -> DomResult<()> {
        let removed = {
            let mut tree = self.tree.write();
            tree.node(id)?;
            tree.detach(id);
            let mut removed = tree.descendants(id);
            removed.push(id);
            for &node in &removed {
                tree.nodes.remove(node);
            }
            removed
        };
        let mut listeners = self.listeners.lock();
        for node in removed {
            listeners.remove_node(node);
        }
        Ok(())
    }

    /// Make a detached deep copy of a node and its subtree.
    pub fn deep_clone(&self, id: NodeId) -> DomResult<NodeId> {
        self.tree.write().clone_recursive(id, None)
    }

    /// Replace all children of an element with a single text node.
    pub fn set_text(&self, id: NodeId, text: &str) -> DomResult<()> {
        let mut tree = self.tree.write();
        if !tree.is_element(id) {
            tree.node(id)?;
            return Err(DomError::NotAnElement(id));
        }
        let old_children = std::mem::take(&mut tree.node_mut(id)?.children);
        for child in old_children {
            if let Some(data) = tree.nodes.get_mut(child) {
                data.parent = None;
            }
        }
        let text_node = tree.nodes.insert(NodeData::text(text));
        tree.nodes[text_node].parent = Some(id);
        tree.node_mut(id)?.children.push(text_node);
        Ok(())
    }

    // =========================================================================
    // Tree queries
    // =========================================================================

    /// Check if a node exists (has not been destroyed).
    pub fn contains(&self, id: NodeId) -> bool {
        self.tree.read().contains(id)
    }

    /// Check whether a node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.tree.read().is_element(id)
    }

    /// Get an element's tag name.
    pub fn tag_name(&self, id: NodeId) -> Option<String> {
        self.tree.read().tag_name(id).map(str::to_string)
    }

    /// Get the parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.read().parent(id)
    }

    /// Get the children of a node.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.read().children(id).to_vec()
    }

    /// Get the element children of a node.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        let tree = self.tree.read();
        tree.children(id)
            .iter()
            .copied()
            .filter(|&child| tree.is_element(child))
            .collect()
    }

    /// All descendants of a node in document order, excluding the node itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.read().descendants(id)
    }

    /// Ancestors of a node from the immediate parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let tree = self.tree.read();
        let mut result = Vec::new();
        let mut current = tree.parent(id);
        while let Some(current_id) = current {
            result.push(current_id);
            current = tree.parent(current_id);
        }
        result
    }

    /// Check whether a node is part of the live document (descends from body).
    pub fn is_attached(&self, id: NodeId) -> bool {
        let tree = self.tree.read();
        tree.contains(id) && tree.is_inclusive_ancestor(tree.body, id)
    }

    /// Concatenated text of a node and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.tree.read().text_content_into(id, &mut out);
        out
    }

    // =========================================================================
    // Attributes and classes
    // =========================================================================

    /// Get an attribute value.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.tree.read().attribute(id, name).map(str::to_string)
    }

    /// Check if an element has an attribute.
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.tree.read().attribute(id, name).is_some()
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attribute(&self, id: NodeId, name: &str, value: impl Into<String>) -> DomResult<()> {
        let mut tree = self.tree.write();
        let attributes = tree.attributes_mut(id)?;
        let value = value.into();
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value,
            None => attributes.push((name.to_string(), value)),
        }
        Ok(())
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&self, id: NodeId, name: &str) -> DomResult<Option<String>> {
        let mut tree = self.tree.write();
        let attributes = tree.attributes_mut(id)?;
        let position = attributes.iter().position(|(key, _)| key == name);
        Ok(position.map(|index| attributes.remove(index).1))
    }

    /// All attributes of an element in insertion order.
    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        self.tree
            .read()
            .nodes
            .get(id)
            .and_then(NodeData::attributes)
            .cloned()
            .unwrap_or_default()
    }

    /// The element's `id` attribute.
    pub fn element_id(&self, id: NodeId) -> Option<String> {
        self.attribute(id, "id")
    }

    /// The element's classes.
    pub fn classes(&self, id: NodeId) -> Vec<String> {
        self.tree.read().classes(id).map(str::to_string).collect()
    }

    /// Check if an element carries a class.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.tree.read().classes(id).any(|c| c == class)
    }

    /// Add a class if not already present.
    pub fn add_class(&self, id: NodeId, class: &str) -> DomResult<()> {
        let mut classes = self.classes(id);
        if classes.iter().any(|c| c == class) {
            return Ok(());
        }
        classes.push(class.to_string());
        self.set_attribute(id, "class", classes.join(" "))
    }

    /// Remove a class if present.
    pub fn remove_class(&self, id: NodeId, class: &str) -> DomResult<()> {
        let classes = self.classes(id);
        if !classes.iter().any(|c| c == class) {
            return Ok(());
        }
        let remaining: Vec<_> = classes.into_iter().filter(|c| c != class).collect();
        self.set_attribute(id, "class", remaining.join(" "))
    }

    /// The element's `data-*` attributes as a property bag.
    ///
    /// Keys are camel-cased (`data-foo-bar` becomes `fooBar`) and values are
    /// coerced the way jQuery's `.data()` does: booleans, `null`, numbers that
    /// round-trip, and JSON objects or arrays are decoded; everything else
    /// stays a string.
    pub fn dataset(&self, id: NodeId) -> Map<String, Value> {
        let tree = self.tree.read();
        let mut bag = Map::new();
        let Some(attributes) = tree.nodes.get(id).and_then(NodeData::attributes) else {
            return bag;
        };
        for (name, value) in attributes {
            if let Some(key) = name.strip_prefix("data-") {
                if key.is_empty() {
                    continue;
                }
                bag.insert(camel_case(key), coerce_data_value(value));
            }
        }
        bag
    }

    // =========================================================================
    // Advanced Access
    // =========================================================================

    /// Access the tree with a read lock for complex operations.
    pub fn with_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&NodeTree) -> R,
    {
        f(&self.tree.read())
    }

    /// Number of live nodes, including the html/body skeleton.
    pub fn node_count(&self) -> usize {
        self.tree.read().nodes.len()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.node_count())
            .finish()
    }
}

/// Convert a dashed `data-*` suffix to camel case (`foo-bar` to `fooBar`).
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '-' {
            if upper_next {
                out.push('-');
            }
            upper_next = true;
        } else if upper_next && ch.is_ascii_lowercase() {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            if upper_next {
                out.push('-');
            }
            out.push(ch);
            upper_next = false;
        }
    }
    if upper_next {
        out.push('-');
    }
    out
}

/// Decode a `data-*` attribute value.
pub fn coerce_data_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        if int.to_string() == raw {
            return Value::from(int);
        }
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() && float.to_string() == raw {
            return Value::from(float);
        }
    }
    let looks_structured = (raw.starts_with('{') && raw.ends_with('}'))
        || (raw.starts_with('[') && raw.ends_with(']'));
    if looks_structured {
        if let Ok(value) = serde_json::from_str(raw) {
            return value;
        }
    }
    Value::String(raw.to_string())
}
