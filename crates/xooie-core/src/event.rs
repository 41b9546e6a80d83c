//! Namespaced custom events bound to document nodes.
//!
//! Widgets communicate lifecycle changes (init, refresh, addon init) through
//! custom events triggered on their root element. Event names follow the
//! jQuery convention `type.namespace1.namespace2`:
//!
//! - A listener bound to `widgetInit.tab` has type `widgetInit` and the
//!   namespace set `{tab}`.
//! - Triggering `widgetInit` reaches every `widgetInit` listener.
//! - Triggering `widgetInit.tab` reaches only listeners whose namespace set
//!   contains `tab`.
//!
//! Events are delivered to the target node only; they do not bubble.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use xooie_core::Document;
//!
//! let doc = Document::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//! let counter = hits.clone();
//! doc.on(doc.body(), "widgetInit.tab", move |_event| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! }).unwrap();
//!
//! doc.trigger(doc.body(), "widgetInit", serde_json::Value::Null).unwrap();
//! doc.trigger(doc.body(), "widgetInit.dialog", serde_json::Value::Null).unwrap();
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use slotmap::{new_key_type, SlotMap};

use crate::dom::{Document, NodeId};
use crate::error::{DomError, DomResult};

new_key_type! {
    /// A unique identifier for a bound event listener.
    ///
    /// Use this ID to unbind a specific listener via [`Document::off`].
    pub struct ListenerId;
}

/// A parsed `type.ns1.ns2` event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventName {
    /// The event type (the part before the first dot).
    pub event_type: String,
    /// Namespaces, sorted and deduplicated.
    pub namespaces: Vec<String>,
}

impl EventName {
    /// Parse an event name. The type must be non-empty; empty namespace segments are ignored.
    pub fn parse(name: &str) -> DomResult<Self> {
        let mut segments = name.split('.');
        let event_type = segments.next().unwrap_or_default().trim();
        if event_type.is_empty() {
            return Err(DomError::InvalidEventName(name.to_string()));
        }
        let mut namespaces: Vec<String> = segments
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        namespaces.sort();
        namespaces.dedup();
        Ok(Self {
            event_type: event_type.to_string(),
            namespaces,
        })
    }

    /// Whether a listener bound with `self` should receive a trigger of `fired`.
    pub fn accepts(&self, fired: &EventName) -> bool {
        self.event_type == fired.event_type
            && fired
                .namespaces
                .iter()
                .all(|ns| self.namespaces.iter().any(|own| own == ns))
    }

    /// Whether an unbind pattern matches this listener name.
    ///
    /// An empty pattern type matches any type, so `.tab` removes every listener
    /// in the `tab` namespace.
    fn matched_by_pattern(&self, pattern: &EventName) -> bool {
        (pattern.event_type.is_empty() || pattern.event_type == self.event_type)
            && pattern
                .namespaces
                .iter()
                .all(|ns| self.namespaces.iter().any(|own| own == ns))
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event_type)?;
        for ns in &self.namespaces {
            write!(f, ".{ns}")?;
        }
        Ok(())
    }
}

/// An event delivered to listeners.
#[derive(Debug, Clone)]
pub struct DomEvent {
    /// The event type.
    pub event_type: String,
    /// The namespaces the event was triggered with.
    pub namespaces: Vec<String>,
    /// The node the event was triggered on.
    pub target: NodeId,
    /// Arbitrary payload supplied by the trigger.
    pub detail: Value,
}

type Handler = Arc<dyn Fn(&DomEvent) + Send + Sync>;

struct Listener {
    node: NodeId,
    name: EventName,
    handler: Handler,
}

/// Storage for every listener bound in a document.
#[derive(Default)]
pub(crate) struct ListenerTable {
    listeners: SlotMap<ListenerId, Listener>,
    by_node: HashMap<NodeId, Vec<ListenerId>>,
}

impl ListenerTable {
    fn insert(&mut self, listener: Listener) -> ListenerId {
        let node = listener.node;
        let id = self.listeners.insert(listener);
        self.by_node.entry(node).or_default().push(id);
        id
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let Some(listener) = self.listeners.remove(id) else {
            return false;
        };
        if let Some(ids) = self.by_node.get_mut(&listener.node) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.by_node.remove(&listener.node);
            }
        }
        true
    }

    pub(crate) fn remove_node(&mut self, node: NodeId) {
        if let Some(ids) = self.by_node.remove(&node) {
            for id in ids {
                self.listeners.remove(id);
            }
        }
    }

    fn matching(&self, node: NodeId, fired: &EventName) -> Vec<Handler> {
        self.by_node
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.listeners.get(*id))
            .filter(|listener| listener.name.accepts(fired))
            .map(|listener| listener.handler.clone())
            .collect()
    }
}

impl Document {
    /// Bind a listener for `name` (`type.ns1.ns2`) on a node.
    pub fn on<F>(&self, node: NodeId, name: &str, handler: F) -> DomResult<ListenerId>
    where
        F: Fn(&DomEvent) + Send + Sync + 'static,
    {
        if !self.contains(node) {
            return Err(DomError::InvalidNode(node));
        }
        let name = EventName::parse(name)?;
        tracing::trace!(target: "xooie_core::event", ?node, %name, "bound listener");
        Ok(self.listeners.lock().insert(Listener {
            node,
            name,
            handler: Arc::new(handler),
        }))
    }

    /// Unbind a specific listener. Returns `true` if it was bound.
    pub fn off(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(id)
    }

    /// Unbind every listener on `node` matched by `pattern`.
    ///
    /// The pattern uses the same `type.ns` syntax; `.ns` (no type) matches
    /// every listener in that namespace. Returns the number removed.
    pub fn off_matching(&self, node: NodeId, pattern: &str) -> DomResult<usize> {
        let mut segments = pattern.split('.');
        let event_type = segments.next().unwrap_or_default().to_string();
        let mut namespaces: Vec<String> = segments
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if event_type.is_empty() && namespaces.is_empty() {
            return Err(DomError::InvalidEventName(pattern.to_string()));
        }
        namespaces.sort();
        let pattern = EventName {
            event_type,
            namespaces,
        };

        let mut table = self.listeners.lock();
        let doomed: Vec<ListenerId> = table
            .by_node
            .get(&node)
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| {
                table
                    .listeners
                    .get(*id)
                    .is_some_and(|listener| listener.name.matched_by_pattern(&pattern))
            })
            .collect();
        for id in &doomed {
            table.remove(*id);
        }
        Ok(doomed.len())
    }

    /// Number of listeners bound on a node.
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.listeners
            .lock()
            .by_node
            .get(&node)
            .map_or(0, Vec::len)
    }

    /// Trigger `name` on a node, invoking every accepting listener in bind order.
    ///
    /// The set of listeners is snapshotted before the first one runs, so
    /// handlers may bind or unbind listeners (including themselves) safely.
    /// Returns the number of listeners invoked.
    #[tracing::instrument(skip(self, detail), target = "xooie_core::event", level = "trace")]
    pub fn trigger(&self, node: NodeId, name: &str, detail: Value) -> DomResult<usize> {
        if !self.contains(node) {
            return Err(DomError::InvalidNode(node));
        }
        let fired = EventName::parse(name)?;
        let handlers = self.listeners.lock().matching(node, &fired);
        tracing::trace!(target: "xooie_core::event", handler_count = handlers.len(), "triggering event");

        let event = DomEvent {
            event_type: fired.event_type,
            namespaces: fired.namespaces,
            target: node,
            detail,
        };
        for handler in &handlers {
            handler(&event);
        }
        Ok(handlers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(doc: &Document, node: NodeId, name: &str) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        doc.on(node, name, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        hits
    }

    #[test]
    fn test_parse_event_name() {
        let name = EventName::parse("widgetInit.foo.bar").unwrap();
        assert_eq!(name.event_type, "widgetInit");
        assert_eq!(name.namespaces, vec!["bar", "foo"]);
        assert_eq!(name.to_string(), "widgetInit.bar.foo");

        let plain = EventName::parse("widgetRefresh").unwrap();
        assert!(plain.namespaces.is_empty());

        assert!(EventName::parse("").is_err());
        assert!(EventName::parse(".foo").is_err());
    }

    #[test]
    fn test_namespace_matching() {
        let doc = Document::new();
        let body = doc.body();
        let namespaced = counter(&doc, body, "widgetInit.foo");
        let plain = counter(&doc, body, "widgetInit");

        assert_eq!(doc.trigger(body, "widgetInit", Value::Null).unwrap(), 2);
        assert_eq!(doc.trigger(body, "widgetInit.foo", Value::Null).unwrap(), 1);
        assert_eq!(doc.trigger(body, "widgetInit.bar", Value::Null).unwrap(), 0);
        assert_eq!(doc.trigger(body, "widgetRefresh", Value::Null).unwrap(), 0);

        assert_eq!(namespaced.load(Ordering::SeqCst), 2);
        assert_eq!(plain.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_do_not_bubble() {
        let doc = Document::new();
        let child = doc.create_element("div");
        doc.append_child(doc.body(), child).unwrap();
        let body_hits = counter(&doc, doc.body(), "ping");

        doc.trigger(child, "ping", Value::Null).unwrap();
        assert_eq!(body_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_off_and_off_matching() {
        let doc = Document::new();
        let body = doc.body();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let id = doc
            .on(body, "click", move |_| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(doc.off(id));
        assert!(!doc.off(id));
        doc.trigger(body, "click", Value::Null).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        counter(&doc, body, "widgetInit.tab");
        counter(&doc, body, "widgetRefresh.tab");
        counter(&doc, body, "widgetInit.dialog");
        assert_eq!(doc.off_matching(body, ".tab").unwrap(), 2);
        assert_eq!(doc.listener_count(body), 1);
        assert_eq!(doc.off_matching(body, "widgetInit").unwrap(), 1);
        assert!(doc.off_matching(body, "").is_err());
    }

    #[test]
    fn test_handler_may_rebind_during_dispatch() {
        let doc = Document::new();
        let body = doc.body();
        let doc_clone = doc.clone();
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        doc.on(body, "grow", move |event| {
            log_clone.lock().push(event.event_type.clone());
            let inner_log = log_clone.clone();
            doc_clone
                .on(event.target, "grow", move |_| inner_log.lock().push("late".to_string()))
                .unwrap();
        })
        .unwrap();

        assert_eq!(doc.trigger(body, "grow", Value::Null).unwrap(), 1);
        assert_eq!(*log.lock(), vec!["grow".to_string()]);
        assert_eq!(doc.trigger(body, "grow", Value::Null).unwrap(), 2);
    }

    #[test]
    fn test_detail_and_target() {
        let doc = Document::new();
        let body = doc.body();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        doc.on(body, "select", move |event| {
            *seen_clone.lock() = Some((event.target, event.detail.clone()));
        })
        .unwrap();
        doc.trigger(body, "select", serde_json::json!({"index": 2})).unwrap();
        assert_eq!(*seen.lock(), Some((body, serde_json::json!({"index": 2}))));
    }

    #[test]
    fn test_destroy_drops_listeners() {
        let doc = Document::new();
        let div = doc.create_element("div");
        counter(&doc, div, "ping");
        assert_eq!(doc.listener_count(div), 1);
        doc.destroy(div).unwrap();
        assert_eq!(doc.listener_count(div), 0);
        assert!(doc.trigger(div, "ping", Value::Null).is_err());
    }
}
