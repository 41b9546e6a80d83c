//! Registry of live widget instances.
//!
//! Every widget registers on construction and receives a process-unique
//! [`InstanceId`]. The id is written onto the widget's root element so the
//! element can be mapped back to its instance; constructing a widget on an
//! element that is already bound returns the existing instance.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use xooie_core::logging::targets;
use xooie_core::{Document, NodeId};

use crate::config::DEFAULT_INSTANCE_ATTRIBUTE;
use crate::widget::Widget;

/// Identifier of a registered widget instance.
///
/// Ids start at 1 and are never reused; zero means "not registered".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Wrap a raw id.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Parse the value of an instance attribute.
    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse().ok().filter(|&raw| raw > 0).map(Self)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct RegistryInner {
    instances: BTreeMap<InstanceId, Widget>,
    last_id: u64,
}

/// Shared table from instance id to live widget.
///
/// Cloning yields another handle to the same table, so a registry can be
/// created up front and injected into a runtime.
#[derive(Clone)]
pub struct InstanceRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    attribute: Arc<str>,
}

impl InstanceRegistry {
    /// Create a registry writing ids to `data-xooie-instance`.
    pub fn new() -> Self {
        Self::with_attribute(DEFAULT_INSTANCE_ATTRIBUTE)
    }

    /// Create a registry writing ids to `attribute`.
    pub fn with_attribute(attribute: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                instances: BTreeMap::new(),
                last_id: 0,
            })),
            attribute: Arc::from(attribute),
        }
    }

    /// The attribute carrying instance ids on root elements.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Register a widget, returning its new id.
    ///
    /// The id is written onto the widget's root element.
    pub fn register(&self, widget: &Widget) -> InstanceId {
        let id = {
            let mut inner = self.inner.lock();
            inner.last_id += 1;
            let id = InstanceId(inner.last_id);
            inner.instances.insert(id, widget.clone());
            id
        };
        if let Err(err) = widget
            .document()
            .set_attribute(widget.root(), &self.attribute, id.to_string())
        {
            tracing::debug!(target: targets::REGISTRY, %id, error = %err, "could not mark root element");
        }
        tracing::debug!(target: targets::REGISTRY, %id, class = widget.class().name(), "registered instance");
        id
    }

    /// The widget registered under `id`.
    pub fn lookup(&self, id: InstanceId) -> Option<Widget> {
        self.inner.lock().instances.get(&id).cloned()
    }

    /// The widget bound to `node` through its instance attribute.
    pub fn lookup_element(&self, doc: &Document, node: NodeId) -> Option<Widget> {
        let id = InstanceId::parse(&doc.attribute(node, &self.attribute)?)?;
        self.lookup(id)
            .filter(|widget| widget.root() == node && widget.document().ptr_eq(doc))
    }

    /// Remove `id` from the registry.
    pub fn unregister(&self, id: InstanceId) -> Option<Widget> {
        let removed = self.inner.lock().instances.remove(&id);
        if removed.is_some() {
            tracing::debug!(target: targets::REGISTRY, %id, "unregistered instance");
        }
        removed
    }

    /// Clean up every widget whose root is no longer attached to its document.
    ///
    /// Returns the ids swept.
    #[tracing::instrument(skip(self), target = "xooie::registry", level = "debug")]
    pub fn sweep(&self) -> Vec<InstanceId> {
        let detached: Vec<(InstanceId, Widget)> = self
            .inner
            .lock()
            .instances
            .iter()
            .filter(|(_, widget)| !widget.document().is_attached(widget.root()))
            .map(|(&id, widget)| (id, widget.clone()))
            .collect();

        let mut swept = Vec::with_capacity(detached.len());
        for (id, widget) in detached {
            widget.cleanup();
            self.unregister(id);
            swept.push(id);
        }
        if !swept.is_empty() {
            tracing::debug!(target: targets::REGISTRY, count = swept.len(), "swept detached instances");
        }
        swept
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<InstanceId> {
        self.inner.lock().instances.keys().copied().collect()
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.inner.lock().instances.len()
    }

    /// Whether no instance is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().instances.is_empty()
    }

    /// The highest id handed out so far.
    pub fn last_id(&self) -> InstanceId {
        InstanceId(self.inner.lock().last_id)
    }

    /// A handle that does not keep the table alive.
    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Arc::downgrade(&self.inner),
            attribute: Arc::clone(&self.attribute),
        }
    }
}

/// Non-owning handle to an [`InstanceRegistry`].
///
/// Widgets keep one so cleanup can clear their slot without the registry
/// and its widgets owning each other.
#[derive(Clone)]
pub(crate) struct WeakRegistry {
    inner: Weak<Mutex<RegistryInner>>,
    attribute: Arc<str>,
}

impl WeakRegistry {
    /// The registry, if any handle to it is still alive.
    pub(crate) fn upgrade(&self) -> Option<InstanceRegistry> {
        self.inner.upgrade().map(|inner| InstanceRegistry {
            inner,
            attribute: Arc::clone(&self.attribute),
        })
    }

    /// The attribute carrying instance ids on root elements.
    pub(crate) fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InstanceRegistry")
            .field("attribute", &self.attribute)
            .field("instances", &inner.instances.len())
            .field("last_id", &inner.last_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_parsing() {
        assert_eq!(InstanceId::parse("12"), Some(InstanceId::from_raw(12)));
        assert_eq!(InstanceId::parse(" 3 "), Some(InstanceId::from_raw(3)));
        assert_eq!(InstanceId::parse("0"), None);
        assert_eq!(InstanceId::parse("abc"), None);
        assert_eq!(InstanceId::default().as_u64(), 0);
        assert_eq!(InstanceId::from_raw(7).to_string(), "7");
    }

    #[test]
    fn empty_registry() {
        let registry = InstanceRegistry::with_attribute("data-id");
        assert!(registry.is_empty());
        assert_eq!(registry.attribute(), "data-id");
        assert!(registry.lookup(InstanceId::from_raw(1)).is_none());
        assert!(registry.sweep().is_empty());
        assert_eq!(registry.last_id(), InstanceId::default());
    }
}
