//! The widget base: construction, lifecycle and per-instance services.
//!
//! A [`Widget`] wraps one root element. Construction is idempotent per
//! element: building a widget on an element that is already bound returns
//! the bound instance and fires its refresh event instead.
//!
//! # Construction
//!
//! 1. Reuse the instance bound to the element, if any.
//! 2. Seed properties from the element's `data-*` attributes.
//! 3. Bind the init and refresh listeners that run the role pass.
//! 4. Register, then mark the root with the id and marker classes.
//! 5. Run the class's constructor chain.
//! 6. Settle: attach addons and fire the init event. A base class settles
//!    immediately; an extended class settles on a later turn of the task
//!    queue, once every layer and hold has completed.
//!
//! # Example
//!
//! ```
//! use xooie::prelude::*;
//!
//! let xooie = Xooie::new();
//! let doc = xooie.document();
//! let root = doc.create_element("div");
//! doc.set_attribute(root, "id", "menu").unwrap();
//! doc.set_attribute(root, "data-namespace", "menu").unwrap();
//! doc.append_child(doc.body(), root).unwrap();
//!
//! let class = WidgetClass::new("dropdown").into_shared();
//! let widget = Widget::new(&xooie, &class, "#menu", &[]).unwrap();
//! assert_eq!(widget.init_event(), "widgetInit.menu");
//! assert!(doc.has_class(root, "is-instantiated-menu"));
//!
//! let again = Widget::new(&xooie, &class, root, &[]).unwrap();
//! assert!(again.ptr_eq(&widget));
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use xooie_core::logging::targets;
use xooie_core::{Document, DomError, ListenerId, NodeId};
use xooie_style::{parse_selector_list, RuleHandle, SelectorMatcher};

use crate::addon::{Addon, AddonClass};
use crate::class::{schedule_settle, Class, Countdown, Lifecycle, Phase, SettleGuard};
use crate::config::XooieConfig;
use crate::error::{Result, XooieError};
use crate::property::{Access, PropertyHost, PropertyStore, PropertyTable};
use crate::registry::{InstanceId, WeakRegistry};
use crate::render::error_placeholder;
use crate::role::{self, RoleApplicationOutcome};
use crate::runtime::{RuntimeInner, Xooie};

/// A widget type.
pub type WidgetClass = Class<Widget>;

impl Class<Widget> {
    /// A base widget class declaring the framework properties.
    ///
    /// | property | default | read as |
    /// |---|---|---|
    /// | `id` | | the registry id |
    /// | `namespace` | `""` | |
    /// | `templateLanguage` | runtime config | |
    /// | `initEvent` | `widgetInit` | `widgetInit.<namespace>` |
    /// | `refreshEvent` | `widgetRefresh` | `widgetRefresh.<namespace>` |
    /// | `className` | `is-instantiated` | `is-instantiated-<namespace>` |
    /// | `instanceClass` | `xooie` | `xooie-<id>` |
    ///
    /// All are read-only through [`PropertyHost::property`].
    pub fn new(name: impl Into<String>) -> Self {
        let mut class = Class::bare(name);
        let properties = class.properties_mut();
        properties.declare("id", Access::ReadOnly, None);
        properties.declare("namespace", Access::ReadOnly, Some(json!("")));
        properties.declare_processed(
            "templateLanguage",
            Access::ReadOnly,
            Value::Null,
            Arc::new(|widget: &Widget, raw: Value| match raw {
                Value::Null => Value::String(widget.inner.config.template_language.clone()),
                Value::String(s) if s.is_empty() => {
                    Value::String(widget.inner.config.template_language.clone())
                }
                other => other,
            }),
        );
        properties.declare_processed(
            "initEvent",
            Access::ReadOnly,
            json!("widgetInit"),
            Arc::new(|widget: &Widget, raw: Value| json!(namespaced(&raw, &widget.namespace(), '.'))),
        );
        properties.declare_processed(
            "refreshEvent",
            Access::ReadOnly,
            json!("widgetRefresh"),
            Arc::new(|widget: &Widget, raw: Value| json!(namespaced(&raw, &widget.namespace(), '.'))),
        );
        properties.declare_processed(
            "className",
            Access::ReadOnly,
            json!("is-instantiated"),
            Arc::new(|widget: &Widget, raw: Value| json!(namespaced(&raw, &widget.namespace(), '-'))),
        );
        properties.declare_processed(
            "instanceClass",
            Access::ReadOnly,
            json!("xooie"),
            Arc::new(|widget: &Widget, raw: Value| {
                json!(format!("{}-{}", value_string(&raw), widget.id()))
            }),
        );
        class
    }
}

/// Render a property value as plain text.
pub(crate) fn value_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn namespaced(raw: &Value, namespace: &str, separator: char) -> String {
    let base = value_string(raw);
    if namespace.is_empty() {
        base
    } else {
        format!("{base}{separator}{namespace}")
    }
}

/// How a widget root is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementRef {
    /// A node of the runtime's document.
    Node(NodeId),
    /// A selector resolved to its first match under the body.
    Selector(String),
}

impl From<NodeId> for ElementRef {
    fn from(node: NodeId) -> Self {
        ElementRef::Node(node)
    }
}

impl From<&str> for ElementRef {
    fn from(selector: &str) -> Self {
        ElementRef::Selector(selector.to_string())
    }
}

impl From<String> for ElementRef {
    fn from(selector: String) -> Self {
        ElementRef::Selector(selector)
    }
}

fn resolve_element(doc: &Document, element: ElementRef) -> Result<NodeId> {
    match element {
        ElementRef::Node(node) => {
            if !doc.contains(node) {
                return Err(DomError::InvalidNode(node).into());
            }
            if !doc.is_element(node) {
                return Err(DomError::NotAnElement(node).into());
            }
            Ok(node)
        }
        ElementRef::Selector(selector) => {
            let list = parse_selector_list(&selector)?;
            SelectorMatcher::query_first(doc, doc.body(), &list)
                .ok_or(XooieError::ElementNotFound(selector))
        }
    }
}

pub(crate) struct WidgetInner {
    class: Arc<WidgetClass>,
    document: Document,
    root: NodeId,
    runtime: Weak<RuntimeInner>,
    config: Arc<XooieConfig>,
    registry: WeakRegistry,
    id: OnceLock<InstanceId>,
    properties: PropertyStore,
    addons: Mutex<IndexMap<String, Addon>>,
    pending_addons: Mutex<Vec<Arc<AddonClass>>>,
    countdown: Countdown,
    phase: Mutex<Phase>,
    listeners: Mutex<Vec<ListenerId>>,
    last_roles: Mutex<Option<RoleApplicationOutcome>>,
}

/// A live widget instance.
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct Widget {
    inner: Arc<WidgetInner>,
}

/// Non-owning handle to a [`Widget`].
#[derive(Clone, Default)]
pub struct WeakWidget {
    inner: Weak<WidgetInner>,
}

impl WeakWidget {
    /// The widget, if it is still alive.
    pub fn upgrade(&self) -> Option<Widget> {
        self.inner.upgrade().map(|inner| Widget { inner })
    }
}

impl fmt::Debug for WeakWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakWidget")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Widget {
    /// Construct (or reuse) the widget bound to `element`.
    ///
    /// `addons` are attached when the widget settles. Errors from a
    /// constructor layer abort construction; the half-built instance is
    /// cleaned up before the error is returned.
    #[tracing::instrument(skip_all, fields(class = class.name()), target = "xooie::widget", level = "debug")]
    pub fn new(
        runtime: &Xooie,
        class: &Arc<WidgetClass>,
        element: impl Into<ElementRef>,
        addons: &[Arc<AddonClass>],
    ) -> Result<Widget> {
        let doc = runtime.document();
        let root = resolve_element(doc, element.into())?;
        let registry = runtime.registry();

        if let Some(bound) = doc.attribute(root, registry.attribute()) {
            match registry.lookup_element(doc, root) {
                Some(existing) => {
                    tracing::debug!(target: targets::WIDGET, id = %existing.id(), "element already bound; refreshing");
                    existing.refresh()?;
                    return Ok(existing);
                }
                None => {
                    tracing::debug!(target: targets::WIDGET, value = %bound, "removing stale instance binding");
                    doc.remove_attribute(root, registry.attribute())?;
                    if let Some(stale) = InstanceId::parse(&bound) {
                        doc.remove_class(root, &format!("xooie-{stale}"))?;
                    }
                }
            }
        }

        let widget = Widget {
            inner: Arc::new(WidgetInner {
                class: Arc::clone(class),
                document: doc.clone(),
                root,
                runtime: runtime.downgrade(),
                config: runtime.shared_config(),
                registry: registry.downgrade(),
                id: OnceLock::new(),
                properties: PropertyStore::new(),
                addons: Mutex::new(IndexMap::new()),
                pending_addons: Mutex::new(addons.to_vec()),
                countdown: Countdown::new(class.extend_count()),
                phase: Mutex::new(Phase::Constructing),
                listeners: Mutex::new(Vec::new()),
                last_roles: Mutex::new(None),
            }),
        };

        let seeded = widget.set_data(&doc.dataset(root));
        tracing::trace!(target: targets::WIDGET, seeded, "seeded properties from markup");

        widget.bind_listeners()?;

        let id = registry.register(&widget);
        let _ = widget.inner.id.set(id);
        widget.set("id", json!(id.as_u64()))?;
        doc.add_class(root, &widget.class_name())?;
        doc.add_class(root, &widget.instance_class())?;

        if let Err(err) = class.run_layers(&widget, &widget.inner.countdown) {
            tracing::warn!(target: targets::WIDGET, %id, error = %err, "constructor failed");
            widget.cleanup();
            return Err(err);
        }

        if class.extend_count() == 0 {
            if let Err(err) = widget.settle() {
                widget.cleanup();
                return Err(err);
            }
        } else {
            let weak = widget.downgrade();
            schedule_settle(
                runtime.task_queue(),
                widget.inner.countdown.clone(),
                widget.inner.config.settle_poll_limit,
                format!("{}#{id}", class.name()),
                move || {
                    if let Some(widget) = weak.upgrade() {
                        if let Err(err) = widget.settle() {
                            tracing::warn!(target: targets::WIDGET, id = %widget.id(), error = %err, "deferred settle failed");
                        }
                    }
                },
            );
        }

        Ok(widget)
    }

    fn bind_listeners(&self) -> Result<()> {
        let doc = self.document();
        let mut bound = Vec::with_capacity(2);
        for event in [self.init_event(), self.refresh_event()] {
            let weak = self.downgrade();
            let listener = doc.on(self.root(), &event, move |_| {
                if let Some(widget) = weak.upgrade() {
                    widget.apply_roles();
                }
            })?;
            bound.push(listener);
        }
        self.inner.listeners.lock().extend(bound);
        Ok(())
    }

    fn settle(&self) -> Result<()> {
        if *self.inner.phase.lock() == Phase::CleanedUp {
            return Ok(());
        }

        let addons = std::mem::take(&mut *self.inner.pending_addons.lock());
        for class in &addons {
            Addon::new(class, self)?;
        }

        {
            let mut phase = self.inner.phase.lock();
            if *phase == Phase::CleanedUp {
                return Ok(());
            }
            *phase = Phase::Active;
        }

        let event = self.init_event();
        self.document()
            .trigger(self.root(), &event, json!({ "id": self.id().as_u64() }))?;
        tracing::debug!(target: targets::WIDGET, id = %self.id(), %event, "widget settled");
        Ok(())
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// The registry id. Zero until registration.
    pub fn id(&self) -> InstanceId {
        self.inner.id.get().copied().unwrap_or_default()
    }

    /// The root element.
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    /// The document holding the root.
    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    /// The widget's class.
    pub fn class(&self) -> &Arc<WidgetClass> {
        &self.inner.class
    }

    /// The runtime that created the widget.
    pub fn runtime(&self) -> Result<Xooie> {
        self.inner
            .runtime
            .upgrade()
            .map(Xooie::from_inner)
            .ok_or(XooieError::RuntimeDropped)
    }

    /// A non-owning handle.
    pub fn downgrade(&self) -> WeakWidget {
        WeakWidget {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Widget) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Framework Properties
    // =========================================================================

    fn text_property(&self, name: &str) -> String {
        self.get(name).map(|v| value_string(&v)).unwrap_or_default()
    }

    /// The event namespace; empty when unset.
    pub fn namespace(&self) -> String {
        self.text_property("namespace")
    }

    /// The init event name.
    pub fn init_event(&self) -> String {
        self.text_property("initEvent")
    }

    /// The refresh event name.
    pub fn refresh_event(&self) -> String {
        self.text_property("refreshEvent")
    }

    /// The marker class added to the root.
    pub fn class_name(&self) -> String {
        self.text_property("className")
    }

    /// The per-instance class added to the root.
    pub fn instance_class(&self) -> String {
        self.text_property("instanceClass")
    }

    /// The template language used by [`Widget::render`].
    pub fn template_language(&self) -> String {
        self.text_property("templateLanguage")
    }

    pub(crate) fn role_attribute(&self) -> String {
        self.inner.config.role_attribute.clone()
    }

    pub(crate) fn strict_roles(&self) -> bool {
        self.inner.config.strict_roles
    }

    pub(crate) fn settle_poll_limit(&self) -> Option<u32> {
        self.inner.config.settle_poll_limit
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// The current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.phase.lock().lifecycle(&self.inner.countdown)
    }

    /// Whether the widget has settled and is not cleaned up.
    pub fn is_settled(&self) -> bool {
        *self.inner.phase.lock() == Phase::Active
    }

    /// Whether [`Widget::cleanup`] has run.
    pub fn is_cleaned_up(&self) -> bool {
        *self.inner.phase.lock() == Phase::CleanedUp
    }

    /// Keep the widget from settling until the guard is dropped.
    ///
    /// Meant for constructor layers that finish their work later.
    pub fn hold(&self) -> SettleGuard {
        self.inner.countdown.hold()
    }

    /// Fire the refresh event, re-running the role pass.
    pub fn refresh(&self) -> Result<()> {
        let event = self.refresh_event();
        self.document()
            .trigger(self.root(), &event, json!({ "id": self.id().as_u64() }))?;
        Ok(())
    }

    /// Detach the widget from its root and the registry.
    ///
    /// Removes the instance attribute and marker classes, unbinds the init
    /// and refresh listeners, cleans up every addon and unregisters. Safe to
    /// call more than once.
    pub fn cleanup(&self) {
        {
            let mut phase = self.inner.phase.lock();
            if *phase == Phase::CleanedUp {
                return;
            }
            *phase = Phase::CleanedUp;
        }
        self.inner.countdown.cancel();

        let doc = self.document();
        let root = self.root();
        if doc.contains(root) {
            let attribute = self.inner.registry.attribute();
            let marks = doc
                .remove_attribute(root, attribute)
                .map(drop)
                .and_then(|()| doc.remove_class(root, &self.class_name()))
                .and_then(|()| doc.remove_class(root, &self.instance_class()));
            if let Err(err) = marks {
                tracing::debug!(target: targets::WIDGET, id = %self.id(), error = %err, "could not unmark root");
            }
        }

        for listener in std::mem::take(&mut *self.inner.listeners.lock()) {
            doc.off(listener);
        }

        let addons: Vec<Addon> = self.inner.addons.lock().values().cloned().collect();
        for addon in addons {
            addon.cleanup();
        }

        if let Some(registry) = self.inner.registry.upgrade() {
            registry.unregister(self.id());
        }
        tracing::debug!(target: targets::WIDGET, id = %self.id(), "widget cleaned up");
    }

    // =========================================================================
    // Addons
    // =========================================================================

    /// Attached addons by name.
    pub fn addons(&self) -> IndexMap<String, Addon> {
        self.inner.addons.lock().clone()
    }

    /// The attached addon named `name`.
    pub fn addon(&self, name: &str) -> Option<Addon> {
        self.inner.addons.lock().get(name).cloned()
    }

    pub(crate) fn addon_slots(&self) -> &Mutex<IndexMap<String, Addon>> {
        &self.inner.addons
    }

    // =========================================================================
    // Roles
    // =========================================================================

    /// Run a role pass now and record its outcome.
    ///
    /// Roles only run on a settled widget. Before settle (for example a
    /// refresh fired by a constructor layer or by constructing the same
    /// element again) and after cleanup this returns
    /// [`RoleApplicationOutcome::Inactive`] without recording it.
    pub fn apply_roles(&self) -> RoleApplicationOutcome {
        if !self.is_settled() {
            tracing::trace!(target: targets::ROLE, id = %self.id(), "role pass skipped; widget not active");
            return RoleApplicationOutcome::Inactive;
        }
        let outcome = role::apply_roles(self);
        *self.inner.last_roles.lock() = Some(outcome.clone());
        outcome
    }

    /// The outcome of the most recent role pass.
    pub fn last_role_outcome(&self) -> Option<RoleApplicationOutcome> {
        self.inner.last_roles.lock().clone()
    }

    /// The current elements of a declared role.
    pub fn role_elements(&self, name: &str) -> Result<Vec<NodeId>> {
        role::role_elements(self, name).ok_or_else(|| XooieError::UnknownRole(name.to_string()))
    }

    // =========================================================================
    // Rendering and Styles
    // =========================================================================

    /// Render `template` with the widget's template language.
    ///
    /// Never fails: an unknown language, a renderer error or an empty result
    /// yields a single detached `<span class="xooie-render-error">`.
    pub fn render(&self, template: NodeId, view: &Value) -> Vec<NodeId> {
        let language = self.template_language();
        let rendered = match self.runtime() {
            Ok(runtime) => runtime
                .renderers()
                .render(&language, self.document(), template, view)
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        let message = match rendered {
            Ok(nodes) if !nodes.is_empty() => return nodes,
            Ok(_) => format!("Template rendered no content ({language})"),
            Err(message) => message,
        };
        tracing::debug!(target: targets::RENDER, id = %self.id(), %language, %message, "render fell back to placeholder");
        vec![error_placeholder(self.document(), &message)]
    }

    fn scoped_selector(&self, selector: &str) -> String {
        let selector = selector.trim();
        if selector.is_empty() {
            format!(".{}", self.instance_class())
        } else {
            format!(".{} {selector}", self.instance_class())
        }
    }

    /// Add a stylesheet rule scoped to this instance.
    ///
    /// `selector` is prefixed with the instance class, so `.content`
    /// becomes `.xooie-3 .content`.
    pub fn create_style_rule<I, K, V>(&self, selector: &str, properties: I) -> Result<RuleHandle>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let runtime = self.runtime()?;
        let rule = runtime
            .stylesheet()
            .add_rule(&self.scoped_selector(selector), properties)?;
        Ok(rule)
    }

    /// The instance-scoped rule for `selector`, if one was created.
    pub fn style_rule(&self, selector: &str) -> Option<RuleHandle> {
        let runtime = self.runtime().ok()?;
        runtime.stylesheet().get_rule(&self.scoped_selector(selector))
    }
}

impl PropertyHost for Widget {
    fn property_table(&self) -> &PropertyTable<Self> {
        self.inner.class.properties()
    }

    fn property_store(&self) -> &PropertyStore {
        &self.inner.properties
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("id", &self.id())
            .field("class", &self.inner.class.name())
            .field("root", &self.inner.root)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}
