//! The runtime: one document plus the services its widgets share.
//!
//! [`Xooie`] owns the document, the instance registry, the task queue that
//! deferred settles run on, the sweep timer, the stylesheet, the renderer
//! registry and a catalog of named widget and addon classes. Nothing runs on
//! its own: the host drives the runtime with [`Xooie::run_turn`] (or
//! [`Xooie::run_until_idle`]) and [`Xooie::advance_to`].
//!
//! ```
//! use xooie::prelude::*;
//!
//! let xooie = Xooie::new();
//! xooie.register_widget("carousel", WidgetClass::new("carousel").extend(|_| Ok(())));
//!
//! let doc = xooie.document();
//! let root = doc.create_element("div");
//! doc.set_attribute(root, "data-widget-type", "carousel").unwrap();
//! doc.append_child(doc.body(), root).unwrap();
//!
//! let widgets = xooie.scan(doc.body());
//! assert_eq!(widgets.len(), 1);
//! assert!(!widgets[0].is_settled());
//! xooie.run_until_idle(8);
//! assert!(widgets[0].is_settled());
//! ```

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use xooie_core::logging::targets;
use xooie_core::{Document, NodeId, TaskQueue, TimerId, TimerManager};
use xooie_style::StyleSheet;

use crate::addon::AddonClass;
use crate::config::XooieConfig;
use crate::error::Result;
use crate::registry::{InstanceId, InstanceRegistry};
use crate::render::{Renderer, RendererRegistry};
use crate::widget::{ElementRef, Widget, WidgetClass};

pub(crate) struct RuntimeInner {
    config: Arc<XooieConfig>,
    document: Document,
    registry: InstanceRegistry,
    tasks: Arc<TaskQueue>,
    timers: Mutex<TimerManager>,
    sweep_timer: Option<TimerId>,
    stylesheet: StyleSheet,
    renderers: RendererRegistry,
    widget_types: RwLock<IndexMap<String, Arc<WidgetClass>>>,
    addon_types: RwLock<IndexMap<String, Arc<AddonClass>>>,
}

/// Shared handle to a widget runtime.
#[derive(Clone)]
pub struct Xooie {
    inner: Arc<RuntimeInner>,
}

/// Builder for [`Xooie`].
pub struct XooieBuilder {
    config: XooieConfig,
    document: Option<Document>,
    registry: Option<InstanceRegistry>,
    renderers: RendererRegistry,
    start: Option<Instant>,
}

impl XooieBuilder {
    fn new() -> Self {
        Self {
            config: XooieConfig::default(),
            document: None,
            registry: None,
            renderers: RendererRegistry::new(),
            start: None,
        }
    }

    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: XooieConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach to an existing document.
    pub fn document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    /// Share an existing registry instead of creating one.
    ///
    /// The registry keeps its own instance attribute.
    pub fn registry(mut self, registry: InstanceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register a renderer for `language`.
    pub fn renderer(self, language: &str, renderer: impl Renderer + 'static) -> Self {
        self.renderers.register(language, renderer);
        self
    }

    /// The instant the sweep timer counts from. Defaults to now.
    pub fn start_time(mut self, start: Instant) -> Self {
        self.start = Some(start);
        self
    }

    /// Validate the configuration and create the runtime.
    pub fn build(self) -> Result<Xooie> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> Xooie {
        let registry = self
            .registry
            .unwrap_or_else(|| InstanceRegistry::with_attribute(&self.config.instance_attribute));
        let mut timers = TimerManager::new();
        let sweep_timer = self.config.cleanup_interval().map(|interval| {
            let start = self.start.unwrap_or_else(Instant::now);
            timers.start_repeating(start, interval)
        });
        tracing::debug!(
            target: targets::RUNTIME,
            sweep = sweep_timer.is_some(),
            attribute = registry.attribute(),
            "runtime created"
        );
        Xooie {
            inner: Arc::new(RuntimeInner {
                config: Arc::new(self.config),
                document: self.document.unwrap_or_default(),
                registry,
                tasks: Arc::new(TaskQueue::new()),
                timers: Mutex::new(timers),
                sweep_timer,
                stylesheet: StyleSheet::new(),
                renderers: self.renderers,
                widget_types: RwLock::new(IndexMap::new()),
                addon_types: RwLock::new(IndexMap::new()),
            }),
        }
    }
}

impl Xooie {
    /// A runtime with the default configuration and a fresh document.
    pub fn new() -> Self {
        XooieBuilder::new().assemble()
    }

    /// Start configuring a runtime.
    pub fn builder() -> XooieBuilder {
        XooieBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<RuntimeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn shared_config(&self) -> Arc<XooieConfig> {
        Arc::clone(&self.inner.config)
    }

    pub(crate) fn task_queue(&self) -> &Arc<TaskQueue> {
        &self.inner.tasks
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// The configuration.
    pub fn config(&self) -> &XooieConfig {
        &self.inner.config
    }

    /// The document widgets live in.
    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    /// The instance registry.
    pub fn registry(&self) -> &InstanceRegistry {
        &self.inner.registry
    }

    /// The queue deferred work runs on.
    pub fn tasks(&self) -> &TaskQueue {
        &self.inner.tasks
    }

    /// The shared dynamic stylesheet.
    pub fn stylesheet(&self) -> &StyleSheet {
        &self.inner.stylesheet
    }

    /// The template renderers.
    pub fn renderers(&self) -> &RendererRegistry {
        &self.inner.renderers
    }

    // =========================================================================
    // Class Catalog
    // =========================================================================

    /// Register a widget class under `type_name`, replacing any previous one.
    pub fn register_widget(&self, type_name: &str, class: impl Into<Arc<WidgetClass>>) -> Arc<WidgetClass> {
        let class = class.into();
        self.inner
            .widget_types
            .write()
            .insert(type_name.to_string(), Arc::clone(&class));
        tracing::debug!(target: targets::RUNTIME, type_name, "registered widget type");
        class
    }

    /// Register an addon class under its name, replacing any previous one.
    pub fn register_addon(&self, class: impl Into<Arc<AddonClass>>) -> Arc<AddonClass> {
        let class = class.into();
        self.inner
            .addon_types
            .write()
            .insert(class.name().to_string(), Arc::clone(&class));
        tracing::debug!(target: targets::RUNTIME, addon = class.name(), "registered addon type");
        class
    }

    /// The widget class registered under `type_name`.
    pub fn widget_class(&self, type_name: &str) -> Option<Arc<WidgetClass>> {
        self.inner.widget_types.read().get(type_name).cloned()
    }

    /// The addon class registered under `name`.
    pub fn addon_class(&self, name: &str) -> Option<Arc<AddonClass>> {
        self.inner.addon_types.read().get(name).cloned()
    }

    // =========================================================================
    // Instantiation
    // =========================================================================

    /// Instantiate the registered widget type on `element` with the named addons.
    ///
    /// Unknown addon names are logged and skipped.
    pub fn create(&self, type_name: &str, element: impl Into<ElementRef>, addons: &[&str]) -> Result<Widget> {
        let class = self
            .widget_class(type_name)
            .ok_or_else(|| crate::XooieError::constructor(format!("Unknown widget type '{type_name}'")))?;
        let addons = self.resolve_addons(addons.iter().copied());
        Widget::new(self, &class, element, &addons)
    }

    fn resolve_addons<'a>(&self, names: impl Iterator<Item = &'a str>) -> Vec<Arc<AddonClass>> {
        names
            .filter_map(|name| {
                let class = self.addon_class(name);
                if class.is_none() {
                    tracing::warn!(target: targets::RUNTIME, addon = name, "unknown addon skipped");
                }
                class
            })
            .collect()
    }

    /// Instantiate a widget for every element at or under `scope` that names
    /// a registered widget type.
    ///
    /// Elements are visited in document order. Unknown types and addons are
    /// logged and skipped, as are elements whose construction fails.
    #[tracing::instrument(skip(self), target = "xooie::runtime", level = "debug")]
    pub fn scan(&self, scope: NodeId) -> Vec<Widget> {
        let doc = self.document();
        let config = self.config();
        let mut candidates = vec![scope];
        candidates.extend(doc.descendants(scope));

        let mut widgets = Vec::new();
        for node in candidates {
            let Some(type_name) = doc.attribute(node, &config.widget_type_attribute) else {
                continue;
            };
            let Some(class) = self.widget_class(type_name.trim()) else {
                tracing::warn!(target: targets::RUNTIME, type_name = %type_name, "unknown widget type skipped");
                continue;
            };
            let addon_names = doc.attribute(node, &config.addons_attribute).unwrap_or_default();
            let addons = self.resolve_addons(addon_names.split_whitespace());
            match Widget::new(self, &class, node, &addons) {
                Ok(widget) => widgets.push(widget),
                Err(err) => {
                    tracing::warn!(target: targets::RUNTIME, type_name = %type_name, error = %err, "widget construction failed");
                }
            }
        }
        widgets
    }

    /// The widget bound to `node`, if any.
    pub fn widget_for(&self, node: NodeId) -> Option<Widget> {
        self.registry().lookup_element(self.document(), node)
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Run one turn of the task queue. Returns the number of tasks run.
    pub fn run_turn(&self) -> usize {
        self.inner.tasks.run_turn()
    }

    /// Run turns until no task is pending or `max_turns` have run.
    pub fn run_until_idle(&self, max_turns: usize) -> usize {
        self.inner.tasks.run_until_idle(max_turns)
    }

    /// When the sweep timer next fires.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.timers.lock().next_deadline()
    }

    /// Fire every timer due at `now`. Returns the ids swept.
    pub fn advance_to(&self, now: Instant) -> Vec<InstanceId> {
        let expired = self.inner.timers.lock().expired(now);
        match self.inner.sweep_timer {
            Some(sweep) if expired.contains(&sweep) => self.sweep(),
            _ => Vec::new(),
        }
    }

    /// Clean up every widget whose root is detached. Returns the ids swept.
    pub fn sweep(&self) -> Vec<InstanceId> {
        self.inner.registry.sweep()
    }
}

impl Default for Xooie {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Xooie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Xooie")
            .field("registry", &self.inner.registry)
            .field("pending_tasks", &self.inner.tasks.pending_count())
            .field("widget_types", &self.inner.widget_types.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
