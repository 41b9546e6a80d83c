//! Addons: optional behavior attached to a widget by name.
//!
//! An addon belongs to exactly one widget and is stored in that widget's
//! addon map under its class name, so attaching the same addon twice returns
//! the first instance. Addons share the widget's root element: they seed
//! from its `data-*` attributes, mark it with their own class and announce
//! themselves by firing their init event on it.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use xooie_core::logging::targets;

use crate::class::{schedule_settle, Class, Countdown, Lifecycle, Phase, SettleGuard};
use crate::error::Result;
use crate::property::{Access, PropertyHost, PropertyStore, PropertyTable};
use crate::widget::{value_string, WeakWidget, Widget};

/// An addon type.
pub type AddonClass = Class<Addon>;

impl Class<Addon> {
    /// A base addon class named `name`.
    ///
    /// Declares `initEvent` (`addonInit`, read as `addonInit.<name>`) and
    /// `addonClass` (`has-addon`, read as `has-<name>-addon`).
    pub fn new(name: impl Into<String>) -> Self {
        let mut class = Class::bare(name);
        let properties = class.properties_mut();
        properties.declare_processed(
            "initEvent",
            Access::ReadOnly,
            json!("addonInit"),
            Arc::new(|addon: &Addon, raw: Value| {
                json!(format!("{}.{}", value_string(&raw), addon.name()))
            }),
        );
        properties.declare_processed(
            "addonClass",
            Access::ReadOnly,
            json!("has-addon"),
            Arc::new(|addon: &Addon, raw: Value| {
                let raw = value_string(&raw);
                json!(match raw.split_once('-') {
                    Some((head, tail)) => format!("{head}-{}-{tail}", addon.name()),
                    None => format!("{raw}-{}", addon.name()),
                })
            }),
        );
        class
    }
}

struct AddonInner {
    class: Arc<AddonClass>,
    widget: WeakWidget,
    properties: PropertyStore,
    countdown: Countdown,
    phase: Mutex<Phase>,
}

/// A live addon instance.
#[derive(Clone)]
pub struct Addon {
    inner: Arc<AddonInner>,
}

impl Addon {
    /// Attach an addon of `class` to `widget`, or return the one already attached.
    #[tracing::instrument(skip_all, fields(addon = class.name(), widget = %widget.id()), target = "xooie::addon", level = "debug")]
    pub fn new(class: &Arc<AddonClass>, widget: &Widget) -> Result<Addon> {
        let name = class.name();
        if let Some(existing) = widget.addon(name) {
            tracing::trace!(target: targets::ADDON, "addon already attached");
            return Ok(existing);
        }

        let addon = Addon {
            inner: Arc::new(AddonInner {
                class: Arc::clone(class),
                widget: widget.downgrade(),
                properties: PropertyStore::new(),
                countdown: Countdown::new(class.extend_count()),
                phase: Mutex::new(Phase::Constructing),
            }),
        };
        let doc = widget.document();
        addon.set_data(&doc.dataset(widget.root()));

        {
            let mut slots = widget.addon_slots().lock();
            if let Some(existing) = slots.get(name) {
                return Ok(existing.clone());
            }
            slots.insert(name.to_string(), addon.clone());
        }

        doc.add_class(widget.root(), &addon.addon_class())?;

        if let Err(err) = class.run_layers(&addon, &addon.inner.countdown) {
            tracing::warn!(target: targets::ADDON, error = %err, "addon constructor failed");
            addon.cleanup();
            widget.addon_slots().lock().shift_remove(name);
            return Err(err);
        }

        if class.extend_count() == 0 {
            addon.settle()?;
        } else {
            let runtime = widget.runtime()?;
            let deferred = addon.clone();
            schedule_settle(
                runtime.task_queue(),
                addon.inner.countdown.clone(),
                widget.settle_poll_limit(),
                format!("{name}@{}", widget.id()),
                move || {
                    if let Err(err) = deferred.settle() {
                        tracing::warn!(target: targets::ADDON, addon = deferred.name(), error = %err, "deferred settle failed");
                    }
                },
            );
        }
        Ok(addon)
    }

    fn settle(&self) -> Result<()> {
        {
            let mut phase = self.inner.phase.lock();
            if *phase == Phase::CleanedUp {
                return Ok(());
            }
            *phase = Phase::Active;
        }
        let Some(widget) = self.widget() else {
            return Ok(());
        };
        let event = self.init_event();
        widget
            .document()
            .trigger(widget.root(), &event, json!({ "addon": self.name() }))?;
        tracing::debug!(target: targets::ADDON, addon = self.name(), widget = %widget.id(), "addon settled");
        Ok(())
    }

    /// The addon name, which is its class name.
    pub fn name(&self) -> &str {
        self.inner.class.name()
    }

    /// The addon's class.
    pub fn class(&self) -> &Arc<AddonClass> {
        &self.inner.class
    }

    /// The owning widget, if it is still alive.
    pub fn widget(&self) -> Option<Widget> {
        self.inner.widget.upgrade()
    }

    /// The init event fired on the widget root when the addon settles.
    pub fn init_event(&self) -> String {
        self.get("initEvent").map(|v| value_string(&v)).unwrap_or_default()
    }

    /// The marker class added to the widget root.
    pub fn addon_class(&self) -> String {
        self.get("addonClass").map(|v| value_string(&v)).unwrap_or_default()
    }

    /// The current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.phase.lock().lifecycle(&self.inner.countdown)
    }

    /// Whether the addon has settled and is not cleaned up.
    pub fn is_settled(&self) -> bool {
        *self.inner.phase.lock() == Phase::Active
    }

    /// Keep the addon from settling until the guard is dropped.
    pub fn hold(&self) -> SettleGuard {
        self.inner.countdown.hold()
    }

    /// Remove the marker class from the widget root.
    ///
    /// The addon stays in the widget's addon map, so attaching the same
    /// addon again returns this instance.
    pub fn cleanup(&self) {
        {
            let mut phase = self.inner.phase.lock();
            if *phase == Phase::CleanedUp {
                return;
            }
            *phase = Phase::CleanedUp;
        }
        self.inner.countdown.cancel();
        if let Some(widget) = self.widget() {
            let doc = widget.document();
            if doc.contains(widget.root()) {
                if let Err(err) = doc.remove_class(widget.root(), &self.addon_class()) {
                    tracing::debug!(target: targets::ADDON, addon = self.name(), error = %err, "could not unmark root");
                }
            }
        }
        tracing::debug!(target: targets::ADDON, addon = self.name(), "addon cleaned up");
    }

    /// Whether two handles refer to the same addon.
    pub fn ptr_eq(&self, other: &Addon) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PropertyHost for Addon {
    fn property_table(&self) -> &PropertyTable<Self> {
        self.inner.class.properties()
    }

    fn property_store(&self) -> &PropertyStore {
        &self.inner.properties
    }
}

impl fmt::Debug for Addon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Addon")
            .field("name", &self.name())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WidgetClass, Xooie};

    fn widget(xooie: &Xooie) -> Widget {
        let doc = xooie.document();
        let root = doc.create_element("div");
        doc.set_attribute(root, "data-delay", "250").unwrap();
        doc.append_child(doc.body(), root).unwrap();
        Widget::new(xooie, &WidgetClass::new("plain").into_shared(), root, &[]).unwrap()
    }

    #[test]
    fn processed_names() {
        let xooie = Xooie::new();
        let widget = widget(&xooie);
        let addon = Addon::new(&AddonClass::new("keyboard").into_shared(), &widget).unwrap();
        assert_eq!(addon.init_event(), "addonInit.keyboard");
        assert_eq!(addon.addon_class(), "has-keyboard-addon");
        assert!(widget.document().has_class(widget.root(), "has-keyboard-addon"));
        assert!(addon.widget().unwrap().ptr_eq(&widget));
        assert!(addon.is_settled());
    }

    #[test]
    fn seeds_from_widget_markup() {
        let xooie = Xooie::new();
        let widget = widget(&xooie);
        let mut class = AddonClass::new("autoplay");
        class.define("delay", 0);
        let addon = Addon::new(&class.into_shared(), &widget).unwrap();
        assert_eq!(addon.get("delay").unwrap(), json!(250));
    }

    #[test]
    fn cleanup_keeps_map_entry() {
        let xooie = Xooie::new();
        let widget = widget(&xooie);
        let class = AddonClass::new("keyboard").into_shared();
        let addon = Addon::new(&class, &widget).unwrap();

        addon.cleanup();
        assert_eq!(addon.lifecycle(), Lifecycle::CleanedUp);
        assert!(!widget.document().has_class(widget.root(), "has-keyboard-addon"));
        assert!(widget.addon("keyboard").unwrap().ptr_eq(&addon));
        assert!(Addon::new(&class, &widget).unwrap().ptr_eq(&addon));
    }

    #[test]
    fn failing_addon_is_detached() {
        let xooie = Xooie::new();
        let widget = widget(&xooie);
        let class = AddonClass::new("broken")
            .extend(|_| Err(crate::XooieError::constructor("no")))
            .into_shared();
        assert!(Addon::new(&class, &widget).is_err());
        assert!(widget.addon("broken").is_none());
        assert!(!widget.document().has_class(widget.root(), "has-broken-addon"));
    }
}
