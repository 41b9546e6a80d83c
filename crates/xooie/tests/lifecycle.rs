//! Integration tests for widget construction and lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use xooie::prelude::*;
use xooie::{InstanceId, PropertyError};

fn attached(xooie: &Xooie) -> NodeId {
    let doc = xooie.document();
    let node = doc.create_element("div");
    doc.append_child(doc.body(), node).unwrap();
    node
}

fn counting_class(name: &str, passes: &Arc<AtomicUsize>) -> WidgetClass {
    let mut class = WidgetClass::new(name);
    class.define_role("item", false);
    class.set_role_getter("item", |widget| vec![widget.root()]).unwrap();
    let passes = Arc::clone(passes);
    class
        .set_role_processor("item", move |_, _| {
            passes.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    class
}

fn count_events(xooie: &Xooie, root: NodeId, event: &str) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    xooie
        .document()
        .on(root, event, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    count
}

#[test]
fn construction_is_idempotent_per_element() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let inits = count_events(&xooie, root, "widgetInit");
    let refreshes = count_events(&xooie, root, "widgetRefresh");
    let passes = Arc::new(AtomicUsize::new(0));
    let class = counting_class("list", &passes).into_shared();

    let first = Widget::new(&xooie, &class, root, &[]).unwrap();
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(passes.load(Ordering::SeqCst), 1);

    let second = Widget::new(&xooie, &class, root, &[]).unwrap();
    assert!(second.ptr_eq(&first));
    assert_eq!(xooie.registry().len(), 1);
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(passes.load(Ordering::SeqCst), 2);
}

#[test]
fn roles_wait_for_settle() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let refreshes = count_events(&xooie, root, "widgetRefresh");
    let seen: Arc<Mutex<Vec<Lifecycle>>> = Arc::default();

    let mut class = WidgetClass::new("tabs");
    class.define_role("item", false);
    class.set_role_getter("item", |widget| vec![widget.root()]).unwrap();
    let log = Arc::clone(&seen);
    class
        .set_role_processor("item", move |widget, _| log.lock().push(widget.lifecycle()))
        .unwrap();
    let class = class
        .extend(|widget| {
            widget.refresh()?;
            assert_eq!(widget.apply_roles(), RoleApplicationOutcome::Inactive);
            Ok(())
        })
        .into_shared();

    let widget = Widget::new(&xooie, &class, root, &[]).unwrap();
    let again = Widget::new(&xooie, &class, root, &[]).unwrap();
    assert!(again.ptr_eq(&widget));
    assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    assert!(seen.lock().is_empty());
    assert_eq!(widget.last_role_outcome(), None);

    xooie.run_turn();
    assert_eq!(*seen.lock(), vec![Lifecycle::Active]);
    assert!(widget.last_role_outcome().unwrap().is_applied());
}

#[test]
fn reconstruction_does_not_reseed() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let doc = xooie.document();
    doc.set_attribute(root, "data-title", "first").unwrap();

    let mut class = WidgetClass::new("panel");
    class.define("title", json!(""));
    let class = class.into_shared();

    let widget = Widget::new(&xooie, &class, root, &[]).unwrap();
    doc.set_attribute(root, "data-title", "second").unwrap();
    let again = Widget::new(&xooie, &class, root, &[]).unwrap();
    assert!(again.ptr_eq(&widget));
    assert_eq!(widget.get("title").unwrap(), json!("first"));
}

#[test]
fn ids_are_unique_and_monotonic() {
    let xooie = Xooie::new();
    let class = WidgetClass::new("plain").into_shared();

    let widgets: Vec<Widget> = (0..3)
        .map(|_| Widget::new(&xooie, &class, attached(&xooie), &[]).unwrap())
        .collect();
    let ids: Vec<u64> = widgets.iter().map(|w| w.id().as_u64()).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    widgets[1].cleanup();
    let next = Widget::new(&xooie, &class, attached(&xooie), &[]).unwrap();
    assert_eq!(next.id(), InstanceId::from_raw(4));
    assert_eq!(
        xooie.registry().ids(),
        vec![InstanceId::from_raw(1), InstanceId::from_raw(3), InstanceId::from_raw(4)]
    );
}

#[test]
fn property_round_trip_and_access() {
    let xooie = Xooie::new();
    let mut class = WidgetClass::new("form");
    class.define("value", json!("initial"));
    class.define_write_only("token");
    let widget = Widget::new(&xooie, &class.into_shared(), attached(&xooie), &[]).unwrap();

    assert_eq!(widget.property("value", None).unwrap(), json!("initial"));
    assert_eq!(widget.property("value", Some(json!("next"))).unwrap(), json!("next"));
    assert_eq!(widget.get("value").unwrap(), json!("next"));

    assert_eq!(
        widget.property("id", Some(json!(99))),
        Err(PropertyError::NoSetter("id".into()))
    );
    assert_eq!(widget.id(), InstanceId::from_raw(1));

    assert_eq!(
        widget.property("token", None),
        Err(PropertyError::NoGetter("token".into()))
    );
    widget.property("token", Some(json!("abc"))).unwrap();
    assert_eq!(widget.get("token").unwrap(), json!("abc"));

    assert_eq!(
        widget.property("missing", None),
        Err(PropertyError::NotFound("missing".into()))
    );
}

#[test]
fn three_level_extension_settles_after_every_layer() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();

    let layer = |label: &'static str| {
        let log = Arc::clone(&log);
        move |_: &Widget| -> xooie::Result<()> {
            log.lock().push(label);
            Ok(())
        }
    };
    let class = WidgetClass::new("deep")
        .extend(layer("one"))
        .extend(layer("two"))
        .extend(layer("three"));
    assert_eq!(class.extend_count(), 3);

    let init_log = Arc::clone(&log);
    xooie
        .document()
        .on(root, "widgetInit", move |_| init_log.lock().push("init"))
        .unwrap();

    let widget = Widget::new(&xooie, &class.into_shared(), root, &[]).unwrap();
    assert_eq!(*log.lock(), vec!["one", "two", "three"]);
    assert_eq!(widget.lifecycle(), Lifecycle::Constructing { pending: 0 });

    xooie.run_turn();
    assert_eq!(*log.lock(), vec!["one", "two", "three", "init"]);
    assert_eq!(widget.lifecycle(), Lifecycle::Active);
    assert!(!xooie.tasks().has_pending());
}

#[test]
fn hold_defers_settle() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let held: Arc<Mutex<Option<SettleGuard>>> = Arc::default();

    let slot = Arc::clone(&held);
    let class = WidgetClass::new("async").extend(move |widget| {
        *slot.lock() = Some(widget.hold());
        Ok(())
    });
    let widget = Widget::new(&xooie, &class.into_shared(), root, &[]).unwrap();

    xooie.run_until_idle(5);
    assert_eq!(widget.lifecycle(), Lifecycle::Constructing { pending: 1 });
    assert!(xooie.tasks().has_pending());

    held.lock().take();
    xooie.run_turn();
    assert!(widget.is_settled());
    assert!(!xooie.tasks().has_pending());
}

#[test]
fn stuck_settle_keeps_polling_past_limit() {
    let config = XooieConfig::from_toml_str("settle_poll_limit = 2").unwrap();
    let xooie = Xooie::builder().config(config).build().unwrap();
    let root = attached(&xooie);
    let held: Arc<Mutex<Vec<SettleGuard>>> = Arc::default();

    let slot = Arc::clone(&held);
    let class = WidgetClass::new("stuck").extend(move |widget| {
        slot.lock().push(widget.hold());
        Ok(())
    });
    let widget = Widget::new(&xooie, &class.into_shared(), root, &[]).unwrap();

    assert_eq!(xooie.run_until_idle(6), 6);
    assert!(!widget.is_settled());

    held.lock().clear();
    xooie.run_until_idle(6);
    assert!(widget.is_settled());
}

#[test]
fn cleanup_during_construction_cancels_settle() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let class = WidgetClass::new("deferred").extend(|_| Ok(()));
    let widget = Widget::new(&xooie, &class.into_shared(), root, &[]).unwrap();

    widget.cleanup();
    xooie.run_until_idle(4);
    assert_eq!(widget.lifecycle(), Lifecycle::CleanedUp);
    assert!(!xooie.tasks().has_pending());
}

#[test]
fn namespace_shapes_events_and_classes() {
    let xooie = Xooie::new();
    let doc = xooie.document();
    let root = attached(&xooie);
    doc.set_attribute(root, "data-namespace", "foo").unwrap();
    let passes = Arc::new(AtomicUsize::new(0));
    let widget = Widget::new(&xooie, &counting_class("ns", &passes).into_shared(), root, &[]).unwrap();

    assert_eq!(widget.namespace(), "foo");
    assert_eq!(widget.init_event(), "widgetInit.foo");
    assert_eq!(widget.refresh_event(), "widgetRefresh.foo");
    assert_eq!(widget.class_name(), "is-instantiated-foo");
    assert!(doc.has_class(root, "is-instantiated-foo"));
    assert_eq!(passes.load(Ordering::SeqCst), 1);

    doc.trigger(root, "widgetRefresh.foo", json!(null)).unwrap();
    assert_eq!(passes.load(Ordering::SeqCst), 2);
    doc.trigger(root, "widgetRefresh.bar", json!(null)).unwrap();
    assert_eq!(passes.load(Ordering::SeqCst), 2);
    doc.trigger(root, "widgetRefresh", json!(null)).unwrap();
    assert_eq!(passes.load(Ordering::SeqCst), 3);
}

#[test]
fn empty_namespace_uses_plain_names() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let widget = Widget::new(&xooie, &WidgetClass::new("plain").into_shared(), root, &[]).unwrap();

    assert_eq!(widget.namespace(), "");
    assert_eq!(widget.init_event(), "widgetInit");
    assert_eq!(widget.refresh_event(), "widgetRefresh");
    assert_eq!(widget.class_name(), "is-instantiated");
    assert!(xooie.document().has_class(root, "is-instantiated"));
}

#[test]
fn markup_seeds_declared_properties() {
    let xooie = Xooie::new();
    let doc = xooie.document();
    let root = attached(&xooie);
    doc.set_attribute(root, "data-auto-play", "true").unwrap();
    doc.set_attribute(root, "data-count", "5").unwrap();
    doc.set_attribute(root, "data-options", r#"{"loop":true}"#).unwrap();
    doc.set_attribute(root, "data-label", "01").unwrap();
    doc.set_attribute(root, "data-unrelated", "x").unwrap();

    let mut class = WidgetClass::new("carousel");
    class.define("autoPlay", json!(false));
    class.define("count", json!(1));
    class.define("options", json!({}));
    class.define("label", json!(""));
    let widget = Widget::new(&xooie, &class.into_shared(), root, &[]).unwrap();

    assert_eq!(widget.get("autoPlay").unwrap(), json!(true));
    assert_eq!(widget.get("count").unwrap(), json!(5));
    assert_eq!(widget.get("options").unwrap(), json!({"loop": true}));
    assert_eq!(widget.get("label").unwrap(), json!("01"));
    assert!(widget.get("unrelated").is_err());
}

#[test]
fn seeding_respects_validators() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    xooie.document().set_attribute(root, "data-count", "many").unwrap();

    let mut class = WidgetClass::new("counter");
    class.define("count", json!(1));
    class.set_validator("count", |_, value| value.is_number()).unwrap();
    let widget = Widget::new(&xooie, &class.into_shared(), root, &[]).unwrap();

    assert_eq!(widget.get("count").unwrap(), json!(1));
    assert_eq!(widget.set("count", json!(4)).unwrap(), SetOutcome::Stored);
    assert_eq!(widget.set("count", json!("four")).unwrap(), SetOutcome::Rejected);
    assert_eq!(widget.get("count").unwrap(), json!(4));
}

#[test]
fn dropped_runtime_is_reported() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let widget = Widget::new(&xooie, &WidgetClass::new("plain").into_shared(), root, &[]).unwrap();
    let registry = xooie.registry().clone();
    drop(xooie);

    assert!(matches!(widget.runtime(), Err(XooieError::RuntimeDropped)));
    assert!(widget.create_style_rule(".x", [("color", "red")]).is_err());

    // Cleanup still clears the slot in a registry that outlived the runtime.
    assert_eq!(registry.len(), 1);
    widget.cleanup();
    assert!(registry.is_empty());
    assert!(registry.lookup(widget.id()).is_none());
}
