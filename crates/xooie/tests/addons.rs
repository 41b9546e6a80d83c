//! Addon attachment through widgets and the runtime catalog.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use xooie::prelude::*;

fn attached(xooie: &Xooie) -> NodeId {
    let doc = xooie.document();
    let node = doc.create_element("div");
    doc.append_child(doc.body(), node).unwrap();
    node
}

#[test]
fn duplicate_addons_attach_once() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let inits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&inits);
    xooie
        .document()
        .on(root, "addonInit.keyboard", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let keyboard = AddonClass::new("keyboard").into_shared();
    let widget = Widget::new(
        &xooie,
        &WidgetClass::new("menu").into_shared(),
        root,
        &[Arc::clone(&keyboard), Arc::clone(&keyboard)],
    )
    .unwrap();

    assert_eq!(widget.addons().len(), 1);
    assert_eq!(inits.load(Ordering::SeqCst), 1);

    let again = Addon::new(&keyboard, &widget).unwrap();
    assert!(again.ptr_eq(&widget.addon("keyboard").unwrap()));
    assert_eq!(inits.load(Ordering::SeqCst), 1);
}

#[test]
fn addons_settle_before_widget_init() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let log: Arc<Mutex<Vec<String>>> = Arc::default();
    let doc = xooie.document();
    for event in ["addonInit.keyboard", "widgetInit"] {
        let log = Arc::clone(&log);
        doc.on(root, event, move |e: &DomEvent| log.lock().push(e.event_type.clone()))
            .unwrap();
    }

    let addons = [AddonClass::new("keyboard").into_shared()];
    let class = WidgetClass::new("menu").extend(|_| Ok(())).into_shared();
    let widget = Widget::new(&xooie, &class, root, &addons).unwrap();
    assert!(widget.addons().is_empty());

    xooie.run_until_idle(4);
    assert_eq!(*log.lock(), vec!["addonInit", "widgetInit"]);
    assert!(widget.addon("keyboard").unwrap().is_settled());
}

#[test]
fn extended_addon_settles_on_a_later_turn() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let widget = Widget::new(&xooie, &WidgetClass::new("slider").into_shared(), root, &[]).unwrap();

    let mut class = AddonClass::new("autoplay");
    class.define("delay", json!(1000));
    let class = class
        .extend(|addon| {
            addon.set("delay", json!(500))?;
            Ok(())
        })
        .into_shared();

    let addon = Addon::new(&class, &widget).unwrap();
    assert_eq!(addon.get("delay").unwrap(), json!(500));
    assert_eq!(addon.lifecycle(), Lifecycle::Constructing { pending: 0 });

    xooie.run_turn();
    assert_eq!(addon.lifecycle(), Lifecycle::Active);
}

#[test]
fn widget_cleanup_cleans_addons() {
    let xooie = Xooie::new();
    xooie.register_widget("menu", WidgetClass::new("menu"));
    xooie.register_addon(AddonClass::new("keyboard"));
    xooie.register_addon(AddonClass::new("mouse"));
    let root = attached(&xooie);

    let widget = xooie.create("menu", root, &["keyboard", "mouse", "touch"]).unwrap();
    assert_eq!(
        widget.addons().keys().collect::<Vec<_>>(),
        vec!["keyboard", "mouse"]
    );
    let doc = xooie.document();
    assert!(doc.has_class(root, "has-keyboard-addon"));
    assert!(doc.has_class(root, "has-mouse-addon"));

    widget.cleanup();
    assert!(widget.addons().values().all(|a| a.lifecycle() == Lifecycle::CleanedUp));
    assert!(!doc.has_class(root, "has-keyboard-addon"));
    assert!(!doc.has_class(root, "has-mouse-addon"));
}

#[test]
fn addon_may_hold_its_settle() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let widget = Widget::new(&xooie, &WidgetClass::new("slider").into_shared(), root, &[]).unwrap();
    let held: Arc<Mutex<Option<SettleGuard>>> = Arc::default();

    let slot = Arc::clone(&held);
    let class = AddonClass::new("lazy")
        .extend(move |addon| {
            *slot.lock() = Some(addon.hold());
            Ok(())
        })
        .into_shared();
    let addon = Addon::new(&class, &widget).unwrap();

    xooie.run_until_idle(3);
    assert!(!addon.is_settled());
    if let Some(guard) = held.lock().take() {
        guard.release();
    }
    xooie.run_until_idle(3);
    assert!(addon.is_settled());
}
