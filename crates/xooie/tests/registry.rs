//! Instance registry and detached-widget sweeping.

use std::io::Write;
use std::time::{Duration, Instant};

use xooie::prelude::*;
use xooie::InstanceId;

fn attached(xooie: &Xooie) -> NodeId {
    let doc = xooie.document();
    let node = doc.create_element("div");
    doc.append_child(doc.body(), node).unwrap();
    node
}

#[test]
fn sweep_collects_detached_widgets_only() {
    let xooie = Xooie::new();
    let class = WidgetClass::new("plain").into_shared();
    let kept = Widget::new(&xooie, &class, attached(&xooie), &[]).unwrap();
    let removed = Widget::new(&xooie, &class, attached(&xooie), &[]).unwrap();
    let destroyed = Widget::new(&xooie, &class, attached(&xooie), &[]).unwrap();

    let doc = xooie.document();
    doc.remove(removed.root()).unwrap();
    doc.destroy(destroyed.root()).unwrap();

    let swept = xooie.sweep();
    assert_eq!(swept, vec![removed.id(), destroyed.id()]);
    assert!(removed.is_cleaned_up());
    assert!(destroyed.is_cleaned_up());
    assert!(!kept.is_cleaned_up());
    assert_eq!(xooie.registry().ids(), vec![kept.id()]);
    assert!(xooie.sweep().is_empty());
}

#[test]
fn nested_roots_are_detached_with_their_ancestor() {
    let xooie = Xooie::new();
    let doc = xooie.document();
    let outer = attached(&xooie);
    let inner = doc.create_element("div");
    doc.append_child(outer, inner).unwrap();

    let class = WidgetClass::new("plain").into_shared();
    let outer_widget = Widget::new(&xooie, &class, outer, &[]).unwrap();
    let inner_widget = Widget::new(&xooie, &class, inner, &[]).unwrap();

    doc.remove(outer).unwrap();
    assert_eq!(xooie.sweep(), vec![outer_widget.id(), inner_widget.id()]);
    assert!(xooie.registry().is_empty());
}

#[test]
fn lookup_by_element() {
    let xooie = Xooie::new();
    let root = attached(&xooie);
    let widget = Widget::new(&xooie, &WidgetClass::new("plain").into_shared(), root, &[]).unwrap();

    assert!(xooie.widget_for(root).unwrap().ptr_eq(&widget));
    assert!(xooie.widget_for(attached(&xooie)).is_none());

    // A different document never resolves, even with a matching attribute.
    let other = Document::new();
    let foreign = other.create_element("div");
    other.set_attribute(foreign, "data-xooie-instance", "1").unwrap();
    assert!(xooie.registry().lookup_element(&other, foreign).is_none());
}

#[test]
fn instance_ids_parse_from_markup() {
    assert_eq!(InstanceId::parse("7"), Some(InstanceId::from_raw(7)));
    assert_eq!(InstanceId::parse(" 12 "), Some(InstanceId::from_raw(12)));
    assert_eq!(InstanceId::parse("0"), None);
    assert_eq!(InstanceId::parse("-1"), None);
    assert_eq!(InstanceId::parse("tab"), None);
}

#[test]
fn periodic_sweep_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"cleanup_interval_ms = 250
instance_attribute = "data-widget-id""#
    )
    .unwrap();
    let config = XooieConfig::load(file.path()).unwrap();

    let start = Instant::now();
    let xooie = Xooie::builder().config(config).start_time(start).build().unwrap();
    let root = attached(&xooie);
    let widget = Widget::new(&xooie, &WidgetClass::new("plain").into_shared(), root, &[]).unwrap();
    assert_eq!(
        xooie.document().attribute(root, "data-widget-id").as_deref(),
        Some("1")
    );

    assert!(xooie.advance_to(start + Duration::from_millis(250)).is_empty());
    xooie.document().remove(root).unwrap();
    assert_eq!(
        xooie.advance_to(start + Duration::from_millis(500)),
        vec![widget.id()]
    );
    assert_eq!(
        xooie.next_deadline(),
        Some(start + Duration::from_millis(750))
    );
}
