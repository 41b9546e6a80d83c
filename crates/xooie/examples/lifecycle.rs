//! Xooie Lifecycle Example
//!
//! Builds a small document, registers a tab-strip widget type with a
//! keyboard addon, scans the document and drives the runtime until every
//! widget has settled. Prints the resulting markup and stylesheet.
//!
//! Run with: cargo run -p xooie --example lifecycle
//! Set RUST_LOG=xooie=debug to see the lifecycle logs.

use serde_json::json;
use tracing_subscriber::EnvFilter;
use xooie::prelude::*;
use xooie::xooie_core::DocumentTreeDebug;

fn build_markup(doc: &Document) -> Result<NodeId> {
    let root = doc.create_element("div");
    doc.set_attribute(root, "data-widget-type", "tabs")?;
    doc.set_attribute(root, "data-addons", "keyboard")?;
    doc.set_attribute(root, "data-namespace", "main")?;
    doc.set_attribute(root, "data-selected", "1")?;

    for label in ["Inbox", "Sent", "Drafts"] {
        let tab = doc.create_element("button");
        doc.set_attribute(tab, "data-x-role", "tab")?;
        doc.set_text(tab, label)?;
        doc.append_child(root, tab)?;
    }
    doc.append_child(doc.body(), root)?;
    Ok(root)
}

fn tab_class() -> Result<WidgetClass> {
    let mut class = WidgetClass::new("tabs");
    class.define("selected", json!(0));
    class.set_validator("selected", |_, value| value.is_u64())?;
    class.define_role("tab", false);
    class.define_role("panel", false);
    class.set_role_renderer("panel", |widget| {
        let doc = widget.document();
        for tab in widget.role_elements("tab")? {
            let panel = doc.create_element("section");
            doc.set_attribute(panel, "data-x-role", "panel")?;
            doc.set_text(panel, &format!("Panel for {}", doc.text_content(tab)))?;
            doc.append_child(widget.root(), panel)?;
        }
        Ok(())
    })?;
    class.set_role_processor("tab", |widget, tabs| {
        let selected = widget.get("selected").ok().and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        for (index, &tab) in tabs.iter().enumerate() {
            let state = if index == selected { "true" } else { "false" };
            let _ = widget.document().set_attribute(tab, "aria-selected", state);
        }
    })?;

    Ok(class.extend(|widget| {
        widget.create_style_rule("[data-x-role=\"panel\"]", [("minHeight", "120px")])?;
        Ok(())
    }))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let xooie = Xooie::new();
    xooie.register_widget("tabs", tab_class()?);
    xooie.register_addon(AddonClass::new("keyboard"));

    let root = build_markup(xooie.document())?;
    let widgets = xooie.scan(xooie.document().body());
    let turns = xooie.run_until_idle(16);

    for widget in &widgets {
        println!(
            "widget {} ({}) settled after {turns} turn(s): {:?}",
            widget.id(),
            widget.class().name(),
            widget.last_role_outcome()
        );
    }
    println!("{}", DocumentTreeDebug::new().format_subtree(xooie.document(), root));
    println!("{}", xooie.stylesheet().to_css());
    Ok(())
}
