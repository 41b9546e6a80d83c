//! Xooie - a widget framework core for DOM trees.
//!
//! Widgets are objects bound to a root element. The framework gives every
//! widget type:
//!
//! - **Properties**: Declared, defaulted, optionally processed on read and
//!   validated on write, seeded from the root's `data-*` attributes
//! - **Extension**: Derived classes whose constructor layers run base first,
//!   with settle deferred until every layer and hold has completed
//! - **Registry**: Process-unique instance ids written onto root elements,
//!   idempotent construction and a sweep of detached instances
//! - **Roles**: Named element sets found, rendered, id'd and processed on
//!   every init and refresh
//! - **Addons**: Named, deduplicated behaviors attached to a widget
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use xooie::prelude::*;
//!
//! let xooie = Xooie::new();
//! let doc = xooie.document();
//! let root = doc.create_element("div");
//! doc.set_attribute(root, "data-namespace", "gallery").unwrap();
//! doc.append_child(doc.body(), root).unwrap();
//!
//! let mut class = WidgetClass::new("carousel");
//! class.define("index", json!(0));
//! let carousel = class.extend(|widget| {
//!     widget.set("index", json!(2))?;
//!     Ok(())
//! });
//!
//! let widget = Widget::new(&xooie, &carousel.into_shared(), root, &[]).unwrap();
//! assert!(matches!(widget.lifecycle(), Lifecycle::Constructing { pending: 0 }));
//! xooie.run_until_idle(4);
//! assert_eq!(widget.lifecycle(), Lifecycle::Active);
//! assert_eq!(widget.get("index").unwrap(), json!(2));
//! assert_eq!(widget.refresh_event(), "widgetRefresh.gallery");
//! ```

pub mod addon;
pub mod class;
pub mod config;
pub mod property;
pub mod registry;
pub mod render;
pub mod role;
pub mod runtime;
pub mod widget;

mod error;
pub mod prelude;

pub use addon::{Addon, AddonClass};
pub use class::{Class, Constructor, Lifecycle, SettleGuard};
pub use config::XooieConfig;
pub use error::{ConfigError, PropertyError, RenderError, Result, XooieError};
pub use property::{Access, PropertyHost, PropertyTable, SetOutcome};
pub use registry::{InstanceId, InstanceRegistry};
pub use render::{MicroTemplate, Renderer, RendererRegistry};
pub use role::{RoleApplicationOutcome, RoleTable};
pub use runtime::{Xooie, XooieBuilder};
pub use widget::{ElementRef, WeakWidget, Widget, WidgetClass};

pub use xooie_core;
pub use xooie_style;
