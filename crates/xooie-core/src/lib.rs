//! Core systems for Xooie.
//!
//! This crate provides the substrate the Xooie widget framework runs on:
//!
//! - **Document**: An arena-backed DOM with attributes, classes and `data-*` coercion
//! - **Events**: jQuery-style namespaced custom events bound to nodes
//! - **Task Queue**: Deferred work processed one event-loop turn at a time
//! - **Timers**: One-shot and repeating timers driven by an explicit clock
//! - **Logging**: Target names and a document tree visualizer
//!
//! # Example
//!
//! ```
//! use xooie_core::{Document, TaskQueue};
//! use serde_json::json;
//!
//! let doc = Document::new();
//! let root = doc.create_element("div");
//! doc.set_attribute(root, "data-start-index", "2").unwrap();
//! doc.append_child(doc.body(), root).unwrap();
//! assert_eq!(doc.dataset(root)["startIndex"], json!(2));
//!
//! let queue = TaskQueue::new();
//! queue.post(|| println!("runs on the next turn"));
//! assert_eq!(queue.run_turn(), 1);
//! ```

pub mod dom;
mod error;
pub mod event;
pub mod logging;
mod task;
mod timer;

pub use dom::{camel_case, coerce_data_value, Document, NodeId, NodeKind, NodeTree};
pub use error::{CoreError, DomError, DomResult, Result, TaskError, TimerError};
pub use event::{DomEvent, EventName, ListenerId};
pub use logging::{DocumentTreeDebug, TreeFormatOptions, TreeStyle};
pub use task::{TaskId, TaskQueue};
pub use timer::{TimerId, TimerKind, TimerManager};
