//! Selectors and dynamic stylesheets for Xooie.
//!
//! This crate provides the two DOM-facing services the widget framework
//! leans on besides the document itself:
//!
//! - **Selectors**: Tag, class, ID, attribute, structural pseudo-class and
//!   combinator selectors, parsed with `cssparser`
//! - **Matching**: Right-to-left matching and scoped queries against a
//!   [`xooie_core::Document`]
//! - **Stylesheet**: Rules added at runtime, mutated through shared handles
//!   and cascaded by specificity
//!
//! # Example
//!
//! ```
//! use xooie_core::Document;
//! use xooie_style::prelude::*;
//!
//! let doc = Document::new();
//! let root = doc.create_element("div");
//! let panel = doc.create_element("section");
//! doc.set_attribute(panel, "data-x-role", "content").unwrap();
//! doc.append_child(root, panel).unwrap();
//!
//! let roles: SelectorList = r#"[data-x-role="content"]"#.parse().unwrap();
//! assert_eq!(SelectorMatcher::query_all(&doc, root, &roles), vec![panel]);
//! ```

pub mod parser;
pub mod rules;
pub mod selector;

mod error;

pub use error::{Error, Result};
pub use parser::parse_selector_list;
pub use rules::{RuleHandle, StyleRule, StyleSheet};
pub use selector::{Selector, SelectorList, SelectorMatcher};

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::parser::parse_selector_list;
    pub use crate::rules::{RuleHandle, StyleRule, StyleSheet};
    pub use crate::selector::{
        AttrOperator, AttributeSelector, Combinator, PseudoClass, Selector, SelectorList,
        SelectorMatcher, SelectorPart, Specificity,
    };
}
