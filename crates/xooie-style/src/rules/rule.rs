//! Single style rule definition.

use std::fmt::Write as _;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::selector::{SelectorList, Specificity, SpecificityWithOrder};

/// A style rule mapping a selector to declarations.
///
/// Each rule has:
/// - A selector that determines which elements it applies to
/// - Declarations in insertion order
/// - Pre-computed specificity for cascading
/// - Source order for tie-breaking
#[derive(Debug, Clone)]
pub struct StyleRule {
    /// The selector for matching elements.
    pub selector: SelectorList,
    /// Declarations keyed by kebab-case property name.
    pub properties: IndexMap<String, String>,
    /// Pre-computed specificity (highest of the group's selectors).
    pub specificity: Specificity,
    /// Source order (for tie-breaking when specificity is equal).
    pub order: u32,
}

impl StyleRule {
    /// Create a new style rule.
    pub fn new(selector: SelectorList, order: u32) -> Self {
        let specificity = selector
            .iter()
            .map(Specificity::of_selector)
            .max()
            .unwrap_or_default();
        Self {
            selector,
            properties: IndexMap::new(),
            specificity,
            order,
        }
    }

    /// Get the specificity with source order for comparison.
    pub fn specificity_with_order(&self) -> SpecificityWithOrder {
        self.specificity.with_order(self.order)
    }

    /// Serialize as `selector { name: value; ... }`.
    pub fn to_css(&self) -> String {
        let mut css = format!("{} {{", self.selector);
        for (name, value) in &self.properties {
            write!(css, " {name}: {value};").expect("write to String");
        }
        css.push_str(" }");
        css
    }
}

/// Convert a script-style property name (`maxHeight`) to CSS form (`max-height`).
pub fn normalize_property_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.trim().chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Shared handle to a rule inside a [`StyleSheet`](super::StyleSheet).
///
/// Mutations through the handle are visible to the owning stylesheet, the
/// way assigning `rule.style.height` updates a live CSSOM rule.
#[derive(Debug, Clone)]
pub struct RuleHandle {
    inner: Arc<RwLock<StyleRule>>,
}

impl RuleHandle {
    pub(crate) fn new(rule: StyleRule) -> Self {
        Self {
            inner: Arc::new(RwLock::new(rule)),
        }
    }

    /// The rule's selector text.
    pub fn selector_text(&self) -> String {
        self.inner.read().selector.to_string()
    }

    /// Get a declaration value.
    pub fn property(&self, name: &str) -> Option<String> {
        self.inner
            .read()
            .properties
            .get(&normalize_property_name(name))
            .cloned()
    }

    /// Set a declaration value, appending it if new.
    pub fn set_property(&self, name: &str, value: impl Into<String>) {
        let name = normalize_property_name(name);
        let value = value.into();
        tracing::trace!(target: "xooie_style::rules", property = %name, %value, "set rule property");
        self.inner.write().properties.insert(name, value);
    }

    /// Remove a declaration, returning its old value.
    pub fn remove_property(&self, name: &str) -> Option<String> {
        self.inner
            .write()
            .properties
            .shift_remove(&normalize_property_name(name))
    }

    /// Snapshot of the declarations in order.
    pub fn properties(&self) -> IndexMap<String, String> {
        self.inner.read().properties.clone()
    }

    /// Serialize the rule as CSS text.
    pub fn to_css(&self) -> String {
        self.inner.read().to_css()
    }

    /// Check whether two handles refer to the same rule.
    pub fn ptr_eq(&self, other: &RuleHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn with_rule<R>(&self, f: impl FnOnce(&StyleRule) -> R) -> R {
        f(&self.inner.read())
    }
}
