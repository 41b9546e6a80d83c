//! Dynamic stylesheet: rules added at runtime and mutated through handles.

use indexmap::IndexMap;
use parking_lot::RwLock;
use xooie_core::{Document, NodeId};

use crate::parser::parse_selector_list;
use crate::rules::{normalize_property_name, RuleHandle, StyleRule};
use crate::selector::SelectorMatcher;
use crate::{Error, Result};

/// A stylesheet whose rules are keyed by normalized selector text.
///
/// Adding a rule for a selector that already has one merges the new
/// declarations into the existing rule and returns the same handle.
#[derive(Debug, Default)]
pub struct StyleSheet {
    rules: RwLock<IndexMap<String, RuleHandle>>,
}

impl StyleSheet {
    /// Create an empty stylesheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or merge into) the rule for `selector`.
    ///
    /// # Example
    ///
    /// ```
    /// use xooie_style::StyleSheet;
    ///
    /// let sheet = StyleSheet::new();
    /// let rule = sheet.add_rule(".xooie-1 .content", [("height", "200px")]).unwrap();
    /// rule.set_property("height", "240px");
    /// assert_eq!(sheet.to_css(), ".xooie-1 .content { height: 240px; }");
    /// ```
    pub fn add_rule<I, K, V>(&self, selector: &str, properties: I) -> Result<RuleHandle>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let parsed = parse_selector_list(selector)?;
        let key = parsed.to_string();

        let mut declarations = Vec::new();
        for (name, value) in properties {
            let name = normalize_property_name(name.as_ref());
            if name.is_empty() {
                return Err(Error::invalid_value(name, "Empty property name"));
            }
            declarations.push((name, value.into()));
        }

        let handle = {
            let mut rules = self.rules.write();
            let order = rules.len() as u32;
            rules
                .entry(key.clone())
                .or_insert_with(|| RuleHandle::new(StyleRule::new(parsed, order)))
                .clone()
        };
        for (name, value) in declarations {
            handle.set_property(&name, value);
        }

        tracing::debug!(target: "xooie_style::rules", selector = %key, "added style rule");
        Ok(handle)
    }

    /// Look up the rule for `selector`. Invalid or unknown selectors give `None`.
    pub fn get_rule(&self, selector: &str) -> Option<RuleHandle> {
        let key = parse_selector_list(selector).ok()?.to_string();
        self.rules.read().get(&key).cloned()
    }

    /// Remove the rule for `selector`.
    pub fn remove_rule(&self, selector: &str) -> Option<RuleHandle> {
        let key = parse_selector_list(selector).ok()?.to_string();
        self.rules.write().shift_remove(&key)
    }

    /// All rules in insertion order.
    pub fn rules(&self) -> Vec<RuleHandle> {
        self.rules.read().values().cloned().collect()
    }

    /// Get the number of rules.
    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    /// Check if the stylesheet is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    /// Serialize every rule, one per line.
    pub fn to_css(&self) -> String {
        self.rules
            .read()
            .values()
            .map(RuleHandle::to_css)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Cascade the declarations of every rule matching `node`.
    ///
    /// Rules apply in ascending specificity, then source order, so the most
    /// specific and latest declaration wins.
    pub fn computed_style(&self, doc: &Document, node: NodeId) -> IndexMap<String, String> {
        let mut matching: Vec<(_, IndexMap<String, String>)> = self
            .rules()
            .iter()
            .filter_map(|handle| {
                handle.with_rule(|rule| {
                    SelectorMatcher::matches(doc, node, &rule.selector)
                        .then(|| (rule.specificity_with_order(), rule.properties.clone()))
                })
            })
            .collect();
        matching.sort_by_key(|(key, _)| *key);

        let mut computed = IndexMap::new();
        for (_, properties) in matching {
            for (name, value) in properties {
                computed.insert(name, value);
            }
        }
        computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get_rule() {
        let sheet = StyleSheet::new();
        assert!(sheet.is_empty());
        assert!(sheet.get_rule(".missing").is_none());

        let rule = sheet.add_rule("div  >  .content", [("height", "10px")]).unwrap();
        assert_eq!(rule.selector_text(), "div > .content");

        // Lookup normalizes whitespace.
        let found = sheet.get_rule("div>.content").unwrap();
        assert!(found.ptr_eq(&rule));
        assert_eq!(sheet.len(), 1);
    }

    #[test]
    fn repeated_add_merges() {
        let sheet = StyleSheet::new();
        let first = sheet.add_rule(".a", [("color", "red")]).unwrap();
        let second = sheet.add_rule(".a", [("color", "blue"), ("marginTop", "1px")]).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.to_css(), ".a { color: blue; margin-top: 1px; }");
    }

    #[test]
    fn invalid_selector_is_error() {
        let sheet = StyleSheet::new();
        let empty: [(&str, &str); 0] = [];
        assert!(matches!(
            sheet.add_rule("> .a", empty),
            Err(Error::InvalidSelector { .. })
        ));
        assert!(sheet.get_rule("> .a").is_none());
    }

    #[test]
    fn remove_rule() {
        let sheet = StyleSheet::new();
        sheet.add_rule(".a", [("color", "red")]).unwrap();
        sheet.add_rule(".b", [("color", "red")]).unwrap();
        assert!(sheet.remove_rule(".a").is_some());
        assert!(sheet.remove_rule(".a").is_none());
        assert_eq!(sheet.rules().len(), 1);
    }

    #[test]
    fn computed_style_cascades() {
        let doc = Document::new();
        let node = doc.create_element("div");
        doc.set_attribute(node, "id", "main").unwrap();
        doc.add_class(node, "panel").unwrap();
        doc.append_child(doc.body(), node).unwrap();

        let sheet = StyleSheet::new();
        sheet.add_rule("#main", [("color", "red")]).unwrap();
        sheet.add_rule(".panel", [("color", "blue"), ("height", "1px")]).unwrap();
        sheet.add_rule("div", [("height", "2px"), ("width", "3px")]).unwrap();
        sheet.add_rule("span", [("width", "4px")]).unwrap();

        let computed = sheet.computed_style(&doc, node);
        assert_eq!(computed["color"], "red");
        assert_eq!(computed["height"], "1px");
        assert_eq!(computed["width"], "3px");
    }
}
