//! Selector matching against a document tree.
//!
//! Matching walks each selector from right to left: the subject part is
//! tested against the candidate element, then each combinator moves to the
//! parent, an ancestor, or a preceding sibling. Descendant and general-sibling
//! combinators backtrack, so `div > p span` is matched exactly.

use xooie_core::{Document, NodeId, NodeTree};

use super::{Combinator, PseudoClass, Selector, SelectorList, SelectorPart, TypeSelector};

/// Position of an element among its parent's element children.
#[derive(Debug, Clone, Copy)]
pub struct SiblingInfo {
    /// Zero-based index among element siblings.
    pub index: usize,
    /// Total number of element siblings (including self).
    pub count: usize,
}

impl SiblingInfo {
    /// Compute sibling information for an element, if it has a parent.
    pub fn of(tree: &NodeTree, node: NodeId) -> Option<Self> {
        let parent = tree.parent(node)?;
        let siblings: Vec<NodeId> = element_children(tree, parent).collect();
        let index = siblings.iter().position(|&s| s == node)?;
        Some(Self {
            index,
            count: siblings.len(),
        })
    }

    /// Returns true if this is the first sibling.
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// Returns true if this is the last sibling.
    pub fn is_last(&self) -> bool {
        self.index + 1 == self.count
    }

    /// Returns true if this is the only child.
    pub fn is_only(&self) -> bool {
        self.count == 1
    }
}

fn element_children(tree: &NodeTree, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    tree.children(parent)
        .iter()
        .copied()
        .filter(move |&child| tree.is_element(child))
}

fn preceding_element_siblings(tree: &NodeTree, node: NodeId) -> Vec<NodeId> {
    let Some(parent) = tree.parent(node) else {
        return Vec::new();
    };
    let mut result: Vec<NodeId> = element_children(tree, parent)
        .take_while(|&sibling| sibling != node)
        .collect();
    // Nearest first.
    result.reverse();
    result
}

/// Selector matching engine.
pub struct SelectorMatcher;

impl SelectorMatcher {
    /// Check whether `node` matches any selector in `list`.
    pub fn matches(doc: &Document, node: NodeId, list: &SelectorList) -> bool {
        doc.with_read(|tree| Self::matches_in(tree, node, list))
    }

    /// [`SelectorMatcher::matches`] against an already locked tree.
    pub fn matches_in(tree: &NodeTree, node: NodeId, list: &SelectorList) -> bool {
        list.iter().any(|selector| Self::selector_matches(tree, node, selector))
    }

    /// All descendants of `scope` (excluding `scope`) matching `list`, in document order.
    #[tracing::instrument(skip(doc, list), target = "xooie_style::selector", level = "trace")]
    pub fn query_all(doc: &Document, scope: NodeId, list: &SelectorList) -> Vec<NodeId> {
        doc.with_read(|tree| {
            tree.descendants(scope)
                .into_iter()
                .filter(|&node| Self::matches_in(tree, node, list))
                .collect()
        })
    }

    /// The first descendant of `scope` matching `list`, in document order.
    pub fn query_first(doc: &Document, scope: NodeId, list: &SelectorList) -> Option<NodeId> {
        doc.with_read(|tree| {
            tree.descendants(scope)
                .into_iter()
                .find(|&node| Self::matches_in(tree, node, list))
        })
    }

    /// Check whether a single complex selector matches `node`.
    pub fn selector_matches(tree: &NodeTree, node: NodeId, selector: &Selector) -> bool {
        match selector.parts.len() {
            0 => false,
            len => Self::matches_from(tree, node, selector, len - 1),
        }
    }

    fn matches_from(tree: &NodeTree, node: NodeId, selector: &Selector, index: usize) -> bool {
        if !Self::part_matches(tree, node, &selector.parts[index]) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match selector.combinators[index - 1] {
            Combinator::Child => tree
                .parent(node)
                .is_some_and(|parent| Self::matches_from(tree, parent, selector, index - 1)),
            Combinator::Descendant => {
                let mut current = tree.parent(node);
                while let Some(ancestor) = current {
                    if Self::matches_from(tree, ancestor, selector, index - 1) {
                        return true;
                    }
                    current = tree.parent(ancestor);
                }
                false
            }
            Combinator::AdjacentSibling => preceding_element_siblings(tree, node)
                .first()
                .is_some_and(|&prev| Self::matches_from(tree, prev, selector, index - 1)),
            Combinator::GeneralSibling => preceding_element_siblings(tree, node)
                .into_iter()
                .any(|prev| Self::matches_from(tree, prev, selector, index - 1)),
        }
    }

    /// Check if a compound selector part matches an element.
    pub fn part_matches(tree: &NodeTree, node: NodeId, part: &SelectorPart) -> bool {
        let Some(tag) = tree.tag_name(node) else {
            return false;
        };

        if let Some(TypeSelector::Tag(name)) = &part.type_selector {
            if !name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &part.id {
            if tree.attribute(node, "id") != Some(id.as_str()) {
                return false;
            }
        }

        // All classes must be present.
        for class in &part.classes {
            if !tree.classes(node).any(|c| c == class) {
                return false;
            }
        }

        for attribute in &part.attributes {
            if !attribute.matches(tree.attribute(node, &attribute.name)) {
                return false;
            }
        }

        part.pseudo_classes
            .iter()
            .all(|pseudo| Self::pseudo_matches(tree, node, pseudo))
    }

    fn pseudo_matches(tree: &NodeTree, node: NodeId, pseudo: &PseudoClass) -> bool {
        match pseudo {
            PseudoClass::FirstChild => SiblingInfo::of(tree, node).is_some_and(|s| s.is_first()),
            PseudoClass::LastChild => SiblingInfo::of(tree, node).is_some_and(|s| s.is_last()),
            PseudoClass::OnlyChild => SiblingInfo::of(tree, node).is_some_and(|s| s.is_only()),
            PseudoClass::NthChild(expr) => {
                SiblingInfo::of(tree, node).is_some_and(|s| expr.matches(s.index))
            }
            PseudoClass::Empty => tree.children(node).is_empty(),
            PseudoClass::Not(inner) => !Self::part_matches(tree, node, inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::{AttributeSelector, NthExpr};

    /// body > div#tabs.widget > (ul > li*3) + section[data-x-role=content]
    fn fixture() -> (Document, NodeId, Vec<NodeId>, NodeId) {
        let doc = Document::new();
        let root = doc.create_element("div");
        doc.set_attribute(root, "id", "tabs").unwrap();
        doc.add_class(root, "widget").unwrap();
        doc.append_child(doc.body(), root).unwrap();

        let list = doc.create_element("ul");
        doc.append_child(root, list).unwrap();
        let items: Vec<NodeId> = (0..3)
            .map(|i| {
                let li = doc.create_element("li");
                doc.set_attribute(li, "data-x-role", "tab").unwrap();
                if i == 1 {
                    doc.add_class(li, "active").unwrap();
                }
                doc.append_child(list, li).unwrap();
                li
            })
            .collect();

        let content = doc.create_element("section");
        doc.set_attribute(content, "data-x-role", "content").unwrap();
        doc.append_child(root, content).unwrap();

        (doc, root, items, content)
    }

    fn list(selector: Selector) -> SelectorList {
        SelectorList::single(selector)
    }

    #[test]
    fn compound_parts_match() {
        let (doc, root, items, _) = fixture();
        assert!(SelectorMatcher::matches(&doc, root, &list(Selector::id("tabs"))));
        assert!(SelectorMatcher::matches(&doc, root, &list(Selector::class("widget"))));
        assert!(SelectorMatcher::matches(&doc, items[1], &list(Selector::tag("LI"))));
        assert!(!SelectorMatcher::matches(&doc, items[0], &list(Selector::class("active"))));
        assert!(SelectorMatcher::matches(
            &doc,
            items[0],
            &list(Selector::attribute_equals("data-x-role", "tab"))
        ));
    }

    #[test]
    fn combinators_match() {
        let (doc, _, items, content) = fixture();
        let child = Selector::tag("ul").child(SelectorPart::tag_only("li"));
        assert!(SelectorMatcher::matches(&doc, items[0], &list(child)));

        let descendant = Selector::id("tabs").descendant(SelectorPart::tag_only("li"));
        assert!(SelectorMatcher::matches(&doc, items[2], &list(descendant)));

        let not_child = Selector::id("tabs").child(SelectorPart::tag_only("li"));
        assert!(!SelectorMatcher::matches(&doc, items[2], &list(not_child)));

        let adjacent = Selector {
            parts: vec![SelectorPart::tag_only("ul"), SelectorPart::tag_only("section")],
            combinators: vec![Combinator::AdjacentSibling],
        };
        assert!(SelectorMatcher::matches(&doc, content, &list(adjacent)));

        let general = Selector {
            parts: vec![SelectorPart::class_only("active"), SelectorPart::tag_only("li")],
            combinators: vec![Combinator::GeneralSibling],
        };
        assert!(SelectorMatcher::matches(&doc, items[2], &list(general.clone())));
        assert!(!SelectorMatcher::matches(&doc, items[0], &list(general)));
    }

    #[test]
    fn descendant_backtracks() {
        // div > ul li
        let (doc, _, items, _) = fixture();
        let selector = Selector::tag("div")
            .child(SelectorPart::tag_only("ul"))
            .descendant(SelectorPart::tag_only("li"));
        assert!(SelectorMatcher::matches(&doc, items[0], &list(selector)));
    }

    #[test]
    fn structural_pseudo_classes() {
        let (doc, _, items, content) = fixture();
        let first = list(Selector::compound(SelectorPart::tag_only("li").with_pseudo(PseudoClass::FirstChild)));
        assert!(SelectorMatcher::matches(&doc, items[0], &first));
        assert!(!SelectorMatcher::matches(&doc, items[1], &first));

        let nth = list(Selector::compound(
            SelectorPart::new().with_pseudo(PseudoClass::NthChild(NthExpr::even())),
        ));
        assert!(SelectorMatcher::matches(&doc, items[1], &nth));

        let empty = list(Selector::compound(SelectorPart::new().with_pseudo(PseudoClass::Empty)));
        assert!(SelectorMatcher::matches(&doc, content, &empty));

        let not_active = list(Selector::compound(
            SelectorPart::tag_only("li")
                .with_pseudo(PseudoClass::Not(Box::new(SelectorPart::class_only("active")))),
        ));
        assert!(SelectorMatcher::matches(&doc, items[0], &not_active));
        assert!(!SelectorMatcher::matches(&doc, items[1], &not_active));
    }

    #[test]
    fn query_all_in_document_order() {
        let (doc, root, items, content) = fixture();
        let roles = list(Selector::compound(
            SelectorPart::new().with_attribute(AttributeSelector::exists("data-x-role")),
        ));
        let mut expected = items.clone();
        expected.push(content);
        assert_eq!(SelectorMatcher::query_all(&doc, root, &roles), expected);
        assert_eq!(SelectorMatcher::query_first(&doc, root, &roles), Some(items[0]));

        // The scope itself never matches.
        assert!(SelectorMatcher::query_all(&doc, root, &list(Selector::id("tabs"))).is_empty());
    }

    #[test]
    fn text_nodes_never_match() {
        let doc = Document::new();
        let text = doc.create_text("hello");
        doc.append_child(doc.body(), text).unwrap();
        assert!(!SelectorMatcher::matches(&doc, text, &list(Selector::universal())));
    }
}
