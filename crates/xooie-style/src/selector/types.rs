//! Selector type definitions.

use std::fmt;

/// A comma-separated group of selectors (e.g. `.tab, [data-x-role="content"]`).
///
/// A node matches the list when it matches any of its selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorList(pub Vec<Selector>);

impl SelectorList {
    /// Wrap a single selector.
    pub fn single(selector: Selector) -> Self {
        Self(vec![selector])
    }

    /// Iterate over the selectors in the group.
    pub fn iter(&self) -> impl Iterator<Item = &Selector> {
        self.0.iter()
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selector) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", selector)?;
        }
        Ok(())
    }
}

/// A complex selector (e.g., "ul.tabs > li[data-x-role=tab]").
///
/// A selector consists of one or more compound parts connected by combinators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    /// Chain of selector parts, leftmost first.
    pub parts: Vec<SelectorPart>,
    /// Combinators between parts (length = parts.len() - 1).
    pub combinators: Vec<Combinator>,
}

impl Selector {
    /// Create a simple tag selector.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::compound(SelectorPart::tag_only(tag))
    }

    /// Create a universal selector (*).
    pub fn universal() -> Self {
        Self::compound(SelectorPart::universal())
    }

    /// Create a class selector.
    pub fn class(class_name: impl Into<String>) -> Self {
        Self::compound(SelectorPart::class_only(class_name))
    }

    /// Create an ID selector.
    pub fn id(id: impl Into<String>) -> Self {
        Self::compound(SelectorPart::id_only(id))
    }

    /// Create an `[name="value"]` selector.
    pub fn attribute_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compound(SelectorPart::new().with_attribute(AttributeSelector::equals(name, value)))
    }

    /// Create a selector from a single compound part.
    pub fn compound(part: SelectorPart) -> Self {
        Self {
            parts: vec![part],
            combinators: vec![],
        }
    }

    /// Add a descendant selector part.
    pub fn descendant(self, part: SelectorPart) -> Self {
        self.combine(Combinator::Descendant, part)
    }

    /// Add a child selector part.
    pub fn child(self, part: SelectorPart) -> Self {
        self.combine(Combinator::Child, part)
    }

    fn combine(mut self, combinator: Combinator, part: SelectorPart) -> Self {
        if !self.parts.is_empty() {
            self.combinators.push(combinator);
        }
        self.parts.push(part);
        self
    }

    /// Get the rightmost (subject) selector part.
    pub fn subject(&self) -> Option<&SelectorPart> {
        self.parts.last()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                match &self.combinators[i - 1] {
                    Combinator::Descendant => write!(f, " ")?,
                    Combinator::Child => write!(f, " > ")?,
                    Combinator::AdjacentSibling => write!(f, " + ")?,
                    Combinator::GeneralSibling => write!(f, " ~ ")?,
                }
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// A compound selector (e.g., "li.active[data-x-role]").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SelectorPart {
    /// Tag name or universal.
    pub type_selector: Option<TypeSelector>,
    /// ID selector (#id).
    pub id: Option<String>,
    /// Class selectors (.class).
    pub classes: Vec<String>,
    /// Attribute selectors ([name], [name=value], ...).
    pub attributes: Vec<AttributeSelector>,
    /// Structural pseudo-classes (:first-child, :not(..), ...).
    pub pseudo_classes: Vec<PseudoClass>,
}

impl SelectorPart {
    /// Create a new empty selector part.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tag-only selector.
    pub fn tag_only(tag: impl Into<String>) -> Self {
        Self {
            type_selector: Some(TypeSelector::Tag(tag.into().to_ascii_lowercase())),
            ..Default::default()
        }
    }

    /// Create a universal selector part.
    pub fn universal() -> Self {
        Self {
            type_selector: Some(TypeSelector::Universal),
            ..Default::default()
        }
    }

    /// Create a class-only selector.
    pub fn class_only(class_name: impl Into<String>) -> Self {
        Self {
            classes: vec![class_name.into()],
            ..Default::default()
        }
    }

    /// Create an ID-only selector.
    pub fn id_only(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Add a class selector.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Add an attribute selector.
    pub fn with_attribute(mut self, attribute: AttributeSelector) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add a pseudo-class selector.
    pub fn with_pseudo(mut self, pseudo: PseudoClass) -> Self {
        self.pseudo_classes.push(pseudo);
        self
    }

    /// Check if this part carries no constraint at all.
    pub fn is_empty(&self) -> bool {
        self.type_selector.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
            && self.pseudo_classes.is_empty()
    }
}

impl fmt::Display for SelectorPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_selector {
            Some(TypeSelector::Universal) => write!(f, "*")?,
            Some(TypeSelector::Tag(t)) => write!(f, "{}", t)?,
            None => {}
        }

        if let Some(id) = &self.id {
            write!(f, "#{}", id)?;
        }

        for class in &self.classes {
            write!(f, ".{}", class)?;
        }

        for attribute in &self.attributes {
            write!(f, "{}", attribute)?;
        }

        for pseudo in &self.pseudo_classes {
            write!(f, ":{}", pseudo)?;
        }

        Ok(())
    }
}

/// Type selector - matches the element's tag name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSelector {
    /// Universal selector (*) - matches any element.
    Universal,
    /// Lower-case tag name (e.g., "div", "li").
    Tag(String),
}

/// Combinator between selector parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Descendant combinator (space): matches any descendant.
    Descendant,
    /// Child combinator (>): matches direct child only.
    Child,
    /// Adjacent sibling (+): matches immediately following sibling.
    AdjacentSibling,
    /// General sibling (~): matches any following sibling.
    GeneralSibling,
}

/// An attribute test inside `[...]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeSelector {
    /// Attribute name.
    pub name: String,
    /// Operator and expected value; `None` tests presence only.
    pub test: Option<(AttrOperator, String)>,
}

impl AttributeSelector {
    /// `[name]`
    pub fn exists(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test: None,
        }
    }

    /// `[name="value"]`
    pub fn equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test: Some((AttrOperator::Equals, value.into())),
        }
    }

    /// Check an attribute value (`None` when absent) against this test.
    pub fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let Some((op, expected)) = &self.test else {
            return true;
        };
        match op {
            AttrOperator::Equals => actual == expected,
            AttrOperator::Includes => actual.split_ascii_whitespace().any(|w| w == expected),
            AttrOperator::DashMatch => {
                actual == expected
                    || actual
                        .strip_prefix(expected.as_str())
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            AttrOperator::Prefix => !expected.is_empty() && actual.starts_with(expected.as_str()),
            AttrOperator::Suffix => !expected.is_empty() && actual.ends_with(expected.as_str()),
            AttrOperator::Substring => !expected.is_empty() && actual.contains(expected.as_str()),
        }
    }
}

impl fmt::Display for AttributeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.test {
            None => write!(f, "[{}]", self.name),
            Some((op, value)) => write!(f, "[{}{}\"{}\"]", self.name, op, value),
        }
    }
}

/// Attribute comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrOperator {
    /// `=` exact match.
    Equals,
    /// `~=` whitespace-separated word match.
    Includes,
    /// `|=` exact or followed by `-`.
    DashMatch,
    /// `^=` prefix.
    Prefix,
    /// `$=` suffix.
    Suffix,
    /// `*=` substring.
    Substring,
}

impl fmt::Display for AttrOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttrOperator::Equals => "=",
            AttrOperator::Includes => "~=",
            AttrOperator::DashMatch => "|=",
            AttrOperator::Prefix => "^=",
            AttrOperator::Suffix => "$=",
            AttrOperator::Substring => "*=",
        })
    }
}

/// Structural pseudo-classes evaluated against the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PseudoClass {
    /// :first-child - first element among siblings.
    FirstChild,
    /// :last-child - last element among siblings.
    LastChild,
    /// :nth-child(n) - nth element among siblings.
    NthChild(NthExpr),
    /// :only-child - only element child of its parent.
    OnlyChild,
    /// :empty - has no child nodes.
    Empty,
    /// :not(compound) - negation.
    Not(Box<SelectorPart>),
}

impl fmt::Display for PseudoClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PseudoClass::FirstChild => write!(f, "first-child"),
            PseudoClass::LastChild => write!(f, "last-child"),
            PseudoClass::NthChild(expr) => write!(f, "nth-child({})", expr),
            PseudoClass::OnlyChild => write!(f, "only-child"),
            PseudoClass::Empty => write!(f, "empty"),
            PseudoClass::Not(inner) => write!(f, "not({})", inner),
        }
    }
}

impl PseudoClass {
    /// Parse an argument-less pseudo-class name.
    pub fn from_css(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first-child" => Some(Self::FirstChild),
            "last-child" => Some(Self::LastChild),
            "only-child" => Some(Self::OnlyChild),
            "empty" => Some(Self::Empty),
            _ => None,
        }
    }
}

/// Expression for :nth-child (An+B).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NthExpr {
    /// Coefficient (A in An+B).
    pub a: i32,
    /// Offset (B in An+B).
    pub b: i32,
}

impl NthExpr {
    /// Create a new nth expression.
    pub fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }

    /// Check if a 0-indexed position matches this expression.
    pub fn matches(&self, index: usize) -> bool {
        let n = index as i32 + 1;
        if self.a == 0 {
            n == self.b
        } else {
            let diff = n - self.b;
            diff % self.a == 0 && diff / self.a >= 0
        }
    }

    /// :nth-child(odd) = 2n+1.
    pub fn odd() -> Self {
        Self { a: 2, b: 1 }
    }

    /// :nth-child(even) = 2n.
    pub fn even() -> Self {
        Self { a: 2, b: 0 }
    }
}

impl fmt::Display for NthExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.a, self.b) {
            (2, 1) => write!(f, "odd"),
            (2, 0) => write!(f, "even"),
            (0, b) => write!(f, "{}", b),
            (a, 0) => write!(f, "{}n", a),
            (a, b) if b > 0 => write!(f, "{}n+{}", a, b),
            (a, b) => write!(f, "{}n{}", a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_display() {
        let sel = Selector::tag("ul")
            .descendant(SelectorPart::class_only("tab").with_pseudo(PseudoClass::FirstChild));
        assert_eq!(sel.to_string(), "ul .tab:first-child");

        let sel = Selector::tag("div").child(
            SelectorPart::new().with_attribute(AttributeSelector::equals("data-x-role", "content")),
        );
        assert_eq!(sel.to_string(), "div > [data-x-role=\"content\"]");
    }

    #[test]
    fn selector_list_display() {
        let list = SelectorList(vec![Selector::class("a"), Selector::id("b")]);
        assert_eq!(list.to_string(), ".a, #b");
    }

    #[test]
    fn attribute_operators() {
        let test = |op, expected: &str, actual| {
            AttributeSelector {
                name: "x".into(),
                test: Some((op, expected.to_string())),
            }
            .matches(Some(actual))
        };
        assert!(test(AttrOperator::Equals, "tab", "tab"));
        assert!(test(AttrOperator::Includes, "b", "a b c"));
        assert!(!test(AttrOperator::Includes, "b", "abc"));
        assert!(test(AttrOperator::DashMatch, "en", "en-US"));
        assert!(!test(AttrOperator::DashMatch, "en", "english"));
        assert!(test(AttrOperator::Prefix, "xooie", "xooie-3"));
        assert!(test(AttrOperator::Suffix, "-addon", "has-foo-addon"));
        assert!(test(AttrOperator::Substring, "foo", "has-foo-addon"));
        assert!(!test(AttrOperator::Prefix, "", "anything"));

        assert!(AttributeSelector::exists("x").matches(Some("")));
        assert!(!AttributeSelector::exists("x").matches(None));
    }

    #[test]
    fn nth_expr_matches() {
        let expr = NthExpr::new(0, 3);
        assert!(!expr.matches(1));
        assert!(expr.matches(2));

        let expr = NthExpr::odd();
        assert!(expr.matches(0));
        assert!(!expr.matches(1));
        assert!(expr.matches(2));

        let expr = NthExpr::even();
        assert!(!expr.matches(0));
        assert!(expr.matches(1));

        // -n+2 selects the first two.
        let expr = NthExpr::new(-1, 2);
        assert!(expr.matches(0));
        assert!(expr.matches(1));
        assert!(!expr.matches(2));
    }
}
