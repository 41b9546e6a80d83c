//! Template rendering backends.
//!
//! Widgets render markup through a [`Renderer`] chosen by their
//! `templateLanguage` property. Renderers are registered by language name on
//! the runtime's [`RendererRegistry`]; the built-in [`MicroTemplate`] is
//! always available under `micro_template`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use xooie_core::logging::targets;
use xooie_core::{Document, NodeId, NodeKind};

use crate::config::DEFAULT_TEMPLATE_LANGUAGE;
use crate::error::RenderError;

/// Class of the placeholder produced when rendering fails.
pub const RENDER_ERROR_CLASS: &str = "xooie-render-error";

/// A template engine producing detached nodes.
pub trait Renderer: Send + Sync {
    /// Instantiate `template` with `view`, returning the new top-level nodes.
    ///
    /// The returned nodes are detached; the caller decides where they go.
    fn render(&self, doc: &Document, template: NodeId, view: &Value) -> Result<Vec<NodeId>, RenderError>;
}

/// Minimal `{{path}}` substitution over a template element's children.
///
/// Each child of the template is copied; text and attribute values have every
/// `{{ key }}` or `{{ a.b }}` replaced with the value at that path in the
/// view. Strings are inserted verbatim, other scalars in their JSON form, and
/// missing or null values as the empty string.
///
/// ```
/// use serde_json::json;
/// use xooie::render::{MicroTemplate, Renderer};
/// use xooie_core::Document;
///
/// let doc = Document::new();
/// let template = doc.create_element("template");
/// let item = doc.create_element("li");
/// doc.set_attribute(item, "title", "{{ user.name }}").unwrap();
/// doc.append_child(template, item).unwrap();
/// doc.append_child(item, doc.create_text("Hi {{user.name}}")).unwrap();
///
/// let nodes = MicroTemplate.render(&doc, template, &json!({"user": {"name": "Ada"}})).unwrap();
/// assert_eq!(doc.attribute(nodes[0], "title").as_deref(), Some("Ada"));
/// assert_eq!(doc.text_content(nodes[0]), "Hi Ada");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroTemplate;

impl Renderer for MicroTemplate {
    fn render(&self, doc: &Document, template: NodeId, view: &Value) -> Result<Vec<NodeId>, RenderError> {
        if !doc.is_element(template) {
            return Err(RenderError::InvalidTemplate);
        }
        doc.children(template)
            .into_iter()
            .map(|child| instantiate(doc, child, view))
            .collect()
    }
}

fn instantiate(doc: &Document, source: NodeId, view: &Value) -> Result<NodeId, RenderError> {
    let kind = doc
        .with_read(|tree| tree.kind(source).cloned())
        .ok_or(RenderError::InvalidTemplate)?;
    match kind {
        NodeKind::Text(text) => Ok(doc.create_text(&substitute(&text, view)?)),
        NodeKind::Element { tag, attributes } => {
            let node = doc.create_element(&tag);
            for (name, value) in attributes {
                doc.set_attribute(node, &name, substitute(&value, view)?)
                    .map_err(|err| RenderError::Template(err.to_string()))?;
            }
            for child in doc.children(source) {
                let copy = instantiate(doc, child, view)?;
                doc.append_child(node, copy)
                    .map_err(|err| RenderError::Template(err.to_string()))?;
            }
            Ok(node)
        }
    }
}

/// Replace every `{{path}}` in `source` with its value in `view`.
pub fn substitute(source: &str, view: &Value) -> Result<String, RenderError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| RenderError::Template(format!("unterminated tag in '{source}'")))?;
        let path = after[..end].trim();
        if path.is_empty() {
            return Err(RenderError::Template(format!("empty tag in '{source}'")));
        }
        out.push_str(&lookup(view, path));
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn lookup(view: &Value, path: &str) -> String {
    let mut current = view;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return String::new(),
        }
    }
    match current {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renderers keyed by template language name.
pub struct RendererRegistry {
    renderers: RwLock<IndexMap<String, Arc<dyn Renderer>>>,
}

impl RendererRegistry {
    /// A registry holding only the built-in [`MicroTemplate`].
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register(DEFAULT_TEMPLATE_LANGUAGE, MicroTemplate);
        registry
    }

    /// A registry with no renderers.
    pub fn empty() -> Self {
        Self {
            renderers: RwLock::new(IndexMap::new()),
        }
    }

    /// Register (or replace) the renderer for `language`.
    pub fn register(&self, language: &str, renderer: impl Renderer + 'static) {
        tracing::debug!(target: targets::RENDER, language, "registered renderer");
        self.renderers
            .write()
            .insert(language.to_string(), Arc::new(renderer));
    }

    /// The renderer for `language`.
    pub fn get(&self, language: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers.read().get(language).cloned()
    }

    /// Registered language names.
    pub fn languages(&self) -> Vec<String> {
        self.renderers.read().keys().cloned().collect()
    }

    /// Render with `language`, reporting an unknown language as an error.
    pub fn render(
        &self,
        language: &str,
        doc: &Document,
        template: NodeId,
        view: &Value,
    ) -> Result<Vec<NodeId>, RenderError> {
        let renderer = self
            .get(language)
            .ok_or_else(|| RenderError::UnknownLanguage(language.to_string()))?;
        renderer.render(doc, template, view)
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

/// A detached `<span class="xooie-render-error">` describing `message`.
pub(crate) fn error_placeholder(doc: &Document, message: &str) -> NodeId {
    let span = doc.create_element("span");
    // A freshly created element accepts both writes.
    let _ = doc.add_class(span, RENDER_ERROR_CLASS);
    let _ = doc.set_text(span, message);
    span
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitute_paths() {
        let view = json!({"name": "tabs", "count": 3, "items": ["a", "b"], "none": null});
        assert_eq!(substitute("{{name}}: {{ count }}", &view).unwrap(), "tabs: 3");
        assert_eq!(substitute("{{items.1}}", &view).unwrap(), "b");
        assert_eq!(substitute("[{{none}}][{{missing.x}}]", &view).unwrap(), "[][]");
        assert_eq!(substitute("plain", &view).unwrap(), "plain");
    }

    #[test]
    fn substitute_errors() {
        assert!(matches!(substitute("{{name", &json!({})), Err(RenderError::Template(_))));
        assert!(matches!(substitute("{{ }}", &json!({})), Err(RenderError::Template(_))));
    }

    #[test]
    fn micro_template_copies_children() {
        let doc = Document::new();
        let template = doc.create_element("template");
        let item = doc.create_element("li");
        doc.add_class(item, "item-{{id}}").unwrap();
        doc.append_child(template, item).unwrap();
        doc.append_child(template, doc.create_text("{{label}}")).unwrap();

        let nodes = MicroTemplate
            .render(&doc, template, &json!({"id": 4, "label": "four"}))
            .unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(doc.has_class(nodes[0], "item-4"));
        assert_eq!(doc.text_content(nodes[1]), "four");
        assert!(doc.parent(nodes[0]).is_none());
        // The template is untouched.
        assert!(doc.has_class(item, "item-{{id}}"));
    }

    #[test]
    fn registry_lookup() {
        let registry = RendererRegistry::new();
        assert_eq!(registry.languages(), vec![DEFAULT_TEMPLATE_LANGUAGE]);
        let doc = Document::new();
        let template = doc.create_element("template");
        assert!(matches!(
            registry.render("jsrender", &doc, template, &Value::Null),
            Err(RenderError::UnknownLanguage(_))
        ));
        assert!(RendererRegistry::empty().get(DEFAULT_TEMPLATE_LANGUAGE).is_none());
    }

    #[test]
    fn placeholder_is_marked() {
        let doc = Document::new();
        let span = error_placeholder(&doc, "no renderer");
        assert!(doc.has_class(span, RENDER_ERROR_CLASS));
        assert_eq!(doc.text_content(span), "no renderer");
    }
}
