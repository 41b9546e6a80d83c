//! Named structural roles inside a widget's markup.
//!
//! A role names a set of elements under the widget root, found by default
//! through the `data-x-role` attribute. On every init and refresh the
//! widget walks its roles in declaration order: it fetches each role's
//! elements, renders them when absent and a renderer exists, assigns
//! generated ids, and hands the set to the role's processor. A role that
//! still has no elements ends the pass.
//!
//! ```
//! use xooie::prelude::*;
//!
//! let xooie = Xooie::new();
//! let doc = xooie.document();
//! let root = doc.create_element("div");
//! let tab = doc.create_element("button");
//! doc.set_attribute(tab, "data-x-role", "tab").unwrap();
//! doc.append_child(root, tab).unwrap();
//! doc.append_child(doc.body(), root).unwrap();
//!
//! let mut class = WidgetClass::new("tabs");
//! class.define_role("tab", false);
//! let widget = Widget::new(&xooie, &class.into_shared(), root, &[]).unwrap();
//!
//! assert_eq!(doc.element_id(tab).as_deref(), Some("1-tab-0"));
//! assert!(widget.last_role_outcome().unwrap().is_applied());
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use xooie_core::logging::targets;
use xooie_core::NodeId;
use xooie_style::{Selector, SelectorList, SelectorMatcher};

use crate::class::Class;
use crate::error::{Result, XooieError};
use crate::widget::Widget;

/// Finds the elements of a role.
pub type RoleGetter<H> = Arc<dyn Fn(&H) -> Vec<NodeId> + Send + Sync>;

/// Creates a role's elements when none exist.
pub type RoleRenderer<H> = Arc<dyn Fn(&H) -> Result<()> + Send + Sync>;

/// Receives a role's elements after ids are assigned.
pub type RoleProcessor<H> = Arc<dyn Fn(&H, &[NodeId]) + Send + Sync>;

/// One declared role.
pub struct RoleDescriptor<H> {
    name: String,
    unique: bool,
    getter: Option<RoleGetter<H>>,
    renderer: Option<RoleRenderer<H>>,
    processor: Option<RoleProcessor<H>>,
}

impl<H> RoleDescriptor<H> {
    /// The role name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the default getter returns at most one element.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Whether a custom getter replaces the attribute lookup.
    pub fn has_custom_getter(&self) -> bool {
        self.getter.is_some()
    }

    /// Whether a renderer is installed.
    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    /// Whether a processor is installed.
    pub fn has_processor(&self) -> bool {
        self.processor.is_some()
    }
}

impl<H> Clone for RoleDescriptor<H> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            unique: self.unique,
            getter: self.getter.clone(),
            renderer: self.renderer.clone(),
            processor: self.processor.clone(),
        }
    }
}

/// Ordered role declarations of a class.
pub struct RoleTable<H> {
    roles: IndexMap<String, RoleDescriptor<H>>,
}

impl<H> RoleTable<H> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            roles: IndexMap::new(),
        }
    }

    /// Declare a role. Redeclaring updates `unique` and keeps installed hooks.
    pub fn define(&mut self, name: &str, unique: bool) {
        self.roles
            .entry(name.to_string())
            .and_modify(|role| role.unique = unique)
            .or_insert_with(|| RoleDescriptor {
                name: name.to_string(),
                unique,
                getter: None,
                renderer: None,
                processor: None,
            });
    }

    /// Look up a role.
    pub fn get(&self, name: &str) -> Option<&RoleDescriptor<H>> {
        self.roles.get(name)
    }

    /// Role names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    /// Number of roles.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether no role is declared.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    fn role_mut(&mut self, name: &str) -> Result<&mut RoleDescriptor<H>> {
        self.roles
            .get_mut(name)
            .ok_or_else(|| XooieError::UnknownRole(name.to_string()))
    }
}

impl<H> Default for RoleTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Clone for RoleTable<H> {
    fn clone(&self) -> Self {
        Self {
            roles: self.roles.clone(),
        }
    }
}

impl<H> fmt::Debug for RoleTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.roles.keys()).finish()
    }
}

/// Result of one role pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleApplicationOutcome {
    /// Every role found elements; names listed in the order processed.
    Applied { roles: Vec<String> },
    /// `role` had no elements even after rendering; later roles were skipped.
    Aborted { role: String },
    /// The widget was still constructing or already cleaned up; no role ran.
    Inactive,
}

impl RoleApplicationOutcome {
    /// Whether every role was processed.
    pub fn is_applied(&self) -> bool {
        matches!(self, RoleApplicationOutcome::Applied { .. })
    }
}

// =============================================================================
// Widget Roles
// =============================================================================

impl Class<Widget> {
    /// Declare a role on the class.
    ///
    /// Unless a getter is installed, the role's elements are the descendants
    /// of the root whose role attribute equals `name`; only the first when
    /// `unique` is set.
    ///
    /// Each pass gives matched elements an id of the form
    /// `{instance}-{role}-{index}`, except elements that already carry an
    /// `id`: author ids are left alone. Indices count every matched element,
    /// so the numbering stays positional either way.
    pub fn define_role(&mut self, name: &str, unique: bool) {
        self.roles_mut().define(name, unique);
    }

    /// Replace the element lookup of a declared role.
    pub fn set_role_getter<F>(&mut self, name: &str, getter: F) -> Result<()>
    where
        F: Fn(&Widget) -> Vec<NodeId> + Send + Sync + 'static,
    {
        self.roles_mut().role_mut(name)?.getter = Some(Arc::new(getter));
        Ok(())
    }

    /// Install the renderer that creates a role's elements when none exist.
    ///
    /// The renderer inserts its output under the widget root; the role is
    /// fetched again afterwards.
    pub fn set_role_renderer<F>(&mut self, name: &str, renderer: F) -> Result<()>
    where
        F: Fn(&Widget) -> Result<()> + Send + Sync + 'static,
    {
        self.roles_mut().role_mut(name)?.renderer = Some(Arc::new(renderer));
        Ok(())
    }

    /// Install the processor that receives a role's elements.
    pub fn set_role_processor<F>(&mut self, name: &str, processor: F) -> Result<()>
    where
        F: Fn(&Widget, &[NodeId]) + Send + Sync + 'static,
    {
        self.roles_mut().role_mut(name)?.processor = Some(Arc::new(processor));
        Ok(())
    }
}

fn fetch(widget: &Widget, role: &RoleDescriptor<Widget>) -> Vec<NodeId> {
    if let Some(getter) = &role.getter {
        return getter(widget);
    }
    let selector = SelectorList::single(Selector::attribute_equals(
        widget.role_attribute(),
        role.name.as_str(),
    ));
    let doc = widget.document();
    if role.unique {
        SelectorMatcher::query_first(doc, widget.root(), &selector)
            .into_iter()
            .collect()
    } else {
        SelectorMatcher::query_all(doc, widget.root(), &selector)
    }
}

/// Elements of a declared role, or `None` for an unknown role.
pub(crate) fn role_elements(widget: &Widget, name: &str) -> Option<Vec<NodeId>> {
    let role = widget.class().roles().get(name)?;
    Some(fetch(widget, role))
}

/// Run one role pass over `widget`.
#[tracing::instrument(skip(widget), fields(id = %widget.id()), target = "xooie::role", level = "debug")]
pub(crate) fn apply_roles(widget: &Widget) -> RoleApplicationOutcome {
    let class = widget.class();
    let doc = widget.document();
    let mut applied = Vec::with_capacity(class.roles().len());

    for role in class.roles().roles.values() {
        let mut elements = fetch(widget, role);

        if elements.is_empty() {
            if let Some(renderer) = &role.renderer {
                tracing::trace!(target: targets::ROLE, role = %role.name, "rendering missing role");
                if let Err(err) = renderer(widget) {
                    tracing::debug!(target: targets::ROLE, role = %role.name, error = %err, "role renderer failed");
                }
                elements = fetch(widget, role);
            }
        }

        if elements.is_empty() {
            if widget.strict_roles() {
                tracing::warn!(target: targets::ROLE, role = %role.name, "role has no elements; pass aborted");
            } else {
                tracing::debug!(target: targets::ROLE, role = %role.name, "role has no elements; pass aborted");
            }
            return RoleApplicationOutcome::Aborted {
                role: role.name.clone(),
            };
        }

        for (index, &element) in elements.iter().enumerate() {
            if doc.has_attribute(element, "id") {
                continue;
            }
            let id = format!("{}-{}-{}", widget.id(), role.name, index);
            if let Err(err) = doc.set_attribute(element, "id", id) {
                tracing::debug!(target: targets::ROLE, role = %role.name, error = %err, "could not assign role id");
            }
        }

        if let Some(processor) = &role.processor {
            processor(widget, &elements);
        }
        applied.push(role.name.clone());
    }

    RoleApplicationOutcome::Applied { roles: applied }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_is_idempotent() {
        let mut table = RoleTable::<()>::new();
        table.define("tab", false);
        table.define("panel", true);
        table.define("tab", true);
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["tab", "panel"]);
        assert!(table.get("tab").unwrap().is_unique());
    }

    #[test]
    fn hooks_require_declared_role() {
        let mut class = crate::WidgetClass::new("tabs");
        assert!(matches!(
            class.set_role_processor("tab", |_, _| {}),
            Err(XooieError::UnknownRole(_))
        ));
        class.define_role("tab", false);
        class.set_role_getter("tab", |_| Vec::new()).unwrap();
        class.define_role("tab", true);
        assert!(class.roles().get("tab").unwrap().has_custom_getter());
    }

    #[test]
    fn outcome_reports_status() {
        assert!(RoleApplicationOutcome::Applied { roles: vec![] }.is_applied());
        assert!(!RoleApplicationOutcome::Aborted { role: "x".into() }.is_applied());
        assert!(!RoleApplicationOutcome::Inactive.is_applied());
    }
}
