//! Declared properties with defaults, processors and validators.
//!
//! A class owns a [`PropertyTable`] describing its properties; every
//! instance owns a [`PropertyStore`] holding the values written to it.
//! Reads fall back to the declared default and pass through the property's
//! processor; writes consult the validator and are dropped when it refuses.
//!
//! Property values are JSON values, matching what markup `data-*` attributes
//! decode to.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use xooie::prelude::*;
//!
//! let xooie = Xooie::new();
//! let mut class = WidgetClass::new("counter");
//! class.define("step", json!(1));
//! class
//!     .set_validator("step", |_, value| value.as_i64().is_some_and(|v| v > 0))
//!     .unwrap();
//!
//! let root = xooie.document().create_element("div");
//! xooie.document().append_child(xooie.document().body(), root).unwrap();
//! let widget = Widget::new(&xooie, &class.into_shared(), root, &[]).unwrap();
//!
//! assert_eq!(widget.set("step", json!(-2)).unwrap(), SetOutcome::Rejected);
//! assert_eq!(widget.get("step").unwrap(), json!(1));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use xooie_core::logging::targets;

use crate::error::PropertyError;

/// Which generated accessors a property exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Readable through [`PropertyHost::property`], not writable.
    ReadOnly,
    /// Writable through [`PropertyHost::property`], not readable.
    WriteOnly,
    /// Readable and writable.
    ReadWrite,
}

impl Access {
    /// Whether the property has a getter.
    pub fn is_readable(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    /// Whether the property has a setter.
    pub fn is_writable(self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }

    /// Combine two declarations of the same property.
    pub fn merge(self, other: Access) -> Access {
        if self == other {
            self
        } else {
            Access::ReadWrite
        }
    }
}

/// Transforms a raw stored value on read.
pub type Processor<H> = Arc<dyn Fn(&H, Value) -> Value + Send + Sync>;

/// Decides whether a written value is accepted.
pub type Validator<H> = Arc<dyn Fn(&H, &Value) -> bool + Send + Sync>;

/// Result of a property write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The value was stored.
    Stored,
    /// The validator refused the value; the previous value is unchanged.
    Rejected,
}

impl SetOutcome {
    /// Whether the value was stored.
    pub fn is_stored(self) -> bool {
        self == SetOutcome::Stored
    }
}

/// Metadata for one declared property.
pub struct PropertyDescriptor<H> {
    name: String,
    default: Value,
    access: Access,
    processor: Option<Processor<H>>,
    validator: Option<Validator<H>>,
}

impl<H> PropertyDescriptor<H> {
    fn new(name: &str, access: Access, default: Value) -> Self {
        Self {
            name: name.to_string(),
            default,
            access,
            processor: None,
            validator: None,
        }
    }

    /// The property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value read when nothing has been stored.
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// The accessor flags.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Whether a read processor is installed.
    pub fn has_processor(&self) -> bool {
        self.processor.is_some()
    }

    /// Whether a write validator is installed.
    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }
}

impl<H> Clone for PropertyDescriptor<H> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            default: self.default.clone(),
            access: self.access,
            processor: self.processor.clone(),
            validator: self.validator.clone(),
        }
    }
}

impl<H> fmt::Debug for PropertyDescriptor<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("access", &self.access)
            .field("processor", &self.processor.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Ordered property declarations of a class.
pub struct PropertyTable<H> {
    descriptors: IndexMap<String, PropertyDescriptor<H>>,
}

impl<H> PropertyTable<H> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            descriptors: IndexMap::new(),
        }
    }

    /// Declare a property, or widen an existing declaration.
    ///
    /// A name is listed once no matter how often it is declared. Access
    /// flags accumulate, so a read-only declaration followed by a write-only
    /// one yields a read-write property. `default` replaces the stored
    /// default when given.
    pub fn declare(&mut self, name: &str, access: Access, default: Option<Value>) {
        match self.descriptors.get_mut(name) {
            Some(existing) => {
                existing.access = existing.access.merge(access);
                if let Some(default) = default {
                    existing.default = default;
                }
            }
            None => {
                let descriptor =
                    PropertyDescriptor::new(name, access, default.unwrap_or(Value::Null));
                self.descriptors.insert(name.to_string(), descriptor);
            }
        }
    }

    /// Declare a property together with its processor.
    pub(crate) fn declare_processed(
        &mut self,
        name: &str,
        access: Access,
        default: Value,
        processor: Processor<H>,
    ) {
        self.declare(name, access, Some(default));
        if let Some(descriptor) = self.descriptors.get_mut(name) {
            descriptor.processor = Some(processor);
        }
    }

    /// Install the read processor for a declared property.
    pub fn set_processor(&mut self, name: &str, processor: Processor<H>) -> Result<(), PropertyError> {
        self.descriptor_mut(name)?.processor = Some(processor);
        Ok(())
    }

    /// Install the write validator for a declared property.
    pub fn set_validator(&mut self, name: &str, validator: Validator<H>) -> Result<(), PropertyError> {
        self.descriptor_mut(name)?.validator = Some(validator);
        Ok(())
    }

    /// Look up a declaration.
    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor<H>> {
        self.descriptors.get(name)
    }

    /// Whether a property is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    /// Number of declared properties.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn descriptor_mut(&mut self, name: &str) -> Result<&mut PropertyDescriptor<H>, PropertyError> {
        self.descriptors
            .get_mut(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))
    }
}

impl<H> Default for PropertyTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Clone for PropertyTable<H> {
    fn clone(&self) -> Self {
        Self {
            descriptors: self.descriptors.clone(),
        }
    }
}

impl<H> fmt::Debug for PropertyTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.descriptors.values()).finish()
    }
}

/// Per-instance storage for written property values.
#[derive(Debug, Default)]
pub struct PropertyStore {
    values: Mutex<HashMap<String, Value>>,
}

impl PropertyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw stored value, if one was written.
    pub fn raw(&self, name: &str) -> Option<Value> {
        self.values.lock().get(name).cloned()
    }

    fn store(&self, name: &str, value: Value) {
        self.values.lock().insert(name.to_string(), value);
    }
}

/// An instance whose class declares properties.
///
/// Implemented by [`Widget`](crate::Widget) and [`Addon`](crate::Addon). The
/// provided methods carry the read and write semantics; no lock is held while
/// a processor or validator runs, so hooks may read other properties.
pub trait PropertyHost: Sized {
    /// The class-level declarations.
    fn property_table(&self) -> &PropertyTable<Self>;

    /// The instance-level values.
    fn property_store(&self) -> &PropertyStore;

    /// Read a property: the stored value or the default, through the processor.
    ///
    /// Ignores access flags.
    fn get(&self, name: &str) -> Result<Value, PropertyError> {
        let descriptor = self
            .property_table()
            .get(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        let raw = self
            .property_store()
            .raw(name)
            .unwrap_or_else(|| descriptor.default.clone());
        Ok(match &descriptor.processor {
            Some(processor) => processor(self, raw),
            None => raw,
        })
    }

    /// Write a property if its validator accepts the value.
    ///
    /// Ignores access flags, so markup may seed read-only properties.
    fn set(&self, name: &str, value: Value) -> Result<SetOutcome, PropertyError> {
        let descriptor = self
            .property_table()
            .get(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        if let Some(validator) = &descriptor.validator {
            if !validator(self, &value) {
                tracing::debug!(target: targets::WIDGET, property = name, %value, "rejected property value");
                return Ok(SetOutcome::Rejected);
            }
        }
        self.property_store().store(name, value);
        Ok(SetOutcome::Stored)
    }

    /// The generated accessor: `None` reads, `Some(value)` writes.
    ///
    /// Honors access flags. A write returns the value read back afterwards,
    /// which is the previous value when the validator refused the write.
    fn property(&self, name: &str, value: Option<Value>) -> Result<Value, PropertyError> {
        let access = self
            .property_table()
            .get(name)
            .map(PropertyDescriptor::access)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        match value {
            None if !access.is_readable() => Err(PropertyError::NoGetter(name.to_string())),
            None => self.get(name),
            Some(_) if !access.is_writable() => Err(PropertyError::NoSetter(name.to_string())),
            Some(value) => {
                self.set(name, value)?;
                if access.is_readable() {
                    self.get(name)
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }

    /// Write every declared property that has a same-named key in `bag`.
    ///
    /// Unknown keys are ignored. Returns the number of values stored.
    fn set_data(&self, bag: &Map<String, Value>) -> usize {
        let names: Vec<String> = self
            .property_table()
            .names()
            .filter(|name| bag.contains_key(*name))
            .map(str::to_string)
            .collect();
        let mut stored = 0;
        for name in names {
            if let Ok(SetOutcome::Stored) = self.set(&name, bag[&name].clone()) {
                stored += 1;
            }
        }
        stored
    }
}
