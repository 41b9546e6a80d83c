//! Prelude module for Xooie.
//!
//! ```
//! use xooie::prelude::*;
//! ```
//!
//! This provides access to:
//! - The runtime (`Xooie`, `XooieConfig`)
//! - Widgets and addons with their classes
//! - The property accessor trait and write outcomes
//! - The document types widgets are built on (`Document`, `NodeId`)

// ============================================================================
// Runtime
// ============================================================================

pub use crate::{Result, Xooie, XooieConfig, XooieError};

// ============================================================================
// Widgets and Addons
// ============================================================================

pub use crate::{
    Addon, AddonClass, Lifecycle, RoleApplicationOutcome, SettleGuard, Widget, WidgetClass,
};

// ============================================================================
// Properties
// ============================================================================

pub use crate::{Access, PropertyHost, SetOutcome};

// ============================================================================
// Document
// ============================================================================

pub use xooie_core::{Document, DomEvent, NodeId};
