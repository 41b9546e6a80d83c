//! Style rules and stylesheets.

mod rule;
mod stylesheet;

pub use rule::{normalize_property_name, RuleHandle, StyleRule};
pub use stylesheet::StyleSheet;
