//! Selector parsing.

mod selector_parser;

pub use selector_parser::parse_selector_list;
