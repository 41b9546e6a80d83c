//! Error types for the widget framework.

use std::io;
use std::path::PathBuf;

use xooie_core::{CoreError, DomError};

/// Result type alias for widget framework operations.
pub type Result<T> = std::result::Result<T, XooieError>;

/// Errors raised by the widget framework.
///
/// Policy failures that the framework tolerates (a missing role element, a
/// value rejected by a validator, a template that fails to render) are never
/// reported through this type; they surface as outcome values instead.
#[derive(Debug, thiserror::Error)]
pub enum XooieError {
    /// A document operation failed.
    #[error(transparent)]
    Dom(#[from] DomError),

    /// A scheduling operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A selector or stylesheet operation failed.
    #[error(transparent)]
    Style(#[from] xooie_style::Error),

    /// A property accessor was misused.
    #[error(transparent)]
    Property(#[from] PropertyError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A selector passed as a widget root matched nothing.
    #[error("No element matches '{0}'")]
    ElementNotFound(String),

    /// A role was referenced that the class never declared.
    #[error("Role '{0}' is not defined")]
    UnknownRole(String),

    /// A constructor layer or role hook failed.
    #[error("{0}")]
    Constructor(String),

    /// The runtime that owned an instance has been dropped.
    #[error("Runtime has been dropped")]
    RuntimeDropped,
}

impl XooieError {
    /// Create a constructor failure with a message.
    pub fn constructor(message: impl Into<String>) -> Self {
        Self::Constructor(message.into())
    }
}

/// Misuse of a declared property.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    /// The property was never declared on the class.
    #[error("Property '{0}' is not defined")]
    NotFound(String),

    /// The property is write-only and has no getter.
    #[error("Property '{0}' is write-only")]
    NoGetter(String),

    /// The property is read-only and has no setter.
    #[error("Property '{0}' is read-only")]
    NoSetter(String),
}

/// Failures of a template renderer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// No renderer is registered for the language.
    #[error("No renderer registered for template language '{0}'")]
    UnknownLanguage(String),

    /// The template source could not be processed.
    #[error("Template error: {0}")]
    Template(String),

    /// The template node is missing or not an element.
    #[error("Template node is not an element")]
    InvalidTemplate,
}

/// Failures loading a [`XooieConfig`](crate::XooieConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config text is not valid TOML for the config schema.
    #[error("Failed to parse config{}: {source}", path_suffix(path))]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: toml::de::Error,
    },

    /// A field holds a value the framework cannot use.
    #[error("Invalid config value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    /// Create an invalid-field error.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" '{}'", path.display()),
        None => String::new(),
    }
}
