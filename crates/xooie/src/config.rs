//! Runtime configuration.
//!
//! Configuration is plain data loaded from TOML. Every key is optional; a
//! missing key takes the framework default, so an empty file is a valid
//! configuration.
//!
//! ```
//! use xooie::XooieConfig;
//!
//! let config = XooieConfig::from_toml_str(r#"
//! cleanup_interval_ms = 500
//! role_attribute = "data-role"
//! "#).unwrap();
//! assert_eq!(config.role_attribute, "data-role");
//! assert_eq!(config.instance_attribute, "data-xooie-instance");
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use xooie_core::logging::targets;

use crate::error::ConfigError;

/// Default attribute binding a root element to its registered instance.
pub const DEFAULT_INSTANCE_ATTRIBUTE: &str = "data-xooie-instance";
/// Default attribute marking role elements.
pub const DEFAULT_ROLE_ATTRIBUTE: &str = "data-x-role";
/// Default template language name.
pub const DEFAULT_TEMPLATE_LANGUAGE: &str = "micro_template";

/// Settings shared by every widget a runtime creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XooieConfig {
    /// Interval of the detached-instance sweep in milliseconds. Zero disables it.
    pub cleanup_interval_ms: u64,
    /// Attribute holding a root element's instance id.
    pub instance_attribute: String,
    /// Attribute the default role getter matches on.
    pub role_attribute: String,
    /// Attribute naming the widget type for [`Xooie::scan`](crate::Xooie::scan).
    pub widget_type_attribute: String,
    /// Attribute listing addon names for [`Xooie::scan`](crate::Xooie::scan).
    pub addons_attribute: String,
    /// Template language used when a widget does not set `templateLanguage`.
    pub template_language: String,
    /// Log aborted role passes at `warn` instead of `debug`.
    pub strict_roles: bool,
    /// Number of settle polls after which a stuck construction is reported.
    pub settle_poll_limit: Option<u32>,
}

impl Default for XooieConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_ms: 0,
            instance_attribute: DEFAULT_INSTANCE_ATTRIBUTE.to_string(),
            role_attribute: DEFAULT_ROLE_ATTRIBUTE.to_string(),
            widget_type_attribute: "data-widget-type".to_string(),
            addons_attribute: "data-addons".to_string(),
            template_language: DEFAULT_TEMPLATE_LANGUAGE.to_string(),
            strict_roles: false,
            settle_poll_limit: None,
        }
    }
}

impl XooieConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|source| ConfigError::Parse { path: None, source })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        config.validate()?;
        tracing::debug!(target: targets::CONFIG, path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Serialize the configuration as TOML.
    pub fn to_toml_string(&self) -> String {
        // Every field is a plain scalar, so serialization cannot fail.
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Check that every attribute name is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let attributes = [
            ("instance_attribute", &self.instance_attribute),
            ("role_attribute", &self.role_attribute),
            ("widget_type_attribute", &self.widget_type_attribute),
            ("addons_attribute", &self.addons_attribute),
        ];
        for (field, value) in attributes {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "attribute name is empty"));
            }
            if value.chars().any(char::is_whitespace) {
                return Err(ConfigError::invalid(field, "attribute name contains whitespace"));
            }
        }
        if self.template_language.trim().is_empty() {
            return Err(ConfigError::invalid("template_language", "language name is empty"));
        }
        Ok(())
    }

    /// The sweep interval, or `None` when sweeping is disabled.
    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_ms > 0).then(|| Duration::from_millis(self.cleanup_interval_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_gives_defaults() {
        let config = XooieConfig::from_toml_str("").unwrap();
        assert_eq!(config, XooieConfig::default());
        assert_eq!(config.cleanup_interval(), None);
    }

    #[test]
    fn partial_source_overrides() {
        let config = XooieConfig::from_toml_str(
            "cleanup_interval_ms = 250\nstrict_roles = true\nsettle_poll_limit = 8\n",
        )
        .unwrap();
        assert_eq!(config.cleanup_interval(), Some(Duration::from_millis(250)));
        assert!(config.strict_roles);
        assert_eq!(config.settle_poll_limit, Some(8));
        assert_eq!(config.template_language, DEFAULT_TEMPLATE_LANGUAGE);
    }

    #[test]
    fn invalid_values_rejected() {
        let err = XooieConfig::from_toml_str("role_attribute = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "role_attribute", .. }));

        let err = XooieConfig::from_toml_str("cleanup_interval_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: None, .. }));
    }

    #[test]
    fn toml_string_reloads() {
        let mut config = XooieConfig::default();
        config.addons_attribute = "data-plugins".into();
        let reloaded = XooieConfig::from_toml_str(&config.to_toml_string()).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xooie.toml");
        fs::write(&path, "template_language = \"mustache\"\n").unwrap();
        let config = XooieConfig::load(&path).unwrap();
        assert_eq!(config.template_language, "mustache");

        let missing = XooieConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(missing.to_string().contains("missing.toml"));
    }
}
