//! View configuration.
//!
//! [`ViewConfig`] describes where view, layout and partial files live inside
//! a [`SourceProvider`](crate::SourceProvider), how they are named, and how
//! the template engine is set up for them. It can be built programmatically
//! with the `with_*` methods or loaded from YAML:
//!
//! ```yaml
//! default_layout: main
//! layouts_dir: layouts
//! partials_dir: partials
//! suffix: .tmpl
//! cache: false
//! delimiters:
//!   left: "[["
//!   right: "]]"
//! layouts:
//!   main: [head, header, footer]
//!   page: [head]
//! ```
//!
//! Every key is optional; missing keys take the defaults below.
//!
//! | Key | Default |
//! |-----|---------|
//! | `base` | `""` |
//! | `theme` | none |
//! | `default_layout` | `"main"` |
//! | `layouts_dir` | `"layouts"` |
//! | `partials_dir` | `"partials"` |
//! | `partials_in_layouts_dir` | `true` |
//! | `suffix` | `".tmpl"` |
//! | `delimiters` | `{{` / `}}` |
//! | `cache` | `true` |
//! | `layouts` | empty |
//!
//! Function bindings cannot be expressed in YAML; attach them with
//! [`ViewConfig::with_function`] after loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::engine::{FunctionMap, TemplateFn};

/// Default file suffix appended to every logical name.
pub const DEFAULT_SUFFIX: &str = ".tmpl";

/// Default layout used by [`ViewManager::render`](crate::ViewManager::render).
pub const DEFAULT_LAYOUT: &str = "main";

/// Default layouts directory, relative to the view root.
pub const DEFAULT_LAYOUTS_DIR: &str = "layouts";

/// Default partials directory, relative to the layouts directory.
pub const DEFAULT_PARTIALS_DIR: &str = "partials";

/// Error loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document could not be parsed.
    #[error("invalid view configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path of the configuration file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// The offending key
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// The delimiter pair marking template expressions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Delimiters {
    /// Opening delimiter
    pub left: String,
    /// Closing delimiter
    pub right: String,
}

impl Delimiters {
    /// Creates a delimiter pair.
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Returns true for the engine's standard `{{` / `}}` pair.
    pub fn is_default(&self) -> bool {
        self.left == "{{" && self.right == "}}"
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

/// Configuration of a [`ViewManager`](crate::ViewManager).
///
/// Owned exclusively by the manager. The cache flag only seeds the manager's
/// cache; toggling caching later goes through
/// [`ViewManager::set_cache`](crate::ViewManager::set_cache).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    /// Path prefix of all views inside the source provider.
    pub base: String,
    /// Optional theme directory inserted after `base`.
    pub theme: Option<String>,
    /// Layout used by `render` when no layout is named.
    pub default_layout: String,
    /// Directory holding layout files.
    pub layouts_dir: String,
    /// Directory holding partial files.
    pub partials_dir: String,
    /// Whether `partials_dir` is nested inside `layouts_dir`.
    pub partials_in_layouts_dir: bool,
    /// Suffix appended to every logical name.
    pub suffix: String,
    /// Expression delimiters handed to the engine.
    pub delimiters: Delimiters,
    /// Whether compiled templates are cached.
    pub cache: bool,
    /// Layouts registered when the manager is created, by name.
    pub layouts: BTreeMap<String, Vec<String>>,
    /// Global functions available to every template.
    #[serde(skip)]
    pub functions: FunctionMap,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            base: String::new(),
            theme: None,
            default_layout: DEFAULT_LAYOUT.to_string(),
            layouts_dir: DEFAULT_LAYOUTS_DIR.to_string(),
            partials_dir: DEFAULT_PARTIALS_DIR.to_string(),
            partials_in_layouts_dir: true,
            suffix: DEFAULT_SUFFIX.to_string(),
            delimiters: Delimiters::default(),
            cache: true,
            layouts: BTreeMap::new(),
            functions: FunctionMap::new(),
        }
    }
}

impl ViewConfig {
    /// Creates a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from a YAML document.
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ViewConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delimiters.left.is_empty() || self.delimiters.right.is_empty() {
            return Err(ConfigError::Invalid {
                field: "delimiters",
                reason: "delimiters must not be empty".to_string(),
            });
        }
        if self.delimiters.left == self.delimiters.right {
            return Err(ConfigError::Invalid {
                field: "delimiters",
                reason: format!(
                    "left and right delimiters are both {:?}",
                    self.delimiters.left
                ),
            });
        }
        Ok(())
    }

    /// Sets the path prefix.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    /// Sets the theme directory.
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    /// Sets the default layout name.
    pub fn with_default_layout(mut self, name: impl Into<String>) -> Self {
        self.default_layout = name.into();
        self
    }

    /// Sets the layouts directory.
    pub fn with_layouts_dir(mut self, dir: impl Into<String>) -> Self {
        self.layouts_dir = dir.into();
        self
    }

    /// Sets the partials directory.
    pub fn with_partials_dir(mut self, dir: impl Into<String>) -> Self {
        self.partials_dir = dir.into();
        self
    }

    /// Sets whether the partials directory lives inside the layouts directory.
    pub fn with_partials_in_layouts_dir(mut self, nested: bool) -> Self {
        self.partials_in_layouts_dir = nested;
        self
    }

    /// Sets the file suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Sets the expression delimiters.
    pub fn with_delimiters(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.delimiters = Delimiters::new(left, right);
        self
    }

    /// Enables or disables caching.
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Declares a layout to register at construction.
    pub fn with_layout<I, S>(mut self, name: impl Into<String>, partials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layouts
            .insert(name.into(), partials.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a global template function.
    pub fn with_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Result<serde_json::Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name, f);
        self
    }

    /// Merges a function map into the global functions.
    pub fn with_functions(mut self, functions: FunctionMap) -> Self {
        self.functions.extend(functions);
        self
    }

    /// Adds an already shared function binding.
    pub fn with_shared_function(mut self, name: impl Into<String>, f: TemplateFn) -> Self {
        self.functions.insert_shared(name, f);
        self
    }
}
