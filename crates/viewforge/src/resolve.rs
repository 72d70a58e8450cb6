//! Path resolution for views, layouts and partials.
//!
//! Resolution is a pure mapping from a logical name and its [`Role`] to a
//! resource path inside the [`SourceProvider`](crate::SourceProvider). It does
//! no I/O and cannot fail; a path that points nowhere surfaces later, when the
//! composer tries to read it.
//!
//! With the default configuration:
//!
//! | Role | Name | Template name | Path |
//! |------|------|---------------|------|
//! | View | `site/index` | `site/index` | `site/index.tmpl` |
//! | Layout | `main` | `layouts/main` | `layouts/main.tmpl` |
//! | Partial | `head` | `layouts/partials/head` | `layouts/partials/head.tmpl` |
//!
//! The *template name* is what the engine registers the source under. The
//! *path* additionally carries the `base` and `theme` prefixes and the suffix.
//!
//! Partials live inside the layouts directory unless
//! [`partials_in_layouts_dir`](crate::ViewConfig::partials_in_layouts_dir) is
//! off, in which case `partials_dir` is taken relative to the view root.

use std::fmt;

use crate::config::ViewConfig;

/// What part a file plays in a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The page body
    View,
    /// The wrapper template that is executed first
    Layout,
    /// A fragment registered with a layout
    Partial,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::View => write!(f, "view"),
            Role::Layout => write!(f, "layout"),
            Role::Partial => write!(f, "partial"),
        }
    }
}

/// A fully resolved composition entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Role of the file
    pub role: Role,
    /// Logical name as given by the caller (e.g. `"head"`)
    pub name: String,
    /// Name the engine registers the source under (e.g. `"layouts/partials/head"`)
    pub template_name: String,
    /// Resource path read from the source provider
    pub path: String,
}

/// Returns the engine-facing name of a file: its path relative to the view
/// root, without suffix.
pub fn template_name(role: Role, name: &str, config: &ViewConfig) -> String {
    match role {
        Role::View => join(&[name]),
        Role::Layout => join(&[&config.layouts_dir, name]),
        Role::Partial if config.partials_in_layouts_dir => {
            join(&[&config.layouts_dir, &config.partials_dir, name])
        }
        Role::Partial => join(&[&config.partials_dir, name]),
    }
}

/// Resolves a logical name to its resource path.
pub fn resolve(role: Role, name: &str, config: &ViewConfig) -> String {
    let relative = template_name(role, name, config);
    let theme = config.theme.as_deref().unwrap_or("");
    let mut path = join(&[&config.base, theme, &relative]);
    path.push_str(&config.suffix);
    path
}

/// Resolves a logical name to a [`ResolvedFile`].
pub fn resolve_file(role: Role, name: &str, config: &ViewConfig) -> ResolvedFile {
    ResolvedFile {
        role,
        name: name.to_string(),
        template_name: template_name(role, name, config),
        path: resolve(role, name, config),
    }
}

/// Joins path segments with `/`, dropping empty segments and redundant
/// slashes at segment boundaries. A leading `/` on the first segment is kept.
fn join(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts {
        let trimmed = if out.is_empty() {
            part.trim_end_matches('/')
        } else {
            part.trim_matches('/')
        };
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(trimmed);
    }
    out
}
