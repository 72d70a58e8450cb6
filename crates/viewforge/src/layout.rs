//! Layout registry.
//!
//! A [`Layout`] is a named wrapper template plus the partials composed with
//! it, in order. Layouts only exist once registered; nothing is derived from
//! the files on disk, and asking for an unregistered name is an error at
//! render time.
//!
//! Registering a name twice replaces the earlier entry wholesale; partial
//! lists are never merged.
//!
//! # Thread Safety
//!
//! The registry has no interior locking. Mutation needs `&mut`, so once the
//! owning [`ViewManager`](crate::ViewManager) is shared between threads the
//! registry is read-only.

use std::collections::HashMap;

/// A named layout and its ordered partials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// The layout name, also used to resolve its file
    pub name: String,
    /// Partial names in composition order
    pub partials: Vec<String>,
}

impl Layout {
    /// Creates a layout.
    pub fn new<I, S>(name: impl Into<String>, partials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            partials: partials.into_iter().map(Into::into).collect(),
        }
    }
}

/// Registry of layouts by name.
#[derive(Debug, Clone, Default)]
pub struct LayoutRegistry {
    layouts: HashMap<String, Layout>,
}

impl LayoutRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a layout, replacing any layout with the same name.
    pub fn register<I, S>(&mut self, name: impl Into<String>, partials: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(Layout::new(name, partials));
    }

    /// Registers an already built layout, replacing any layout with the same name.
    pub fn insert(&mut self, layout: Layout) {
        self.layouts.insert(layout.name.clone(), layout);
    }

    /// Looks up a layout by name.
    pub fn get(&self, name: &str) -> Option<&Layout> {
        self.layouts.get(name)
    }

    /// Returns true if a layout named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.layouts.contains_key(name)
    }

    /// Returns the number of registered layouts.
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Returns true if no layouts are registered.
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Returns the registered layout names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.layouts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
