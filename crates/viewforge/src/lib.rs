//! # Viewforge - Layout-Aware View Composition
//!
//! `viewforge` composes server-rendered views out of three kinds of template
//! files and renders them through a cached, hookable pipeline:
//!
//! - **Views**: the page-specific template, named by its path (`site/index`)
//! - **Layouts**: a wrapper template registered by name (`main`)
//! - **Partials**: shared fragments a layout pulls in (`head`, `footer`)
//!
//! A render request names a layout (or none) and a view. The manager resolves
//! the ordered file list, reads it through a [`SourceProvider`], compiles it
//! with a [`TemplateEngine`], caches the result under `(layout, view)` and
//! executes it into any [`std::io::Write`], running before/after hooks
//! around execution.
//!
//! ## Core Concepts
//!
//! - [`ViewManager`]: configuration, layouts, hooks and the render entry points
//! - [`ViewConfig`]: naming conventions, delimiters and cache flag, loadable
//!   from YAML
//! - [`LayoutRegistry`]: named layouts and their ordered partials
//! - [`TemplateCache`]: compiled compositions, shareable between managers
//! - [`Hooks`]: ordered before/after render listeners
//! - [`SourceProvider`]: where template bytes come from ([`DirSource`],
//!   [`EmbeddedSource`], [`MemorySource`])
//!
//! ## Quick Start
//!
//! ```rust
//! use viewforge::{MemorySource, ViewManager};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Page {
//!     title: String,
//! }
//!
//! let source = MemorySource::new()
//!     .with("layouts/main.tmpl", "<html>{% include \"layouts/partials/head\" %}<body>{% include view %}</body></html>")
//!     .with("layouts/partials/head.tmpl", "<title>{{ title }}</title>")
//!     .with("site/index.tmpl", "<h1>{{ title }}</h1>");
//!
//! let views = ViewManager::builder(source)
//!     .layout("main", ["head"])
//!     .build()
//!     .unwrap();
//!
//! let mut out: Vec<u8> = Vec::new();
//! views
//!     .render(&mut out, "site/index", &Page { title: "Home".into() })
//!     .unwrap();
//!
//! assert_eq!(
//!     String::from_utf8(out).unwrap(),
//!     "<html><title>Home</title><body><h1>Home</h1></body></html>"
//! );
//! ```
//!
//! ## File Naming
//!
//! With the defaults (`base` empty, suffix `.tmpl`), names resolve as:
//!
//! | Role | Name | Path | Template name |
//! |------|------|------|---------------|
//! | layout | `main` | `layouts/main.tmpl` | `layouts/main` |
//! | partial | `head` | `layouts/partials/head.tmpl` | `layouts/partials/head` |
//! | view | `site/index` | `site/index.tmpl` | `site/index` |
//!
//! Inside a composition every source is addressable by its template name, and
//! the global `view` holds the view's template name, so a layout can be
//! written once and wrap any view with `{% include view %}`.
//!
//! ## Caching
//!
//! Compiled compositions are cached by `(layout, view)`. Turn caching off
//! during development to pick up edits on every render:
//!
//! ```rust
//! use viewforge::{MemorySource, ViewConfig, ViewManager};
//!
//! let views = ViewManager::new(MemorySource::new(), ViewConfig::new().with_cache(false));
//! assert!(!views.is_cache_enabled());
//! views.set_cache(true);
//! assert!(views.is_cache_enabled());
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: compositions and cache misses at
//! `debug`, per-file loads and cache hits at `trace`. Install a subscriber to
//! see them.

pub mod cache;
pub mod compose;
pub mod config;
pub mod engine;
mod error;
pub mod hooks;
pub mod layout;
mod manager;
pub mod resolve;
pub mod source;

// Error types
pub use error::{CompileError, ExecutionError, SourceError, ViewError};

// Configuration
pub use config::{
    ConfigError, Delimiters, ViewConfig, DEFAULT_LAYOUT, DEFAULT_LAYOUTS_DIR,
    DEFAULT_PARTIALS_DIR, DEFAULT_SUFFIX,
};

// Manager and render pipeline
pub use manager::{ViewManager, ViewManagerBuilder};

// Composition
pub use cache::{CompositionKey, TemplateCache};
pub use compose::Composer;
pub use layout::{Layout, LayoutRegistry};
pub use resolve::{resolve, template_name, ResolvedFile, Role};

// Template engine abstraction
pub use engine::{
    CompileOptions, CompiledTemplate, FunctionMap, MiniJinjaEngine, TemplateEngine, TemplateFn,
    TemplateSource,
};

// Hooks
pub use hooks::{AfterRenderFn, BeforeRenderFn, HookError, HookPhase, Hooks, RenderEvent};

// Sources
pub use source::{DirSource, EmbeddedSource, MemorySource, SourceProvider};

// Engine types callers commonly configure
pub use minijinja::UndefinedBehavior;
