//! The view manager and its render pipeline.
//!
//! [`ViewManager`] owns the configuration, the layout registry, the hooks and
//! a handle to a [`TemplateCache`]. Every render goes through one routine:
//!
//! ```text
//! Resolving ──► Composed ──► BeforeHooks ──► Executing ──► AfterHooks ──► Done
//!     │                          │               │              │
//!     └──────────────────────────┴───────────────┴──────────────┴──► Failed
//! ```
//!
//! The three entry points only differ in the layout they pass:
//!
//! | Method | Layout |
//! |--------|--------|
//! | [`render`](ViewManager::render) | the configured default layout |
//! | [`render_layout`](ViewManager::render_layout) | the named layout |
//! | [`render_partial`](ViewManager::render_partial) | none, the view alone |
//!
//! # Sharing
//!
//! A manager is `Send + Sync`; wrap it in an `Arc` to share it between
//! request handlers. Configuration, layouts and hooks are changed through
//! `&mut self`, so a shared manager is effectively frozen. Managers that need
//! different hooks over the same compiled templates are built separately and
//! handed the same cache with [`ViewManager::with_cache`].
//!
//! # Example
//!
//! ```rust
//! use viewforge::{MemorySource, ViewManager};
//! use serde_json::json;
//!
//! let source = MemorySource::new()
//!     .with("layouts/main.tmpl", "<body>{% include view %}</body>")
//!     .with("site/index.tmpl", "<h1>{{ title }}</h1>");
//!
//! let views = ViewManager::builder(source)
//!     .layout("main", Vec::<String>::new())
//!     .build()
//!     .unwrap();
//!
//! let mut out: Vec<u8> = Vec::new();
//! views.render(&mut out, "site/index", &json!({"title": "Home"})).unwrap();
//! assert_eq!(out, b"<body><h1>Home</h1></body>");
//! ```

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::{CompositionKey, TemplateCache};
use crate::compose::Composer;
use crate::config::{ConfigError, Delimiters, ViewConfig};
use crate::engine::{CompiledTemplate, FunctionMap, MiniJinjaEngine, TemplateEngine};
use crate::error::ViewError;
use crate::hooks::{HookError, Hooks, RenderEvent};
use crate::layout::{Layout, LayoutRegistry};
use crate::resolve::ResolvedFile;
use crate::source::SourceProvider;

/// Composes, caches and renders views.
pub struct ViewManager {
    config: ViewConfig,
    layouts: LayoutRegistry,
    source: Arc<dyn SourceProvider>,
    engine: Box<dyn TemplateEngine>,
    cache: Arc<TemplateCache>,
    hooks: Hooks,
}

impl ViewManager {
    /// Creates a manager over `source` with the given configuration.
    ///
    /// Layouts declared in the configuration are registered, a fresh cache is
    /// created with the configured cache flag, and [`MiniJinjaEngine`] is
    /// used as the engine.
    pub fn new(source: impl SourceProvider + 'static, config: ViewConfig) -> Self {
        Self::from_parts(Arc::new(source), config)
    }

    fn from_parts(source: Arc<dyn SourceProvider>, config: ViewConfig) -> Self {
        let mut layouts = LayoutRegistry::new();
        for (name, partials) in &config.layouts {
            layouts.register(name.clone(), partials.iter().cloned());
        }
        Self {
            cache: Arc::new(TemplateCache::new(config.cache)),
            config,
            layouts,
            source,
            engine: Box::new(MiniJinjaEngine::new()),
            hooks: Hooks::new(),
        }
    }

    /// Starts building a manager over `source`.
    pub fn builder(source: impl SourceProvider + 'static) -> ViewManagerBuilder {
        ViewManagerBuilder::new(Arc::new(source))
    }

    /// Replaces the template engine.
    pub fn with_engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    /// Uses a cache shared with other managers instead of a private one.
    ///
    /// The shared cache keeps its own enabled flag.
    pub fn with_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces all hooks.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Returns the layout registry.
    pub fn layouts(&self) -> &LayoutRegistry {
        &self.layouts
    }

    /// Returns the cache handle.
    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    /// Returns the source provider.
    pub fn source(&self) -> &Arc<dyn SourceProvider> {
        &self.source
    }

    /// Returns the registered hooks.
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Registers a layout with its partials, replacing any layout of the same
    /// name.
    pub fn add_layout<I, S>(&mut self, name: impl Into<String>, partials: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layouts.register(name, partials);
    }

    /// Adds a global template function.
    pub fn add_function<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[serde_json::Value]) -> Result<serde_json::Value, String> + Send + Sync + 'static,
    {
        self.config.functions.insert(name, f);
    }

    /// Replaces the global function map.
    pub fn set_function_map(&mut self, functions: FunctionMap) {
        self.config.functions = functions;
    }

    /// Turns caching on or off. Already cached entries are kept.
    pub fn set_cache(&self, enabled: bool) {
        self.cache.set_enabled(enabled);
    }

    /// Returns true if compiled templates are being cached.
    pub fn is_cache_enabled(&self) -> bool {
        self.cache.is_enabled()
    }

    /// Sets the expression delimiters for future compilations.
    pub fn set_delimiters(&mut self, left: impl Into<String>, right: impl Into<String>) {
        self.config.delimiters = Delimiters::new(left, right);
    }

    /// Sets the file suffix for future compilations.
    pub fn set_suffix(&mut self, suffix: impl Into<String>) {
        self.config.suffix = suffix.into();
    }

    /// Sets (or clears) the theme directory for future compilations.
    pub fn set_theme(&mut self, theme: Option<String>) {
        self.config.theme = theme;
    }

    /// Sets the layout used by [`render`](Self::render).
    pub fn set_default_layout(&mut self, name: impl Into<String>) {
        self.config.default_layout = name.into();
    }

    /// Appends a before-render listener.
    pub fn on_before_render<F>(&mut self, f: F)
    where
        F: Fn(&RenderEvent<'_>, &mut dyn Write) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.on_before_render(f);
    }

    /// Appends an after-render listener.
    pub fn on_after_render<F>(&mut self, f: F)
    where
        F: Fn(&RenderEvent<'_>, &mut dyn Write) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.on_after_render(f);
    }

    fn composer(&self) -> Composer<'_> {
        Composer::new(
            &self.config,
            &self.layouts,
            self.source.as_ref(),
            self.engine.as_ref(),
        )
    }

    /// Returns the ordered files a composition reads, without reading them.
    pub fn files(&self, layout: Option<&str>, view: &str) -> Result<Vec<ResolvedFile>, ViewError> {
        self.composer().plan(layout, view)
    }

    /// Returns the compiled template for a composition, from the cache when
    /// possible.
    pub fn template(
        &self,
        layout: Option<&str>,
        view: &str,
    ) -> Result<Arc<dyn CompiledTemplate>, ViewError> {
        let key = CompositionKey::new(layout, view);
        self.cache
            .get_or_try_insert_with(&key, || self.composer().compose(layout, view))
    }

    /// Renders `view` inside the default layout.
    pub fn render<T>(&self, out: &mut dyn Write, view: &str, data: &T) -> Result<(), ViewError>
    where
        T: Serialize + ?Sized,
    {
        let layout = self.config.default_layout.clone();
        self.render_with(out, Some(&layout), view, data)
    }

    /// Renders `view` inside the named layout.
    pub fn render_layout<T>(
        &self,
        out: &mut dyn Write,
        layout: &str,
        view: &str,
        data: &T,
    ) -> Result<(), ViewError>
    where
        T: Serialize + ?Sized,
    {
        self.render_with(out, Some(layout), view, data)
    }

    /// Renders `view` on its own, without a layout.
    pub fn render_partial<T>(
        &self,
        out: &mut dyn Write,
        view: &str,
        data: &T,
    ) -> Result<(), ViewError>
    where
        T: Serialize + ?Sized,
    {
        self.render_with(out, None, view, data)
    }

    fn render_with<T>(
        &self,
        out: &mut dyn Write,
        layout: Option<&str>,
        view: &str,
        data: &T,
    ) -> Result<(), ViewError>
    where
        T: Serialize + ?Sized,
    {
        let template = self.template(layout, view)?;
        let data = serde_json::to_value(data)?;
        let event = RenderEvent {
            layout,
            view,
            data: &data,
        };

        if let Err(err) = self.hooks.run_before_render(&event, out) {
            tracing::debug!(view, error = %err, "before-render hook aborted render");
            return Err(err.into());
        }
        template.execute(out, &data)?;
        if let Err(err) = self.hooks.run_after_render(&event, out) {
            tracing::debug!(view, error = %err, "after-render hook failed");
            return Err(err.into());
        }
        Ok(())
    }
}

impl fmt::Debug for ViewManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewManager")
            .field("config", &self.config)
            .field("layouts", &self.layouts.names())
            .field("cache", &self.cache)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Builder for [`ViewManager`].
///
/// ```rust
/// use viewforge::{HookError, MemorySource, ViewManager};
///
/// let views = ViewManager::builder(MemorySource::new())
///     .suffix(".html")
///     .default_layout("page")
///     .layout("page", ["head"])
///     .function("year", |_| Ok(serde_json::json!(2020)))
///     .before_render(|event, _out| {
///         if event.view.starts_with("admin/") {
///             return Err(HookError::before_render("forbidden"));
///         }
///         Ok(())
///     })
///     .cache(false)
///     .build()
///     .unwrap();
///
/// assert_eq!(views.config().suffix, ".html");
/// assert!(views.layouts().contains("page"));
/// assert!(!views.is_cache_enabled());
/// ```
pub struct ViewManagerBuilder {
    source: Arc<dyn SourceProvider>,
    config: ViewConfig,
    layouts: Vec<Layout>,
    engine: Option<Box<dyn TemplateEngine>>,
    cache: Option<Arc<TemplateCache>>,
    cache_enabled: Option<bool>,
    hooks: Hooks,
}

impl ViewManagerBuilder {
    fn new(source: Arc<dyn SourceProvider>) -> Self {
        Self {
            source,
            config: ViewConfig::default(),
            layouts: Vec::new(),
            engine: None,
            cache: None,
            cache_enabled: None,
            hooks: Hooks::new(),
        }
    }

    /// Replaces the whole configuration.
    ///
    /// Call this first; later builder calls refine it.
    pub fn config(mut self, config: ViewConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the path prefix of all views.
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.config.base = base.into();
        self
    }

    /// Sets the theme directory.
    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.config.theme = Some(theme.into());
        self
    }

    /// Sets the default layout name.
    pub fn default_layout(mut self, name: impl Into<String>) -> Self {
        self.config.default_layout = name.into();
        self
    }

    /// Sets the layouts directory.
    pub fn layouts_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.layouts_dir = dir.into();
        self
    }

    /// Sets the partials directory.
    pub fn partials_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.partials_dir = dir.into();
        self
    }

    /// Sets whether the partials directory is nested in the layouts directory.
    pub fn partials_in_layouts_dir(mut self, nested: bool) -> Self {
        self.config.partials_in_layouts_dir = nested;
        self
    }

    /// Sets the file suffix.
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.suffix = suffix.into();
        self
    }

    /// Sets the expression delimiters.
    pub fn delimiters(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.config.delimiters = Delimiters::new(left, right);
        self
    }

    /// Enables or disables caching.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    /// Uses a cache shared with other managers.
    pub fn shared_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the template engine.
    pub fn engine(mut self, engine: impl TemplateEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    /// Registers a layout.
    pub fn layout<I, S>(mut self, name: impl Into<String>, partials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layouts.push(Layout::new(name, partials));
        self
    }

    /// Adds a global template function.
    pub fn function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> Result<serde_json::Value, String> + Send + Sync + 'static,
    {
        self.config.functions.insert(name, f);
        self
    }

    /// Appends a before-render listener.
    pub fn before_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&RenderEvent<'_>, &mut dyn Write) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.on_before_render(f);
        self
    }

    /// Appends an after-render listener.
    pub fn after_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&RenderEvent<'_>, &mut dyn Write) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.on_after_render(f);
        self
    }

    /// Validates the configuration and builds the manager.
    pub fn build(self) -> Result<ViewManager, ConfigError> {
        let mut config = self.config;
        if let Some(enabled) = self.cache_enabled {
            config.cache = enabled;
        }
        config.validate()?;

        let mut manager = ViewManager::from_parts(self.source, config);
        for layout in self.layouts {
            manager.layouts.insert(layout);
        }
        if let Some(engine) = self.engine {
            manager.engine = engine;
        }
        if let Some(cache) = self.cache {
            if let Some(enabled) = self.cache_enabled {
                cache.set_enabled(enabled);
            }
            manager.cache = cache;
        }
        manager.hooks = self.hooks;
        Ok(manager)
    }
}

impl fmt::Debug for ViewManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewManagerBuilder")
            .field("config", &self.config)
            .field("layouts", &self.layouts)
            .field("hooks", &self.hooks)
            .finish()
    }
}
