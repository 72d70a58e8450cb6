//! View composition.
//!
//! The [`Composer`] turns a `(layout, view)` request into a compiled template
//! in three steps:
//!
//! 1. **Plan**: look up the layout and resolve the ordered file list,
//!    `[layout, partials...] + view`, or just `[view]` without a layout.
//!    An unregistered layout fails here, before any read.
//! 2. **Load**: read every file through the
//!    [`SourceProvider`](crate::SourceProvider), stopping at the first one
//!    that cannot be read.
//! 3. **Compile**: hand the loaded sources, delimiters and functions to the
//!    [`TemplateEngine`](crate::TemplateEngine).
//!
//! The composer reads sources and nothing else; caching is the caller's job.

use std::sync::Arc;

use crate::config::ViewConfig;
use crate::engine::{CompileOptions, CompiledTemplate, TemplateEngine, TemplateSource};
use crate::error::ViewError;
use crate::layout::LayoutRegistry;
use crate::resolve::{resolve_file, ResolvedFile, Role};
use crate::source::SourceProvider;

/// Composes views from configuration, layouts, sources and an engine.
#[derive(Clone, Copy)]
pub struct Composer<'a> {
    config: &'a ViewConfig,
    layouts: &'a LayoutRegistry,
    source: &'a dyn SourceProvider,
    engine: &'a dyn TemplateEngine,
}

impl<'a> Composer<'a> {
    /// Creates a composer over borrowed collaborators.
    pub fn new(
        config: &'a ViewConfig,
        layouts: &'a LayoutRegistry,
        source: &'a dyn SourceProvider,
        engine: &'a dyn TemplateEngine,
    ) -> Self {
        Self {
            config,
            layouts,
            source,
            engine,
        }
    }

    /// Resolves the ordered file list for a composition without reading
    /// anything.
    pub fn plan(&self, layout: Option<&str>, view: &str) -> Result<Vec<ResolvedFile>, ViewError> {
        let mut files = Vec::new();
        if let Some(name) = layout {
            let layout = self
                .layouts
                .get(name)
                .ok_or_else(|| ViewError::UnknownLayout {
                    name: name.to_string(),
                })?;
            files.reserve(layout.partials.len() + 2);
            files.push(resolve_file(Role::Layout, &layout.name, self.config));
            files.extend(
                layout
                    .partials
                    .iter()
                    .map(|partial| resolve_file(Role::Partial, partial, self.config)),
            );
        }
        files.push(resolve_file(Role::View, view, self.config));
        Ok(files)
    }

    /// Reads every planned file, failing on the first unreadable one.
    pub fn load(&self, files: &[ResolvedFile]) -> Result<Vec<TemplateSource>, ViewError> {
        files
            .iter()
            .map(|file| {
                tracing::trace!(role = %file.role, path = %file.path, "loading template source");
                let content = self.source.read_to_string(&file.path).map_err(|source| {
                    ViewError::SourceUnavailable {
                        path: file.path.clone(),
                        source,
                    }
                })?;
                Ok(TemplateSource {
                    name: file.template_name.clone(),
                    path: file.path.clone(),
                    content,
                })
            })
            .collect()
    }

    /// Plans, loads and compiles a composition.
    pub fn compose(
        &self,
        layout: Option<&str>,
        view: &str,
    ) -> Result<Arc<dyn CompiledTemplate>, ViewError> {
        let files = self.plan(layout, view)?;
        let sources = self.load(&files)?;
        let options = CompileOptions {
            delimiters: &self.config.delimiters,
            functions: &self.config.functions,
        };
        let template = self.engine.compile(&sources, &options)?;
        tracing::debug!(
            layout = layout.unwrap_or("-"),
            view,
            files = sources.len(),
            "composed view"
        );
        Ok(template)
    }
}
