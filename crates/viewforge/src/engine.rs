//! Template engine abstraction.
//!
//! This module defines the [`TemplateEngine`] trait, the seam between view
//! composition and template evaluation. Composition decides *which* sources
//! make up a view and in what order; the engine turns that ordered list into a
//! [`CompiledTemplate`] and executes it against data. The default
//! implementation is [`MiniJinjaEngine`].
//!
//! # Conventions
//!
//! An engine receives the sources in composition order:
//!
//! ```text
//! layouts/main            <- entry point, executed on render
//! layouts/partials/head
//! layouts/partials/footer
//! site/index              <- the view
//! ```
//!
//! The first source is the entry point. [`MiniJinjaEngine`] registers every
//! source under its name and exposes the view's name as the global `view`,
//! so a layout pulls the page body in with `{% include view %}` and partials
//! with `{% include "layouts/partials/head" %}`.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use minijinja::syntax::SyntaxConfig;
use minijinja::value::{Rest, Value};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior};

use crate::config::Delimiters;
use crate::error::{CompileError, ExecutionError};

/// A global function callable from templates.
///
/// Arguments and return values are JSON values so bindings stay independent
/// of the engine's own value model.
pub type TemplateFn =
    Arc<dyn Fn(&[serde_json::Value]) -> Result<serde_json::Value, String> + Send + Sync>;

/// Named global functions shared by every compiled template.
#[derive(Clone, Default)]
pub struct FunctionMap {
    functions: BTreeMap<String, TemplateFn>,
}

impl FunctionMap {
    /// Creates an empty function map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a function.
    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[serde_json::Value]) -> Result<serde_json::Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    /// Adds (or replaces) an already shared function.
    pub fn insert_shared(&mut self, name: impl Into<String>, f: TemplateFn) {
        self.functions.insert(name.into(), f);
    }

    /// Copies every function of `other` into this map, replacing duplicates.
    pub fn extend(&mut self, other: FunctionMap) {
        self.functions.extend(other.functions);
    }

    /// Returns the function registered under `name`.
    pub fn get(&self, name: &str) -> Option<&TemplateFn> {
        self.functions.get(name)
    }

    /// Returns true if a function named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Returns the number of functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if there are no functions.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Iterates over `(name, function)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TemplateFn)> {
        self.functions.iter().map(|(name, f)| (name.as_str(), f))
    }
}

impl fmt::Debug for FunctionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

/// One loaded source handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    /// Template name the source is registered under (e.g. `"layouts/main"`)
    pub name: String,
    /// Resource path it was read from (e.g. `"layouts/main.tmpl"`)
    pub path: String,
    /// The template text
    pub content: String,
}

/// Engine settings that apply to one compilation.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions<'a> {
    /// Expression delimiters
    pub delimiters: &'a Delimiters,
    /// Global functions
    pub functions: &'a FunctionMap,
}

/// An executable template produced by a [`TemplateEngine`].
///
/// Compiled templates are immutable and shared between concurrent renders.
pub trait CompiledTemplate: Send + Sync {
    /// The entry point name.
    fn name(&self) -> &str;

    /// Executes the template against `data`, writing the output to `out`.
    ///
    /// Output already written stays written if execution fails part way.
    fn execute(&self, out: &mut dyn Write, data: &serde_json::Value) -> Result<(), ExecutionError>;
}

/// A template engine that compiles ordered sources.
pub trait TemplateEngine: Send + Sync {
    /// Compiles `sources` (in composition order) into one executable.
    ///
    /// A failure names the offending source in [`CompileError::template`].
    fn compile(
        &self,
        sources: &[TemplateSource],
        options: &CompileOptions<'_>,
    ) -> Result<Arc<dyn CompiledTemplate>, CompileError>;
}

/// MiniJinja-based template engine.
///
/// Each compilation builds its own environment, so delimiters and functions
/// are fixed at compile time and a cached template never observes later
/// configuration changes.
///
/// Undefined values are strict by default: referencing a missing field is an
/// [`ExecutionError`] rather than empty output.
///
/// # Example
///
/// ```rust
/// use viewforge::{CompileOptions, Delimiters, FunctionMap, MiniJinjaEngine, TemplateEngine, TemplateSource};
/// use serde_json::json;
///
/// let engine = MiniJinjaEngine::new();
/// let sources = vec![TemplateSource {
///     name: "greeting".into(),
///     path: "greeting.tmpl".into(),
///     content: "Hello, {{ name }}!".into(),
/// }];
/// let delimiters = Delimiters::default();
/// let functions = FunctionMap::new();
/// let options = CompileOptions { delimiters: &delimiters, functions: &functions };
///
/// let template = engine.compile(&sources, &options).unwrap();
/// let mut out: Vec<u8> = Vec::new();
/// template.execute(&mut out, &json!({"name": "World"})).unwrap();
/// assert_eq!(out, b"Hello, World!");
/// ```
#[derive(Debug, Clone)]
pub struct MiniJinjaEngine {
    undefined: UndefinedBehavior,
    html_escape: bool,
}

impl MiniJinjaEngine {
    /// Creates an engine with strict undefined handling and no auto-escaping.
    pub fn new() -> Self {
        Self {
            undefined: UndefinedBehavior::Strict,
            html_escape: false,
        }
    }

    /// Sets how undefined values behave.
    pub fn with_undefined_behavior(mut self, behavior: UndefinedBehavior) -> Self {
        self.undefined = behavior;
        self
    }

    /// Enables HTML auto-escaping of every expression.
    pub fn with_html_escape(mut self, enabled: bool) -> Self {
        self.html_escape = enabled;
        self
    }

    fn environment(
        &self,
        entry: &str,
        view: &str,
        options: &CompileOptions<'_>,
    ) -> Result<Environment<'static>, CompileError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(self.undefined);
        if self.html_escape {
            env.set_auto_escape_callback(|_| AutoEscape::Html);
        }

        if !options.delimiters.is_default() {
            let syntax = SyntaxConfig::builder()
                .variable_delimiters(
                    options.delimiters.left.clone(),
                    options.delimiters.right.clone(),
                )
                .build()
                .map_err(|e| CompileError::new(entry, e.to_string()))?;
            env.set_syntax(syntax);
        }

        register_functions(&mut env, options.functions);
        env.add_global("view", Value::from(view.to_string()));
        Ok(env)
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn compile(
        &self,
        sources: &[TemplateSource],
        options: &CompileOptions<'_>,
    ) -> Result<Arc<dyn CompiledTemplate>, CompileError> {
        let (entry, view) = match (sources.first(), sources.last()) {
            (Some(first), Some(last)) => (first.name.clone(), last.name.clone()),
            _ => return Err(CompileError::new("", "no template sources to compile")),
        };

        let mut env = self.environment(&entry, &view, options)?;
        for source in sources {
            env.add_template_owned(source.name.clone(), source.content.clone())
                .map_err(|e| CompileError::new(source.name.clone(), e.to_string()))?;
        }

        Ok(Arc::new(MiniJinjaTemplate { env, entry }))
    }
}

/// A compiled MiniJinja environment with a fixed entry point.
struct MiniJinjaTemplate {
    env: Environment<'static>,
    entry: String,
}

impl CompiledTemplate for MiniJinjaTemplate {
    fn name(&self) -> &str {
        &self.entry
    }

    fn execute(&self, out: &mut dyn Write, data: &serde_json::Value) -> Result<(), ExecutionError> {
        let template = self
            .env
            .get_template(&self.entry)
            .map_err(|e| ExecutionError::new(self.entry.clone(), e.to_string()))?;
        template
            .render_to_write(data, &mut *out)
            .map_err(|e| ExecutionError::new(self.entry.clone(), e.to_string()))?;
        Ok(())
    }
}

/// Exposes every binding of `functions` as a MiniJinja global function.
pub fn register_functions(env: &mut Environment<'static>, functions: &FunctionMap) {
    for (name, f) in functions.iter() {
        let f = Arc::clone(f);
        env.add_function(name.to_string(), move |args: Rest<Value>| -> Result<Value, Error> {
            let args = args
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| Error::new(ErrorKind::BadSerialization, e.to_string()))?;
            let result = f(&args).map_err(|msg| Error::new(ErrorKind::InvalidOperation, msg))?;
            Ok(Value::from_serialize(&result))
        });
    }
}
