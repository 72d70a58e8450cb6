//! Hook system for before/after render listeners.
//!
//! Hooks let callers run code around template execution without touching
//! templates: authorization checks, response headers, telemetry, output
//! framing.
//!
//! # Pipeline Position
//!
//! ```text
//! render(layout, view, data)
//!   → resolve compiled template (cache or compose)
//!   → BEFORE-RENDER HOOKS ← (validation, auth checks, preamble)
//!   → execute template into the writer
//!   → AFTER-RENDER HOOKS ← (trailers, logging, metrics)
//! ```
//!
//! # Semantics
//!
//! - Listeners run in registration order.
//! - The first failing listener stops the phase; later listeners do not run
//!   and its [`HookError`] becomes the result of the render.
//! - A failing before-render listener also prevents execution, so nothing is
//!   written by the template.
//! - An after-render failure is reported even though output has already been
//!   written. Callers that need all-or-nothing output should render into a
//!   buffer first.
//! - Resolution failures (unknown layout, missing source, compile error)
//!   happen before any hook runs.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use thiserror::Error;

/// The phase at which a hook error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// Error occurred before template execution
    BeforeRender,
    /// Error occurred after template execution
    AfterRender,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::BeforeRender => write!(f, "before-render"),
            HookPhase::AfterRender => write!(f, "after-render"),
        }
    }
}

/// Error returned by a hook.
#[derive(Debug, Error)]
#[error("hook error ({phase}): {message}")]
pub struct HookError {
    /// Human-readable error message
    pub message: String,
    /// The hook phase where the error occurred
    pub phase: HookPhase,
    /// The underlying error source, if any
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl HookError {
    /// Creates a new hook error for the before-render phase.
    pub fn before_render(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            phase: HookPhase::BeforeRender,
            source: None,
        }
    }

    /// Creates a new hook error for the after-render phase.
    pub fn after_render(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            phase: HookPhase::AfterRender,
            source: None,
        }
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        self.source = Some(source.into());
        self
    }
}

/// What is being rendered, as seen by a listener.
#[derive(Debug, Clone, Copy)]
pub struct RenderEvent<'a> {
    /// The layout, or `None` for a view rendered on its own
    pub layout: Option<&'a str>,
    /// The view name
    pub view: &'a str,
    /// The render data, as handed to the template
    pub data: &'a serde_json::Value,
}

/// Type alias for before-render hook functions.
///
/// Listeners receive the event and the output writer; anything they write
/// lands before the template output.
pub type BeforeRenderFn =
    Arc<dyn Fn(&RenderEvent<'_>, &mut dyn Write) -> Result<(), HookError> + Send + Sync>;

/// Type alias for after-render hook functions.
pub type AfterRenderFn =
    Arc<dyn Fn(&RenderEvent<'_>, &mut dyn Write) -> Result<(), HookError> + Send + Sync>;

/// Ordered before/after render listeners.
///
/// Registration is append-only.
#[derive(Clone, Default)]
pub struct Hooks {
    before_render: Vec<BeforeRenderFn>,
    after_render: Vec<AfterRenderFn>,
}

impl Hooks {
    /// Creates a new empty hooks configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.before_render.is_empty() && self.after_render.is_empty()
    }

    /// Adds a before-render hook (builder form).
    ///
    /// # Example
    ///
    /// ```rust
    /// use viewforge::{HookError, Hooks};
    ///
    /// let hooks = Hooks::new().before_render(|event, _out| {
    ///     if event.view.starts_with("admin/") {
    ///         return Err(HookError::before_render("forbidden"));
    ///     }
    ///     Ok(())
    /// });
    /// ```
    pub fn before_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&RenderEvent<'_>, &mut dyn Write) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_before_render(f);
        self
    }

    /// Adds an after-render hook (builder form).
    pub fn after_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&RenderEvent<'_>, &mut dyn Write) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_after_render(f);
        self
    }

    /// Appends a before-render hook.
    pub fn on_before_render<F>(&mut self, f: F)
    where
        F: Fn(&RenderEvent<'_>, &mut dyn Write) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.before_render.push(Arc::new(f));
    }

    /// Appends an after-render hook.
    pub fn on_after_render<F>(&mut self, f: F)
    where
        F: Fn(&RenderEvent<'_>, &mut dyn Write) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.after_render.push(Arc::new(f));
    }

    /// Runs all before-render hooks, stopping at the first failure.
    pub fn run_before_render(
        &self,
        event: &RenderEvent<'_>,
        out: &mut dyn Write,
    ) -> Result<(), HookError> {
        for hook in &self.before_render {
            hook(event, out)?;
        }
        Ok(())
    }

    /// Runs all after-render hooks, stopping at the first failure.
    pub fn run_after_render(
        &self,
        event: &RenderEvent<'_>,
        out: &mut dyn Write,
    ) -> Result<(), HookError> {
        for hook in &self.after_render {
            hook(event, out)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_render_count", &self.before_render.len())
            .field("after_render_count", &self.after_render.len())
            .finish()
    }
}
