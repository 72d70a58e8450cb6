//! Error types for view resolution and rendering.
//!
//! [`ViewError`] is the only error returned by the render entry points of
//! [`ViewManager`](crate::ViewManager). Each variant corresponds to the stage
//! of the pipeline that failed:
//!
//! | Variant | Stage | Retryable |
//! |---------|-------|-----------|
//! | [`ViewError::UnknownLayout`] | resolution | no, fix the registry |
//! | [`ViewError::SourceUnavailable`] | composition | no, fix the source store |
//! | [`ViewError::Compile`] | composition | no, fix the template |
//! | [`ViewError::InvalidData`] | before hooks | no, fix the data type |
//! | [`ViewError::Hook`] | before/after hooks | caller-defined |
//! | [`ViewError::Execution`] | execution | no, for the same data |
//!
//! Nothing is suppressed or retried internally. How a failure is presented
//! (an HTTP 500, a log line, a CLI message) is up to the caller.

use std::path::PathBuf;

use thiserror::Error;

use crate::hooks::HookError;

/// Error type for every render operation.
#[derive(Debug, Error)]
pub enum ViewError {
    /// A render requested a layout that was never registered.
    #[error("no such layout \"{name}\"")]
    UnknownLayout {
        /// The requested layout name
        name: String,
    },

    /// A file needed by the composition could not be read.
    #[error("template source \"{path}\" is unavailable: {source}")]
    SourceUnavailable {
        /// The resolved resource path
        path: String,
        /// Why the source provider failed
        #[source]
        source: SourceError,
    },

    /// A source was found but failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The render data could not be converted into template values.
    #[error("invalid render data: {0}")]
    InvalidData(#[from] serde_json::Error),

    /// A before-render or after-render listener failed.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The compiled template failed while executing against the data.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl ViewError {
    /// Returns true if this error came from a missing layout registration.
    pub fn is_unknown_layout(&self) -> bool {
        matches!(self, ViewError::UnknownLayout { .. })
    }

    /// Returns true if this error came from the source provider.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, ViewError::SourceUnavailable { .. })
    }
}

/// Error returned by a [`SourceProvider`](crate::SourceProvider).
#[derive(Debug, Error)]
pub enum SourceError {
    /// No resource exists at the path.
    #[error("not found: {path}")]
    NotFound {
        /// The requested path
        path: String,
    },

    /// The path is not acceptable to the provider (for example it escapes
    /// the provider's root directory).
    #[error("invalid path: {path}")]
    InvalidPath {
        /// The requested path
        path: String,
    },

    /// The resource exists but is not valid UTF-8 text.
    #[error("not valid UTF-8: {path}")]
    InvalidUtf8 {
        /// The requested path
        path: String,
    },

    /// Reading the resource failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The filesystem path that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    /// Creates a not-found error for `path`.
    pub fn not_found(path: impl Into<String>) -> Self {
        SourceError::NotFound { path: path.into() }
    }

    /// Returns true if the resource simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound { .. })
    }
}

/// Template syntax error or other compile-time failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to compile template \"{template}\": {message}")]
pub struct CompileError {
    /// Name of the source that failed to compile
    pub template: String,
    /// Engine-provided description
    pub message: String,
}

impl CompileError {
    /// Creates a compile error for the named source.
    pub fn new(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            message: message.into(),
        }
    }
}

/// Failure while evaluating a compiled template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to execute template \"{template}\": {message}")]
pub struct ExecutionError {
    /// Name of the compiled template (its entry point)
    pub template: String,
    /// Engine-provided description
    pub message: String,
}

impl ExecutionError {
    /// Creates an execution error for the named template.
    pub fn new(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            message: message.into(),
        }
    }
}
