//! Template source providers.
//!
//! A [`SourceProvider`] is the minimal read contract the composer needs:
//! "open this path, give me its bytes, or tell me it is not there". Anything
//! that can satisfy it is pluggable without touching the rest of the crate.
//!
//! Three providers are built in:
//!
//! - [`DirSource`]: files under a root directory on the local disk
//! - [`EmbeddedSource`]: `(path, content)` pairs baked into the binary, with
//!   optional hot reload from disk in debug builds
//! - [`MemorySource`]: a mutable in-memory map, handy for tests and
//!   programmatically generated templates
//!
//! # Embedding
//!
//! ```rust
//! use viewforge::{EmbeddedSource, SourceProvider};
//!
//! static VIEWS: &[(&str, &str)] = &[
//!     ("layouts/main.tmpl", "<body>{% include view %}</body>"),
//!     ("site/index.tmpl", "<h1>Hello</h1>"),
//! ];
//!
//! let source = EmbeddedSource::new(VIEWS);
//! assert!(source.read_to_string("site/index.tmpl").is_ok());
//! assert!(source.open("site/missing.tmpl").unwrap_err().is_not_found());
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::SourceError;

/// Read access to template sources.
pub trait SourceProvider: Send + Sync {
    /// Returns the bytes stored at `path`.
    fn open(&self, path: &str) -> Result<Vec<u8>, SourceError>;

    /// Returns the content at `path` as UTF-8 text.
    fn read_to_string(&self, path: &str) -> Result<String, SourceError> {
        let bytes = self.open(path)?;
        String::from_utf8(bytes).map_err(|_| SourceError::InvalidUtf8 {
            path: path.to_string(),
        })
    }
}

impl<T: SourceProvider + ?Sized> SourceProvider for &T {
    fn open(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        (**self).open(path)
    }
}

impl<T: SourceProvider + ?Sized> SourceProvider for Box<T> {
    fn open(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        (**self).open(path)
    }
}

impl<T: SourceProvider + ?Sized> SourceProvider for Arc<T> {
    fn open(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        (**self).open(path)
    }
}

/// Strips leading slashes and rejects anything that is not a plain relative
/// path (`..`, drive prefixes, root components).
fn relative_path(path: &str) -> Result<&Path, SourceError> {
    let relative = Path::new(path.trim_start_matches('/'));
    let plain = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !plain || relative.as_os_str().is_empty() {
        return Err(SourceError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(relative)
}

/// Files under a root directory.
///
/// Paths are always taken relative to the root, whether or not they start
/// with `/`. Paths that would leave the root are rejected with
/// [`SourceError::InvalidPath`].
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Creates a provider rooted at `root`.
    ///
    /// The directory is not checked here; missing files are reported by
    /// [`open`](SourceProvider::open).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SourceProvider for DirSource {
    fn open(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        let full = self.root.join(relative_path(path)?);
        std::fs::read(&full).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SourceError::not_found(path)
            } else {
                SourceError::Io { path: full, source }
            }
        })
    }
}

/// Sources compiled into the binary.
///
/// Entries are `(path, content)` pairs, typically produced with
/// `include_str!`. When a source directory is attached with
/// [`with_source_dir`](Self::with_source_dir) and the binary is a debug build,
/// reads go to that directory instead, so template edits show up without a
/// rebuild.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedSource {
    entries: &'static [(&'static str, &'static str)],
    source_dir: Option<&'static str>,
}

impl EmbeddedSource {
    /// Creates a provider over embedded entries.
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            entries,
            source_dir: None,
        }
    }

    /// Attaches the directory the entries were embedded from.
    pub const fn with_source_dir(self, dir: &'static str) -> Self {
        Self {
            entries: self.entries,
            source_dir: Some(dir),
        }
    }

    /// Returns the embedded entries.
    pub fn entries(&self) -> &'static [(&'static str, &'static str)] {
        self.entries
    }

    /// Returns the attached source directory, if any.
    pub fn source_dir(&self) -> Option<&'static str> {
        self.source_dir
    }

    /// Returns true if reads are served from disk.
    ///
    /// Hot reload is active when:
    /// - We're in debug mode (`debug_assertions` enabled)
    /// - A source directory is attached and exists on disk
    pub fn should_hot_reload(&self) -> bool {
        cfg!(debug_assertions) && self.source_dir.is_some_and(|dir| Path::new(dir).is_dir())
    }
}

impl SourceProvider for EmbeddedSource {
    fn open(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        if let (true, Some(dir)) = (self.should_hot_reload(), self.source_dir) {
            return DirSource::new(dir).open(path);
        }

        let wanted = path.trim_start_matches('/');
        self.entries
            .iter()
            .find(|(name, _)| name.trim_start_matches('/') == wanted)
            .map(|(_, content)| content.as_bytes().to_vec())
            .ok_or_else(|| SourceError::not_found(path))
    }
}

/// A mutable in-memory source store.
///
/// Interior locking lets a shared provider be edited while managers hold it.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySource {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file and returns the store, for chained construction.
    pub fn with(self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        let path = path.into().trim_start_matches('/').to_string();
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.insert(path, content.into());
    }

    /// Removes a file, returning its previous content.
    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.remove(path.trim_start_matches('/'))
    }

    /// Returns the number of stored files.
    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns true if no files are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SourceProvider for MemorySource {
    fn open(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files
            .get(path.trim_start_matches('/'))
            .cloned()
            .ok_or_else(|| SourceError::not_found(path))
    }
}

impl<P, C> FromIterator<(P, C)> for MemorySource
where
    P: Into<String>,
    C: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let source = MemorySource::new();
        for (path, content) in iter {
            source.insert(path, content);
        }
        source
    }
}
