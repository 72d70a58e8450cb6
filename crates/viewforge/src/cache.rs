//! Compiled template cache.
//!
//! The cache maps a [`CompositionKey`] (layout name or none, view name) to the
//! shared [`CompiledTemplate`] built for it. It is unbounded and never evicts;
//! entries only change by being replaced wholesale.
//!
//! # Concurrency
//!
//! Each key owns a slot holding a once-set value and a composition lock:
//!
//! - A hit reads the slot's value without taking any lock beyond the map's
//!   shard read lock.
//! - A miss takes the slot's composition lock, so concurrent misses on the
//!   same key compose exactly once and the others wait for that result.
//! - Misses on different keys never wait on each other.
//!
//! A composition that fails stores nothing and drops its empty slot; the next
//! request retries.
//!
//! [`put`](TemplateCache::put) and [`clear`](TemplateCache::clear) replace or
//! drop slots without waiting for compositions in flight. A composition
//! running across one of those calls fills a slot that is no longer in the
//! map, so a later miss on the same key composes again. Without them, each
//! key composes at most once.
//!
//! # Disabled Mode
//!
//! With caching off, [`get`](TemplateCache::get) always misses,
//! [`put`](TemplateCache::put) is a no-op, and every render recompiles. This
//! is the development setting: sources are always fresh.
//!
//! The cache key does not cover delimiters, functions or file contents.
//! Changing those after a key is cached does not invalidate it; call
//! [`clear`](TemplateCache::clear) for that.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use dashmap::DashMap;

use crate::engine::CompiledTemplate;

/// Identity of one cacheable composition.
///
/// Two keys are equal iff both the layout and the view names match exactly.
/// No normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositionKey {
    /// Layout name, or `None` for a view rendered on its own
    pub layout: Option<String>,
    /// View name
    pub view: String,
}

impl CompositionKey {
    /// Creates a key.
    pub fn new(layout: Option<&str>, view: &str) -> Self {
        Self {
            layout: layout.map(str::to_string),
            view: view.to_string(),
        }
    }
}

impl fmt::Display for CompositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.layout {
            Some(layout) => write!(f, "{} + {}", layout, self.view),
            None => write!(f, "{}", self.view),
        }
    }
}

#[derive(Default)]
struct Slot {
    value: OnceLock<Arc<dyn CompiledTemplate>>,
    compose: Mutex<()>,
}

impl Slot {
    fn filled(template: Arc<dyn CompiledTemplate>) -> Self {
        Self {
            value: OnceLock::from(template),
            compose: Mutex::new(()),
        }
    }
}

/// Thread-safe cache of compiled templates.
///
/// Share one cache between several managers by wrapping it in an [`Arc`] and
/// passing it to [`ViewManager::with_cache`](crate::ViewManager::with_cache).
pub struct TemplateCache {
    enabled: AtomicBool,
    entries: DashMap<CompositionKey, Arc<Slot>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TemplateCache {
    /// Creates an empty cache.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            entries: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Returns true if caching is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turns caching on or off. Existing entries are kept.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Returns the cached template for `key`.
    ///
    /// Always `None` while caching is off. Repeated calls return the same
    /// shared artifact, never a copy.
    pub fn get(&self, key: &CompositionKey) -> Option<Arc<dyn CompiledTemplate>> {
        if !self.is_enabled() {
            return None;
        }
        self.entries.get(key).and_then(|slot| slot.value.get().cloned())
    }

    /// Stores `template` under `key`, replacing any previous entry.
    ///
    /// No-op while caching is off.
    pub fn put(&self, key: CompositionKey, template: Arc<dyn CompiledTemplate>) {
        if !self.is_enabled() {
            return;
        }
        self.entries.insert(key, Arc::new(Slot::filled(template)));
    }

    /// Returns the cached template for `key`, composing it on a miss.
    ///
    /// With caching on, `compose` runs at most once per key across all
    /// threads, unless it fails. With caching off it runs on every call and
    /// the result is not stored.
    pub fn get_or_try_insert_with<F, E>(
        &self,
        key: &CompositionKey,
        compose: F,
    ) -> Result<Arc<dyn CompiledTemplate>, E>
    where
        F: FnOnce() -> Result<Arc<dyn CompiledTemplate>, E>,
    {
        if !self.is_enabled() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return compose();
        }

        if let Some(template) = self.get(key) {
            tracing::trace!(key = %key, "template cache hit");
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(template);
        }

        let slot = Arc::clone(self.entries.entry(key.clone()).or_default().value());
        let _composing = slot.compose.lock().unwrap_or_else(|e| e.into_inner());

        // Another thread may have filled the slot while we waited.
        if let Some(template) = slot.value.get() {
            tracing::trace!(key = %key, "template cache hit after wait");
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(template));
        }

        tracing::debug!(key = %key, "template cache miss");
        self.misses.fetch_add(1, Ordering::Relaxed);
        let template = match compose() {
            Ok(template) => template,
            Err(err) => {
                self.entries.remove_if(key, |_, current| {
                    Arc::ptr_eq(current, &slot) && current.value.get().is_none()
                });
                return Err(err);
            }
        };
        let stored = slot.value.get_or_init(|| Arc::clone(&template));
        Ok(Arc::clone(stored))
    }

    /// Removes every entry and resets the statistics.
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Returns the number of stored templates.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().value.get().is_some())
            .count()
    }

    /// Returns true if no template is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `(hits, misses)` counted by
    /// [`get_or_try_insert_with`](Self::get_or_try_insert_with).
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateCache")
            .field("enabled", &self.is_enabled())
            .field("len", &self.len())
            .finish()
    }
}
