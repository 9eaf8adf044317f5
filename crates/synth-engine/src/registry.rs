//! Explicit registry of temporary object URLs created during a session.

use std::sync::Arc;

use lapse_media_core::fetch::{Blob, ObjectUrl, ObjectUrlStore};

/// Tracks every object URL a session creates so they can all be released
/// with one call.
#[derive(Debug)]
pub struct HandleRegistry {
    store: Arc<dyn ObjectUrlStore>,
    handles: Vec<ObjectUrl>,
}

impl HandleRegistry {
    pub fn new(store: Arc<dyn ObjectUrlStore>) -> Self {
        Self {
            store,
            handles: Vec::new(),
        }
    }

    /// Create an object URL for `blob` and take responsibility for it.
    pub fn register(&mut self, blob: Blob) -> ObjectUrl {
        let url = self.store.create(blob);
        self.handles.push(url.clone());
        url
    }

    pub fn resolve(&self, url: &ObjectUrl) -> Option<Blob> {
        self.store.resolve(url)
    }

    /// Handles registered and not yet released.
    pub fn outstanding(&self) -> usize {
        self.handles.len()
    }

    /// Revoke every registered handle. Safe to call repeatedly.
    pub fn release_all(&mut self) -> usize {
        let count = self.handles.len();
        for url in self.handles.drain(..) {
            if !self.store.revoke(&url) {
                tracing::warn!(url = %url, "Object URL was already revoked");
            }
        }
        if count > 0 {
            tracing::debug!(count, "Released object URLs");
        }
        count
    }
}

impl Drop for HandleRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}
