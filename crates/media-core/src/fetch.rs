//! Resource fetching, temporary object URLs, and image decoding.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lapse_common::error::LapseResult;

use crate::surface::DecodedImage;

/// Request mode, mirroring the fetch standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Cors,
    NoCors,
    SameOrigin,
}

/// Whether credentials (cookies, auth headers) accompany a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials {
    Omit,
    SameOrigin,
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub mode: RequestMode,
    pub credentials: Credentials,
}

impl FetchOptions {
    /// CORS request without credentials, used for frames and music.
    pub const ANONYMOUS_CORS: Self = Self {
        mode: RequestMode::Cors,
        credentials: Credentials::Omit,
    };
}

/// Raw fetched bytes with their declared content type.
#[derive(Debug, Clone)]
pub struct Blob {
    bytes: Arc<[u8]>,
    content_type: Option<String>,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Fetches remote or local resources as blobs.
#[async_trait::async_trait]
pub trait AssetFetcher: Send + Sync + fmt::Debug {
    async fn fetch(&self, url: &str, options: FetchOptions) -> LapseResult<Blob>;
}

/// Cross-origin attribute used by the direct image loading strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossOrigin {
    Anonymous,
    UseCredentials,
}

/// Decodes blob bytes into a drawable image.
#[async_trait::async_trait]
pub trait ImageDecoder: Send + Sync + fmt::Debug {
    async fn decode(&self, blob: Blob) -> LapseResult<DecodedImage>;
}

/// Loads an image straight from its URL, without an intermediate blob.
#[async_trait::async_trait]
pub trait DirectImageLoader: Send + Sync + fmt::Debug {
    async fn load(&self, url: &str, cross_origin: CrossOrigin) -> LapseResult<DecodedImage>;
}

/// A temporary local reference to an in-memory blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of live object URLs. Every created URL must be revoked.
pub trait ObjectUrlStore: Send + Sync + fmt::Debug {
    fn create(&self, blob: Blob) -> ObjectUrl;

    fn resolve(&self, url: &ObjectUrl) -> Option<Blob>;

    /// Release the URL. Returns `false` if it was not live.
    fn revoke(&self, url: &ObjectUrl) -> bool;

    /// Number of URLs created and not yet revoked.
    fn outstanding(&self) -> usize;
}

/// Process-local object URL store.
#[derive(Debug, Default)]
pub struct MemoryObjectUrls {
    entries: Mutex<HashMap<ObjectUrl, Blob>>,
    next_id: AtomicU64,
}

impl MemoryObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectUrl, Blob>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObjectUrlStore for MemoryObjectUrls {
    fn create(&self, blob: Blob) -> ObjectUrl {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = ObjectUrl(format!("blob:lapse/{id}"));
        self.entries().insert(url.clone(), blob);
        url
    }

    fn resolve(&self, url: &ObjectUrl) -> Option<Blob> {
        self.entries().get(url).cloned()
    }

    fn revoke(&self, url: &ObjectUrl) -> bool {
        self.entries().remove(url).is_some()
    }

    fn outstanding(&self) -> usize {
        self.entries().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_urls_resolve_until_revoked() {
        let store = MemoryObjectUrls::new();
        let a = store.create(Blob::new(vec![1, 2, 3], Some("image/png".into())));
        let b = store.create(Blob::new(vec![4], None));
        assert_ne!(a, b);
        assert_eq!(store.outstanding(), 2);

        let blob = store.resolve(&a).unwrap();
        assert_eq!(blob.bytes(), &[1, 2, 3]);
        assert_eq!(blob.content_type(), Some("image/png"));

        assert!(store.revoke(&a));
        assert!(!store.revoke(&a));
        assert!(store.resolve(&a).is_none());
        assert_eq!(store.outstanding(), 1);
    }
}
