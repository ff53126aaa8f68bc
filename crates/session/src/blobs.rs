//! Object references handed to the presentation layer.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Opaque reference to published bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobUrl(String);

impl BlobUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publishes bytes under a URL and revokes them later.
///
/// Every published URL must be revoked once superseded or the store grows
/// without bound across record/convert cycles.
pub trait BlobStore: Send + Sync {
    fn publish(&self, bytes: Arc<[u8]>, mime: &str) -> BlobUrl;

    fn revoke(&self, url: &BlobUrl);
}

#[derive(Debug)]
struct Blob {
    bytes: Arc<[u8]>,
    mime: String,
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    next_id: AtomicU64,
    blobs: Mutex<HashMap<BlobUrl, Blob>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of URLs currently published.
    pub fn live_count(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn get(&self, url: &BlobUrl) -> Option<(Arc<[u8]>, String)> {
        let blobs = self.blobs.lock().ok()?;
        blobs
            .get(url)
            .map(|blob| (Arc::clone(&blob.bytes), blob.mime.clone()))
    }
}

impl BlobStore for InMemoryBlobStore {
    fn publish(&self, bytes: Arc<[u8]>, mime: &str) -> BlobUrl {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = BlobUrl::new(format!("blob:gifnew/{id}"));
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(
                url.clone(),
                Blob {
                    bytes,
                    mime: mime.to_string(),
                },
            );
        }
        url
    }

    fn revoke(&self, url: &BlobUrl) {
        if let Ok(mut blobs) = self.blobs.lock() {
            if blobs.remove(url).is_none() {
                tracing::debug!(url = %url, "Revoking unknown blob");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_revoke() {
        let store = InMemoryBlobStore::new();
        let a = store.publish(Arc::from(vec![1u8, 2]), "video/webm");
        let b = store.publish(Arc::from(vec![3u8]), "image/gif");
        assert_ne!(a, b);
        assert_eq!(store.live_count(), 2);
        assert_eq!(store.get(&b).map(|(_, mime)| mime), Some("image/gif".into()));

        store.revoke(&a);
        store.revoke(&a);
        assert_eq!(store.live_count(), 1);
        assert!(store.get(&a).is_none());
    }
}
