//! Temporary image previews.
//!
//! A preview is registered when an image is submitted and lives until its
//! [`PreviewGuard`] is dropped, which happens when the identification flow
//! ends, however it ends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEME: &str = "preview://";

/// What the UI can show about a live preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewInfo {
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    entries: Mutex<HashMap<String, PreviewInfo>>,
}

#[derive(Debug, Clone, Default)]
pub struct PreviewStore {
    inner: Arc<Inner>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a preview and return the guard that owns it
    pub fn create(&self, filename: &str, size: u64) -> PreviewGuard {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = format!("{SCHEME}{id}/{filename}");
        self.entries().insert(
            url.clone(),
            PreviewInfo {
                filename: filename.to_string(),
                size,
            },
        );
        tracing::debug!(%url, size, "preview created");
        PreviewGuard {
            store: self.clone(),
            url,
        }
    }

    pub fn resolve(&self, url: &str) -> Option<PreviewInfo> {
        self.entries().get(url).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    fn revoke(&self, url: &str) {
        if self.entries().remove(url).is_some() {
            tracing::debug!(%url, "preview revoked");
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, PreviewInfo>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Filename embedded in a preview URL; still readable after revocation
pub fn filename_from_url(url: &str) -> Option<&str> {
    url.strip_prefix(SCHEME)?.split_once('/').map(|(_, name)| name)
}

/// Revokes its preview on drop
#[derive(Debug)]
pub struct PreviewGuard {
    store: PreviewStore,
    url: String,
}

impl PreviewGuard {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for PreviewGuard {
    fn drop(&mut self) {
        self.store.revoke(&self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_revokes_on_drop() {
        let store = PreviewStore::new();
        let guard = store.create("robin.jpg", 2048);
        let url = guard.url().to_string();

        assert_eq!(
            store.resolve(&url),
            Some(PreviewInfo {
                filename: "robin.jpg".to_string(),
                size: 2048
            })
        );

        drop(guard);
        assert_eq!(store.resolve(&url), None);
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_urls_are_unique() {
        let store = PreviewStore::new();
        let a = store.create("same.png", 1);
        let b = store.create("same.png", 1);
        assert_ne!(a.url(), b.url());
        assert_eq!(store.live_count(), 2);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("preview://7/blue jay.png"), Some("blue jay.png"));
        assert_eq!(filename_from_url("https://example.com/x.png"), None);
    }
}
