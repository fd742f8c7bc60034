use super::{ObjectStorage, ProgressFn};
use crate::error::LandShapeError;
use crate::types::{ObjectEntry, TransferProgress};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// An in-process storage backend.
///
/// Objects are kept in key order, which makes listings behave like S3. Clones share
/// the same objects, so a test can keep one handle while the client owns another.
/// Lookup and upload failures can be switched on to exercise error paths.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    chunk_size: Option<usize>,
    list_calls: AtomicUsize,
    exists_calls: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_uploads: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that reports upload progress every `chunk_size` bytes.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                chunk_size: Some(chunk_size.max(1)),
                ..Default::default()
            }),
        }
    }

    /// Stores an object directly, as the processing pipeline would.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.objects().insert(key.into(), data.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    /// Number of `list` calls made so far.
    pub fn list_calls(&self) -> usize {
        self.inner.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `exists` calls made so far.
    pub fn exists_calls(&self) -> usize {
        self.inner.exists_calls.load(Ordering::SeqCst)
    }

    /// Makes `list` and `exists` fail until switched off again.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.inner.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Makes uploads fail halfway until switched off again.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.inner.fail_uploads.store(fail, Ordering::SeqCst);
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.inner
            .objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_lookup(&self, operation: &'static str) -> Result<(), LandShapeError> {
        if self.inner.fail_lookups.load(Ordering::SeqCst) {
            return Err(LandShapeError::storage(operation, "simulated lookup failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put_resumable(
        &self,
        key: &str,
        path: &Path,
        _content_type: &str,
        progress: ProgressFn<'_>,
    ) -> Result<(), LandShapeError> {
        let data = tokio::fs::read(path).await?;
        let total = data.len() as u64;
        let chunk_size = self.inner.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        let fail_at = self
            .inner
            .fail_uploads
            .load(Ordering::SeqCst)
            .then_some(total / 2);

        let mut sent = 0u64;
        for chunk in data.chunks(chunk_size) {
            if fail_at.is_some_and(|limit| sent >= limit) {
                return Err(LandShapeError::storage("upload", "simulated transfer failure"));
            }
            sent += chunk.len() as u64;
            progress(TransferProgress {
                bytes_transferred: sent,
                bytes_total: total,
            });
            tokio::task::yield_now().await;
        }
        if fail_at.is_some() {
            return Err(LandShapeError::storage("upload", "simulated transfer failure"));
        }
        if data.is_empty() {
            progress(TransferProgress {
                bytes_transferred: 0,
                bytes_total: 0,
            });
        }

        self.objects().insert(key.to_string(), data);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, LandShapeError> {
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_lookup("list")?;

        Ok(self
            .objects()
            .iter()
            .filter(|(key, _)| {
                key.strip_prefix(prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(key, data)| ObjectEntry {
                key: key.clone(),
                size: Some(data.len() as u64),
            })
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, LandShapeError> {
        self.inner.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.check_lookup("head")?;
        Ok(self.objects().contains_key(key))
    }

    async fn download_url(&self, key: &str) -> Result<String, LandShapeError> {
        let url = url::Url::parse("memory://objects/")?.join(key)?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn lists_direct_children_of_prefix_in_key_order() {
        let storage = MemoryStorage::new();
        storage.insert("videos/b.mp4", "b");
        storage.insert("videos/a.mp4", "a");
        storage.insert("other/c.mp4", "c");
        storage.insert("videos/archive/d_model.mp4", "d");

        let keys: Vec<String> = storage
            .list("videos/")
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.key)
            .collect();

        assert_eq!(keys, vec!["videos/a.mp4", "videos/b.mp4"]);
        assert_eq!(storage.list_calls(), 1);
    }

    #[tokio::test]
    async fn upload_reports_progress_per_chunk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 10]).unwrap();

        let storage = MemoryStorage::with_chunk_size(4);
        let mut seen = Vec::new();
        storage
            .put_resumable("videos/x.mp4", file.path(), "video/mp4", &mut |p: TransferProgress| {
                seen.push(p.bytes_transferred)
            })
            .await
            .unwrap();

        assert_eq!(seen, vec![4, 8, 10]);
        assert_eq!(storage.get("videos/x.mp4").unwrap().len(), 10);
    }

    #[tokio::test]
    async fn lookup_failures_can_be_injected() {
        let storage = MemoryStorage::new();
        storage.set_fail_lookups(true);
        assert!(storage.list("videos/").await.is_err());
        assert!(storage.exists("videos/a.mp4").await.is_err());
        storage.set_fail_lookups(false);
        assert!(!storage.exists("videos/a.mp4").await.unwrap());
    }
}
