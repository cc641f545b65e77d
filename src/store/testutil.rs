//! In-memory [`ObjectStoreClient`] used by the reader/writer/resolver unit
//! tests and available to integration tests in `tests/` so they can
//! exercise the facade without a real bucket.

use super::{ByteRange, CompletedPart, ListEntry, ListPage, ObjectMeta, ObjectStoreClient};
use crate::error::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Default)]
struct PendingUpload {
    bucket: String,
    key: String,
    parts: Vec<(i32, Vec<u8>)>,
}

/// A deterministic in-memory object store. Objects and in-flight multipart
/// uploads are both held in plain maps guarded by `parking_lot::Mutex`, the
/// same lock the driver uses for its own process-global state.
pub struct MockStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    uploads: Mutex<HashMap<String, PendingUpload>>,
    aborted: Mutex<Vec<String>>,
    next_upload_id: AtomicU64,
    page_size: usize,
    fail_next_complete: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            uploads: Mutex::new(HashMap::new()),
            aborted: Mutex::new(Vec::new()),
            next_upload_id: AtomicU64::new(1),
            page_size: usize::MAX,
            fail_next_complete: AtomicBool::new(false),
        }
    }

    /// Makes the next `complete_multipart` call fail without consuming the
    /// pending upload, so a test can assert it is still abortable afterward.
    pub fn fail_next_complete(&self) {
        self.fail_next_complete.store(true, Ordering::SeqCst);
    }

    /// Caps how many entries a single `list` call returns, forcing callers
    /// through the continuation-token pagination path.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), data);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// `(part_number, size)` pairs recorded for a still-open or just-aborted
    /// upload, in the order they were uploaded.
    pub fn parts_for(&self, upload_id: &str) -> Vec<(i32, usize)> {
        self.uploads
            .lock()
            .get(upload_id)
            .map(|u| u.parts.iter().map(|(n, b)| (*n, b.len())).collect())
            .unwrap_or_default()
    }

    pub fn aborted_upload_ids(&self) -> Vec<String> {
        self.aborted.lock().clone()
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStoreClient for MockStore {
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError> {
        match self.object(bucket, key) {
            Some(data) => Ok(ObjectMeta {
                size: data.len() as u64,
                version: None,
            }),
            None => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
        }
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<Bytes, StoreError> {
        let data = self.object(bucket, key).ok_or_else(|| StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;

        let slice = match range {
            Some(r) => {
                let start = r.start as usize;
                let end = (r.end as usize).min(data.len());
                if start > end {
                    &[]
                } else {
                    &data[start..end]
                }
            }
            None => &data[..],
        };
        Ok(Bytes::copy_from_slice(slice))
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        self.put_object(bucket, key, bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.objects
            .lock()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        let objects = self.objects.lock();
        let mut keys: Vec<&String> = objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k)
            .collect();
        keys.sort();

        let start = continuation
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0);
        let end = (start + self.page_size).min(keys.len());

        let page_entries = keys[start..end]
            .iter()
            .map(|k| ListEntry {
                key: (*k).clone(),
                size: objects[&(bucket.to_string(), (*k).clone())].len() as u64,
            })
            .collect();

        let next_continuation = if end < keys.len() {
            Some(end.to_string())
        } else {
            None
        };

        Ok(ListPage {
            objects: page_entries,
            next_continuation,
        })
    }

    async fn initiate_multipart(&self, bucket: &str, key: &str) -> Result<String, StoreError> {
        let id = self.next_upload_id.fetch_add(1, Ordering::SeqCst);
        let upload_id = format!("mock-upload-{id}");
        self.uploads.lock().insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: Vec::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        bytes: Bytes,
    ) -> Result<String, StoreError> {
        let mut uploads = self.uploads.lock();
        let pending = uploads
            .get_mut(upload_id)
            .ok_or_else(|| StoreError::other("UnknownUploadId", upload_id.to_string()))?;
        pending.parts.push((part_number, bytes.to_vec()));
        Ok(format!("etag-{part_number}"))
    }

    async fn upload_part_copy(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        source_key: &str,
        source_range: ByteRange,
    ) -> Result<String, StoreError> {
        let data = self.get(bucket, source_key, Some(source_range)).await?;
        self.upload_part(bucket, key, upload_id, part_number, data).await
    }

    async fn complete_multipart(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), StoreError> {
        if self.fail_next_complete.swap(false, Ordering::SeqCst) {
            return Err(StoreError::other(
                "ForcedCompleteFailure",
                upload_id.to_string(),
            ));
        }

        let pending = self
            .uploads
            .lock()
            .remove(upload_id)
            .ok_or_else(|| StoreError::other("UnknownUploadId", upload_id.to_string()))?;

        let expected: Vec<i32> = parts.iter().map(|p| p.part_number).collect();
        let mut staged = pending.parts;
        staged.sort_by_key(|(n, _)| *n);
        let actual: Vec<i32> = staged.iter().map(|(n, _)| *n).collect();
        if expected != actual {
            return Err(StoreError::other(
                "CompleteMultipartMismatch",
                format!("expected {expected:?}, staged {actual:?}"),
            ));
        }

        let mut body = Vec::new();
        for (_, chunk) in staged {
            body.extend_from_slice(&chunk);
        }
        self.put_object(&pending.bucket, &pending.key, body);
        Ok(())
    }

    async fn abort_multipart(&self, _bucket: &str, _key: &str, upload_id: &str) -> Result<(), StoreError> {
        self.uploads.lock().remove(upload_id);
        self.aborted.lock().push(upload_id.to_string());
        Ok(())
    }
}
