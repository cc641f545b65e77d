//! Object-store client adapter (component C).
//!
//! Everything above this module deals only in [`StoreError`] and the
//! capability set below; SDK-specific error types never escape an
//! implementation of [`ObjectStoreClient`].

#[cfg(feature = "gcs")]
pub mod gcs;
pub mod s3;
pub mod testutil;

use crate::error::StoreError;
use async_trait::async_trait;
use bytes::Bytes;

/// Metadata returned by [`ObjectStoreClient::head`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
    /// Store-assigned version identifier, when the backend exposes one
    /// (S3 bucket versioning, GCS generation number). `None` otherwise.
    pub version: Option<String>,
}

/// A single entry returned by [`ObjectStoreClient::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub key: String,
    pub size: u64,
}

/// One page of a [`ObjectStoreClient::list`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPage {
    pub objects: Vec<ListEntry>,
    pub next_continuation: Option<String>,
}

/// An inclusive-exclusive byte range `[start, end)`, used for ranged GETs
/// and for `upload_part_copy` source ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One completed part, ready to be listed in a `complete_multipart` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub entity_tag: String,
}

/// Abstract object-store client. Implemented by [`s3::S3Client`]
/// and, under `feature = "gcs"`, by [`gcs::GcsClient`].
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError>;

    async fn get(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<Bytes, StoreError>;

    async fn put(&self, bucket: &str, key: &str, bytes: Bytes) -> Result<(), StoreError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError>;

    async fn initiate_multipart(&self, bucket: &str, key: &str) -> Result<String, StoreError>;

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        bytes: Bytes,
    ) -> Result<String, StoreError>;

    async fn upload_part_copy(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        source_key: &str,
        source_range: ByteRange,
    ) -> Result<String, StoreError>;

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), StoreError>;

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<(), StoreError>;
}
