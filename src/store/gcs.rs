//! GCS-backed [`ObjectStoreClient`] (compiled only under `feature = "gcs"`),
//! grounded on `GcpCloudStorage`'s use of `google_cloud_storage::client`.
//!
//! GCS has no byte-range server-side copy equivalent to S3's
//! `upload_part_copy` (`rewrite_object`/`copy_object` only work at whole-
//! object granularity). `upload_part_copy` here downloads the requested
//! source range and re-uploads it as an ordinary part instead — a bandwidth
//! cost, not a correctness gap.

use super::{ByteRange, CompletedPart, ListEntry, ListPage, ObjectMeta, ObjectStoreClient};
use crate::error::StoreError;
use crate::DriverConfig;
use async_trait::async_trait;
use bytes::Bytes;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use tracing::debug;

/// GCS multipart support is emulated entirely client-side: there is no
/// server-assigned upload id, so the "upload id" is a driver-generated
/// token that tags an in-memory part accumulator. See [`GcsUpload`].
pub struct GcsClient {
    client: Client,
    uploads: parking_lot::Mutex<std::collections::HashMap<String, Vec<(i32, Bytes)>>>,
}

impl GcsClient {
    pub async fn connect(_config: &DriverConfig) -> Result<Self, StoreError> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| StoreError::other("AuthError", e.to_string()))?;

        Ok(Self {
            client: Client::new(config),
            uploads: parking_lot::Mutex::new(std::collections::HashMap::new()),
        })
    }
}

#[async_trait]
impl ObjectStoreClient for GcsClient {
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError> {
        let object = self
            .client
            .get_object(&GetObjectRequest {
                bucket: bucket.to_string(),
                object: key.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| map_not_found(bucket, key, e.to_string()))?;

        debug!(bucket, key, "GCS HEAD (via get metadata)");
        Ok(ObjectMeta {
            size: object.size.max(0) as u64,
            version: Some(object.generation.to_string()),
        })
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<Bytes, StoreError> {
        let gcs_range = match range {
            Some(r) => Range(Some(r.start), Some(r.end.saturating_sub(1))),
            None => Range::default(),
        };

        let data = self
            .client
            .download_object(
                &GetObjectRequest {
                    bucket: bucket.to_string(),
                    object: key.to_string(),
                    ..Default::default()
                },
                &gcs_range,
            )
            .await
            .map_err(|e| map_not_found(bucket, key, e.to_string()))?;

        debug!(bucket, key, bytes = data.len(), "GCS GET");
        Ok(Bytes::from(data))
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: bucket.to_string(),
                    ..Default::default()
                },
                bytes.to_vec(),
                &UploadType::Simple(Media::new(key.to_string())),
            )
            .await
            .map_err(|e| StoreError::other("UploadObjectError", e.to_string()))?;

        debug!(bucket, key, "GCS PUT");
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object(&DeleteObjectRequest {
                bucket: bucket.to_string(),
                object: key.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| StoreError::other("DeleteObjectError", e.to_string()))?;

        debug!(bucket, key, "GCS DELETE");
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        let response = self
            .client
            .list_objects(&ListObjectsRequest {
                bucket: bucket.to_string(),
                prefix: Some(prefix.to_string()),
                page_token: continuation,
                ..Default::default()
            })
            .await
            .map_err(|e| StoreError::other("ListObjectsError", e.to_string()))?;

        let objects = response
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|o| ListEntry {
                key: o.name,
                size: o.size.max(0) as u64,
            })
            .collect();

        Ok(ListPage {
            objects,
            next_continuation: response.next_page_token,
        })
    }

    async fn initiate_multipart(&self, _bucket: &str, key: &str) -> Result<String, StoreError> {
        let upload_id = format!("gcs-upload-{key}-{:p}", self as *const _);
        self.uploads.lock().insert(upload_id.clone(), Vec::new());
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
        let entity_tag = format!("part-{part_number}");
        let mut uploads = self.uploads.lock();
        let parts = uploads
            .get_mut(upload_id)
            .ok_or_else(|| StoreError::other("UnknownUploadId", upload_id.to_string()))?;
        parts.push((part_number, bytes));
        Ok(entity_tag)
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
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), StoreError> {
        let mut staged = self
            .uploads
            .lock()
            .remove(upload_id)
            .ok_or_else(|| StoreError::other("UnknownUploadId", upload_id.to_string()))?;
        staged.sort_by_key(|(n, _)| *n);

        let expected: Vec<i32> = parts.iter().map(|p| p.part_number).collect();
        let actual: Vec<i32> = staged.iter().map(|(n, _)| *n).collect();
        if expected != actual {
            return Err(StoreError::other(
                "CompleteMultipartMismatch",
                format!("expected parts {expected:?}, staged {actual:?}"),
            ));
        }

        let mut body = Vec::new();
        for (_, chunk) in staged {
            body.extend_from_slice(&chunk);
        }
        self.put(bucket, key, Bytes::from(body)).await
    }

    async fn abort_multipart(&self, _bucket: &str, _key: &str, upload_id: &str) -> Result<(), StoreError> {
        self.uploads.lock().remove(upload_id);
        Ok(())
    }
}

fn map_not_found(bucket: &str, key: &str, message: String) -> StoreError {
    if message.contains("404") || message.to_lowercase().contains("not found") {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    } else {
        StoreError::other("GcsError", message)
    }
}
