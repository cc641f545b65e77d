//! S3-backed [`ObjectStoreClient`], grounded on the host's `S3Backend`
//! (client construction, error mapping, list pagination) and on the
//! `aws-sdk-s3` multipart call shapes used by real client-side uploaders.

use super::{ByteRange, CompletedPart, ListEntry, ListPage, ObjectMeta, ObjectStoreClient};
use crate::error::StoreError;
use crate::DriverConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

pub struct S3Client {
    client: Client,
}

impl S3Client {
    pub async fn connect(config: &DriverConfig) -> Result<Self, StoreError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            let credentials = Credentials::new(key, secret, None, None, "s3-driver-config");
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
        })
    }

    fn range_header(range: ByteRange) -> String {
        // S3 byte ranges are inclusive on both ends.
        format!("bytes={}-{}", range.start, range.end.saturating_sub(1))
    }

    fn copy_source_header(bucket: &str, key: &str) -> String {
        format!("{}/{}", bucket, urlencoding_path(key))
    }
}

/// S3's `x-amz-copy-source` header requires URL-encoding of the key; the
/// host repo pulls in `urlencoding` for an equivalent purpose in its demo
/// UI, so this mirrors that choice rather than hand-rolling percent-escapes.
fn urlencoding_path(key: &str) -> String {
    key.split('/')
        .map(|segment| {
            segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') {
                        c.to_string()
                    } else {
                        c.to_string()
                            .bytes()
                            .map(|b| format!("%{b:02X}"))
                            .collect::<String>()
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStoreClient for S3Client {
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_head_error(bucket, key, e))?;

        debug!(bucket, key, "S3 HEAD");
        Ok(ObjectMeta {
            size: response.content_length.unwrap_or(0).max(0) as u64,
            version: response.version_id,
        })
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<Bytes, StoreError> {
        let mut request = self.client.get_object().bucket(bucket).key(key);
        if let Some(range) = range {
            request = request.range(Self::range_header(range));
        }

        let response = request.send().await.map_err(|e| map_get_error(bucket, key, e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::other("BodyReadError", e.to_string()))?
            .into_bytes();

        debug!(bucket, key, bytes = data.len(), "S3 GET");
        Ok(data)
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Bytes) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StoreError::other("PutObjectError", e.to_string()))?;

        debug!(bucket, key, "S3 PUT");
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::other("DeleteObjectError", e.to_string()))?;

        debug!(bucket, key, "S3 DELETE");
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::other("ListObjectsV2Error", e.to_string()))?;

        let objects = response
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|o| {
                let key = o.key?;
                let size = o.size.unwrap_or(0).max(0) as u64;
                Some(ListEntry { key, size })
            })
            .collect();

        let next_continuation = if response.is_truncated.unwrap_or(false) {
            response.next_continuation_token
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_continuation,
        })
    }

    async fn initiate_multipart(&self, bucket: &str, key: &str) -> Result<String, StoreError> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::other("CreateMultipartUploadError", e.to_string()))?;

        response
            .upload_id
            .ok_or_else(|| StoreError::other("CreateMultipartUploadError", "missing upload_id"))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        bytes: Bytes,
    ) -> Result<String, StoreError> {
        let len = bytes.len();
        let response = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StoreError::other("UploadPartError", e.to_string()))?;

        debug!(bucket, key, part_number, len, "S3 UploadPart");
        response
            .e_tag
            .ok_or_else(|| StoreError::other("UploadPartError", "missing e_tag"))
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
        let response = self
            .client
            .upload_part_copy()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .copy_source(Self::copy_source_header(bucket, source_key))
            .copy_source_range(Self::range_header(source_range))
            .send()
            .await
            .map_err(|e| StoreError::other("UploadPartCopyError", e.to_string()))?;

        let etag = response
            .copy_part_result
            .and_then(|r| r.e_tag)
            .ok_or_else(|| StoreError::other("UploadPartCopyError", "missing e_tag"))?;

        debug!(bucket, key, part_number, source_key, "S3 UploadPartCopy");
        Ok(etag)
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), StoreError> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .into_iter()
                    .map(|p| {
                        S3CompletedPart::builder()
                            .part_number(p.part_number)
                            .e_tag(p.entity_tag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| StoreError::other("CompleteMultipartUploadError", e.to_string()))?;

        debug!(bucket, key, "S3 CompleteMultipartUpload");
        Ok(())
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<(), StoreError> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| StoreError::other("AbortMultipartUploadError", e.to_string()))?;

        debug!(bucket, key, "S3 AbortMultipartUpload");
        Ok(())
    }
}

fn map_head_error(bucket: &str, key: &str, err: SdkError<HeadObjectError>) -> StoreError {
    if let SdkError::ServiceError(service_error) = &err {
        if matches!(service_error.err(), HeadObjectError::NotFound(_)) {
            return StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            };
        }
    }
    StoreError::other("HeadObjectError", err.to_string())
}

fn map_get_error(bucket: &str, key: &str, err: SdkError<GetObjectError>) -> StoreError {
    if let SdkError::ServiceError(service_error) = &err {
        if matches!(service_error.err(), GetObjectError::NoSuchKey(_)) {
            return StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            };
        }
    }
    StoreError::other("GetObjectError", err.to_string())
}
