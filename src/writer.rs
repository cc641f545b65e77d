//! Writer (component F): the multipart upload state machine, staging
//! buffer, and append-via-server-side-copy initiation.

use crate::error::{DriverError, DriverResult};
use crate::store::{ByteRange, CompletedPart, ObjectStoreClient};
use bytes::Bytes;
use tracing::warn;

/// Multipart minimum part size (5 MiB), except for the final part.
pub const BUFF_MIN: u64 = 5 * 1024 * 1024;
/// Multipart maximum part size (5 GiB).
pub const BUFF_MAX: u64 = 5 * 1024 * 1024 * 1024;

/// Mode requested via `fopen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Write,
    Append,
}

/// A multipart upload in progress.
pub struct WriteFile {
    bucket: String,
    object: String,
    upload_id: String,
    parts: Vec<CompletedPart>,
    next_part_number: i32,
    staging_buffer: Vec<u8>,
    done: bool,
}

impl WriteFile {
    /// `open('w' | 'a')`. Append against a missing target silently falls
    /// back to a plain write.
    pub async fn open(
        store: &dyn ObjectStoreClient,
        bucket: &str,
        object: &str,
        mode: WriteMode,
    ) -> DriverResult<Self> {
        match mode {
            WriteMode::Write => Self::open_fresh(store, bucket, object).await,
            WriteMode::Append => match store.head(bucket, object).await {
                Ok(meta) => Self::open_append(store, bucket, object, meta.size).await,
                Err(DriverError::NotFound { .. }) => {
                    warn!(bucket, object, "append target missing, falling back to plain write");
                    Self::open_fresh(store, bucket, object).await
                }
                Err(e) => Err(e),
            },
        }
    }

    async fn open_fresh(store: &dyn ObjectStoreClient, bucket: &str, object: &str) -> DriverResult<Self> {
        let upload_id = store.initiate_multipart(bucket, object).await?;
        Ok(Self {
            bucket: bucket.to_string(),
            object: object.to_string(),
            upload_id,
            parts: Vec::new(),
            next_part_number: 1,
            staging_buffer: Vec::new(),
            done: false,
        })
    }

    async fn open_append(
        store: &dyn ObjectStoreClient,
        bucket: &str,
        object: &str,
        target_size: u64,
    ) -> DriverResult<Self> {
        let upload_id = store.initiate_multipart(bucket, object).await?;
        let mut parts = Vec::new();
        let mut next_part_number: i32 = 1;
        let mut covered: u64 = 0;

        while target_size - covered >= BUFF_MIN {
            let range = ByteRange::new(covered, covered + BUFF_MIN);
            let entity_tag = store
                .upload_part_copy(bucket, object, &upload_id, next_part_number, object, range)
                .await?;
            parts.push(CompletedPart {
                part_number: next_part_number,
                entity_tag,
            });
            next_part_number += 1;
            covered += BUFF_MIN;
        }

        let mut staging_buffer = Vec::new();
        let remainder = target_size - covered;
        if remainder > 0 {
            let tail = store
                .get(bucket, object, Some(ByteRange::new(covered, target_size)))
                .await?;
            staging_buffer.extend_from_slice(&tail);
        }

        Ok(Self {
            bucket: bucket.to_string(),
            object: object.to_string(),
            upload_id,
            parts,
            next_part_number,
            staging_buffer,
            done: false,
        })
    }

    /// `write`: buffer user bytes, flushing a `BUFF_MIN`-sized
    /// part every time the staging buffer reaches that threshold.
    pub async fn write(&mut self, store: &dyn ObjectStoreClient, src: &[u8]) -> DriverResult<usize> {
        self.staging_buffer.extend_from_slice(src);

        while self.staging_buffer.len() as u64 >= BUFF_MIN {
            let chunk: Vec<u8> = self.staging_buffer.drain(..BUFF_MIN as usize).collect();
            self.flush_part(store, chunk).await?;
        }

        Ok(src.len())
    }

    async fn flush_part(&mut self, store: &dyn ObjectStoreClient, chunk: Vec<u8>) -> DriverResult<()> {
        let entity_tag = store
            .upload_part(
                &self.bucket,
                &self.object,
                &self.upload_id,
                self.next_part_number,
                Bytes::from(chunk),
            )
            .await?;
        self.parts.push(CompletedPart {
            part_number: self.next_part_number,
            entity_tag,
        });
        self.next_part_number += 1;
        Ok(())
    }

    /// `close`: flush any residue (the final part is exempt
    /// from the minimum size), then complete the multipart upload.
    pub async fn close(&mut self, store: &dyn ObjectStoreClient) -> DriverResult<()> {
        if !self.staging_buffer.is_empty() || self.parts.is_empty() {
            let chunk = std::mem::take(&mut self.staging_buffer);
            self.flush_part(store, chunk).await?;
        }

        store
            .complete_multipart(&self.bucket, &self.object, &self.upload_id, self.parts.clone())
            .await?;
        self.done = true;
        Ok(())
    }

    /// Best-effort abort, invoked by the handle registry on `disconnect` or
    /// when `close` never runs.
    pub async fn abort(&mut self, store: &dyn ObjectStoreClient) -> DriverResult<()> {
        if self.done {
            return Ok(());
        }
        store.abort_multipart(&self.bucket, &self.object, &self.upload_id).await?;
        self.done = true;
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::MockStore;

    #[tokio::test]
    async fn small_write_emits_one_sub_minimum_final_part() {
        let store = MockStore::new();
        let mut writer = WriteFile::open(&store, "bucket", "small.bin", WriteMode::Write)
            .await
            .unwrap();

        writer.write(&store, &vec![0u8; 4 * 1024 * 1024]).await.unwrap();
        writer.close(&store).await.unwrap();

        let parts = store.parts_for(&writer.upload_id);
        assert!(parts.is_empty(), "parts should be drained from the mock on complete");
        let object = store.object("bucket", "small.bin").unwrap();
        assert_eq!(object.len(), 4 * 1024 * 1024);
    }

    #[tokio::test]
    async fn large_write_emits_two_full_parts_then_a_final_remainder() {
        let store = MockStore::new();
        let mut writer = WriteFile::open(&store, "bucket", "large.bin", WriteMode::Write)
            .await
            .unwrap();

        writer.write(&store, &vec![7u8; 12 * 1024 * 1024]).await.unwrap();
        writer.close(&store).await.unwrap();

        let object = store.object("bucket", "large.bin").unwrap();
        assert_eq!(object.len(), 12 * 1024 * 1024);
        assert_eq!(writer.parts.len(), 3);
        assert_eq!(writer.parts[0].part_number, 1);
        assert_eq!(writer.parts[1].part_number, 2);
        assert_eq!(writer.parts[2].part_number, 3);
    }

    #[tokio::test]
    async fn append_to_existing_target_copies_then_merges_remainder() {
        let store = MockStore::new();
        let existing = vec![9u8; 7 * 1024 * 1024];
        store.put_object("bucket", "append.bin", existing.clone());

        let mut writer = WriteFile::open(&store, "bucket", "append.bin", WriteMode::Append)
            .await
            .unwrap();
        assert_eq!(writer.parts.len(), 1);
        assert_eq!(writer.staging_buffer.len(), 2 * 1024 * 1024);

        writer.write(&store, &vec![1u8; 3 * 1024 * 1024]).await.unwrap();
        writer.close(&store).await.unwrap();

        assert_eq!(writer.parts.len(), 2);
        let object = store.object("bucket", "append.bin").unwrap();
        assert_eq!(object.len(), 10 * 1024 * 1024);
    }

    #[tokio::test]
    async fn append_to_missing_target_falls_back_to_fresh_write() {
        let store = MockStore::new();
        let mut writer = WriteFile::open(&store, "bucket", "new.bin", WriteMode::Append)
            .await
            .unwrap();
        assert!(writer.parts.is_empty());
        assert!(writer.staging_buffer.is_empty());

        writer.write(&store, b"hello").await.unwrap();
        writer.close(&store).await.unwrap();
        assert_eq!(store.object("bucket", "new.bin").unwrap(), b"hello");
    }

    #[tokio::test]
    async fn abort_invokes_abort_multipart_and_is_idempotent() {
        let store = MockStore::new();
        let mut writer = WriteFile::open(&store, "bucket", "abandoned.bin", WriteMode::Write)
            .await
            .unwrap();
        writer.write(&store, b"partial").await.unwrap();

        writer.abort(&store).await.unwrap();
        assert_eq!(store.aborted_upload_ids(), vec![writer.upload_id.clone()]);

        // A second abort on an already-done writer must not re-invoke the store.
        writer.abort(&store).await.unwrap();
        assert_eq!(store.aborted_upload_ids().len(), 1);
    }

    #[tokio::test]
    async fn part_numbers_are_strictly_increasing_with_no_gaps() {
        let store = MockStore::new();
        let mut writer = WriteFile::open(&store, "bucket", "seq.bin", WriteMode::Write)
            .await
            .unwrap();
        writer.write(&store, &vec![0u8; 11 * 1024 * 1024]).await.unwrap();
        writer.close(&store).await.unwrap();

        let numbers: Vec<i32> = writer.parts.iter().map(|p| p.part_number).collect();
        let expected: Vec<i32> = (1..=numbers.len() as i32).collect();
        assert_eq!(numbers, expected);
    }
}
