//! Reader (component E): a logical, seekable view over 1..N objects with
//! common-header deduplication.

use crate::error::{DriverError, DriverResult};
use crate::resolver::{resolve, ResolvedEntry};
use crate::store::{ByteRange, ObjectStoreClient};

/// Seek origin, mirroring C `fseek`'s `whence` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Beg,
    Cur,
    End,
}

/// A logical view over 1..N concrete objects.
pub struct MultiPartFile {
    bucket: String,
    filenames: Vec<String>,
    sizes: Vec<u64>,
    cumulative_sizes: Vec<u64>,
    common_header_length: u64,
    offset: i64,
}

impl MultiPartFile {
    /// Construction: resolve the pattern, then detect a
    /// common first-line header across every file when there is more than
    /// one.
    pub async fn open(
        store: &dyn ObjectStoreClient,
        bucket: &str,
        pattern: &str,
    ) -> DriverResult<Self> {
        let entries = resolve(store, bucket, pattern).await?;
        let filenames: Vec<String> = entries.iter().map(|e| e.key.clone()).collect();
        let sizes: Vec<u64> = entries.iter().map(|e: &ResolvedEntry| e.size).collect();

        let common_header_length = if filenames.len() <= 1 {
            0
        } else {
            detect_common_header(store, bucket, &filenames).await?
        };

        let mut cumulative_sizes = Vec::with_capacity(sizes.len());
        let mut running: u64 = 0;
        for (i, &size) in sizes.iter().enumerate() {
            if i == 0 {
                running = size;
            } else {
                running += size.saturating_sub(common_header_length);
            }
            cumulative_sizes.push(running);
        }

        Ok(Self {
            bucket: bucket.to_string(),
            filenames,
            sizes,
            cumulative_sizes,
            common_header_length,
            offset: 0,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.cumulative_sizes.last().copied().unwrap_or(0)
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// `seek`: `new < 0` is rejected; seeking past
    /// `total_size` is allowed (subsequent reads return 0 bytes).
    pub fn seek(&mut self, offset: i64, whence: Whence) -> DriverResult<i64> {
        let new_offset = match whence {
            Whence::Beg => offset,
            Whence::Cur => self
                .offset
                .checked_add(offset)
                .ok_or_else(|| DriverError::Overflow("seek CUR".to_string()))?,
            Whence::End => {
                let total = self.total_size();
                let base = if total == 0 { 0 } else { (total - 1) as i64 };
                base.checked_add(offset)
                    .ok_or_else(|| DriverError::Overflow("seek END".to_string()))?
            }
        };

        if new_offset < 0 {
            return Err(DriverError::InvalidArgument(format!(
                "negative seek offset: {new_offset}"
            )));
        }

        self.offset = new_offset;
        Ok(self.offset)
    }

    /// `read`: clamp to remaining bytes, walk file boundaries,
    /// issue ranged gets, leave `offset` unchanged on any store error.
    pub async fn read(&mut self, store: &dyn ObjectStoreClient, n: usize) -> DriverResult<Vec<u8>> {
        let total = self.total_size();
        let remaining = if (self.offset as u64) >= total {
            0
        } else {
            (total - self.offset as u64).min(n as u64)
        };

        if remaining == 0 {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(remaining as usize);
        let mut logical_pos = self.offset as u64;
        let mut left = remaining;

        let mut i = self.file_index_for(logical_pos);
        while left > 0 && i < self.filenames.len() {
            let file_start = if i == 0 { 0 } else { self.cumulative_sizes[i - 1] };
            let header = if i == 0 { 0 } else { self.common_header_length };
            let intra_start = logical_pos - file_start + header;
            let file_end_intra = self.sizes[i];
            let want = left.min(file_end_intra.saturating_sub(intra_start));

            if want > 0 {
                let bytes = store
                    .get(
                        &self.bucket,
                        &self.filenames[i],
                        Some(ByteRange::new(intra_start, intra_start + want)),
                    )
                    .await?;
                out.extend_from_slice(&bytes);
                logical_pos += want;
                left -= want;
            }

            i += 1;
        }

        self.offset += out.len() as i64;
        Ok(out)
    }

    fn file_index_for(&self, logical_pos: u64) -> usize {
        // Smallest i with cumulative_sizes[i] > logical_pos.
        match self
            .cumulative_sizes
            .binary_search_by(|&c| {
                if c > logical_pos {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Less
                }
            }) {
            Ok(i) | Err(i) => i.min(self.filenames.len().saturating_sub(1)),
        }
    }
}

/// Fetch the first line (including a trailing `\n`, if present) of `key`.
async fn first_line(store: &dyn ObjectStoreClient, bucket: &str, key: &str) -> DriverResult<Vec<u8>> {
    // No range is specified in the spec for this probe; objects here are
    // assumed short enough to fetch in full for the header comparison, same
    // as the original driver's single-shot header read.
    let data = store.get(bucket, key, None).await?;
    match data.iter().position(|&b| b == b'\n') {
        Some(idx) => Ok(data[..=idx].to_vec()),
        None => Ok(data.to_vec()),
    }
}

async fn detect_common_header(
    store: &dyn ObjectStoreClient,
    bucket: &str,
    filenames: &[String],
) -> DriverResult<u64> {
    let header = first_line(store, bucket, &filenames[0]).await?;
    if header.is_empty() {
        return Err(DriverError::Protocol("empty header on multifile read".to_string()));
    }

    for name in &filenames[1..] {
        let other = first_line(store, bucket, name).await?;
        if other != header {
            return Ok(0);
        }
    }

    Ok(header.len() as u64)
}
