//! Resolver (component D): expand a (possibly multifile) pattern into an
//! ordered list of concrete objects.

use crate::error::{DriverError, DriverResult};
use crate::glob::{glob_match, is_multifile, literal_prefix};
use crate::store::{ListEntry, ObjectStoreClient};

/// One resolved object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub key: String,
    pub size: u64,
}

/// Resolve `pattern` against `bucket`: a single `head` for a plain pattern,
/// or a paginated list-then-filter for a multifile one.
pub async fn resolve(
    store: &dyn ObjectStoreClient,
    bucket: &str,
    pattern: &str,
) -> DriverResult<Vec<ResolvedEntry>> {
    if !is_multifile(pattern) {
        let meta = store.head(bucket, pattern).await?;
        return Ok(vec![ResolvedEntry {
            key: pattern.to_string(),
            size: meta.size,
        }]);
    }

    let prefix = literal_prefix(pattern);
    let mut matched = Vec::new();
    let mut continuation = None;

    loop {
        let page = store.list(bucket, prefix, continuation).await?;
        for ListEntry { key, size } in page.objects {
            if glob_match(&key, pattern) {
                matched.push(ResolvedEntry { key, size });
            }
        }
        continuation = page.next_continuation;
        if continuation.is_none() {
            break;
        }
    }

    if matched.is_empty() {
        return Err(DriverError::NotFound {
            bucket: bucket.to_string(),
            key: pattern.to_string(),
        });
    }

    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::MockStore;

    #[tokio::test]
    async fn plain_pattern_resolves_via_head() {
        let store = MockStore::new();
        store.put_object("bucket", "samples/Adult/Adult.txt", vec![0u8; 5585568]);

        let resolved = resolve(&store, "bucket", "samples/Adult/Adult.txt")
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].size, 5585568);
    }

    #[tokio::test]
    async fn plain_pattern_missing_is_not_found() {
        let store = MockStore::new();
        let err = resolve(&store, "bucket", "missing.txt").await.unwrap_err();
        assert!(matches!(err, DriverError::NotFound { .. }));
    }

    #[tokio::test]
    async fn multifile_pattern_lists_and_filters_preserving_order() {
        let store = MockStore::new();
        for i in 0..10 {
            let key = format!("bq_export/Adult/Adult-split-{i:011}.csv");
            store.put_object("bucket", &key, vec![0u8; 558556]);
        }
        store.put_object("bucket", "bq_export/Adult/other.csv", vec![0u8; 10]);

        let resolved = resolve(
            &store,
            "bucket",
            "bq_export/Adult/Adult-split-*.csv",
        )
        .await
        .unwrap();
        assert_eq!(resolved.len(), 10);
        assert_eq!(resolved[0].key, "bq_export/Adult/Adult-split-00000000000.csv");
    }

    #[tokio::test]
    async fn multifile_pattern_empty_match_is_not_found() {
        let store = MockStore::new();
        store.put_object("bucket", "other/prefix/file.txt", vec![0u8; 10]);
        let err = resolve(&store, "bucket", "nomatch/*.txt").await.unwrap_err();
        assert!(matches!(err, DriverError::NotFound { .. }));
    }

    #[tokio::test]
    async fn multifile_pattern_paginates_across_multiple_list_pages() {
        let store = MockStore::new().with_page_size(3);
        for i in 0..10 {
            let key = format!("many/file-{i:02}.txt");
            store.put_object("bucket", &key, vec![0u8; 1]);
        }
        let resolved = resolve(&store, "bucket", "many/file-*.txt").await.unwrap();
        assert_eq!(resolved.len(), 10);
    }
}
