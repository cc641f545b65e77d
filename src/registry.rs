//! Handle registry (component G): owns live readers/writers keyed by their
//! stable heap address, the same value handed back to the host as an
//! opaque pointer.
//!
//! Lookups hand out *ownership* of the boxed object rather than a guard
//! held across an `.await`: callers `take_*`, run the async body against
//! the returned box, then `put_*` it back (or let it drop, on close). This
//! keeps the registry lock uncontended for the duration of any network
//! call and makes "handle not currently registered" fall out naturally —
//! a concurrent take on the same handle just finds it already gone.

use crate::reader::MultiPartFile;
use crate::writer::WriteFile;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Opaque handle: the boxed object's heap address, reinterpreted as an
/// integer so it can cross the FFI boundary as `*mut c_void`.
pub type Handle = usize;

fn handle_of<T>(boxed: &Box<T>) -> Handle {
    boxed.as_ref() as *const T as Handle
}

#[derive(Default)]
pub struct Registry {
    readers: Mutex<HashMap<Handle, Box<MultiPartFile>>>,
    writers: Mutex<HashMap<Handle, Box<WriteFile>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_reader(&self, reader: MultiPartFile) -> Handle {
        let boxed = Box::new(reader);
        let handle = handle_of(&boxed);
        self.readers.lock().insert(handle, boxed);
        handle
    }

    pub fn insert_writer(&self, writer: WriteFile) -> Handle {
        let boxed = Box::new(writer);
        let handle = handle_of(&boxed);
        self.writers.lock().insert(handle, boxed);
        handle
    }

    pub fn take_reader(&self, handle: Handle) -> Option<Box<MultiPartFile>> {
        self.readers.lock().remove(&handle)
    }

    pub fn put_reader(&self, handle: Handle, reader: Box<MultiPartFile>) {
        self.readers.lock().insert(handle, reader);
    }

    pub fn take_writer(&self, handle: Handle) -> Option<Box<WriteFile>> {
        self.writers.lock().remove(&handle)
    }

    pub fn put_writer(&self, handle: Handle, writer: Box<WriteFile>) {
        self.writers.lock().insert(handle, writer);
    }

    /// `true` iff `handle` currently names a live reader or writer.
    pub fn contains(&self, handle: Handle) -> bool {
        self.readers.lock().contains_key(&handle) || self.writers.lock().contains_key(&handle)
    }

    /// Drain every open writer (for `disconnect`'s best-effort abort pass)
    /// and drop every open reader unconditionally.
    pub fn drain(&self) -> Vec<Box<WriteFile>> {
        self.readers.lock().clear();
        self.writers.lock().drain().map(|(_, w)| w).collect()
    }

    #[cfg(test)]
    pub fn open_reader_count(&self) -> usize {
        self.readers.lock().len()
    }

    #[cfg(test)]
    pub fn open_writer_count(&self) -> usize {
        self.writers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MultiPartFile;
    use crate::store::testutil::MockStore;
    use crate::writer::{WriteFile, WriteMode};

    #[tokio::test]
    async fn insert_then_take_round_trips_the_same_handle() {
        let store = MockStore::new();
        store.put_object("bucket", "a.txt", b"hi".to_vec());
        let reader = MultiPartFile::open(&store, "bucket", "a.txt").await.unwrap();

        let registry = Registry::new();
        let handle = registry.insert_reader(reader);
        assert_eq!(registry.open_reader_count(), 1);

        let taken = registry.take_reader(handle).unwrap();
        assert_eq!(registry.open_reader_count(), 0);
        registry.put_reader(handle, taken);
        assert_eq!(registry.open_reader_count(), 1);
    }

    #[tokio::test]
    async fn take_on_unknown_handle_is_none() {
        let registry = Registry::new();
        assert!(registry.take_reader(0xdead_beef).is_none());
        assert!(registry.take_writer(0xdead_beef).is_none());
    }

    #[tokio::test]
    async fn drain_returns_open_writers_and_clears_readers() {
        let store = MockStore::new();
        store.put_object("bucket", "a.txt", b"hi".to_vec());
        let reader = MultiPartFile::open(&store, "bucket", "a.txt").await.unwrap();
        let writer = WriteFile::open(&store, "bucket", "w.bin", WriteMode::Write)
            .await
            .unwrap();

        let registry = Registry::new();
        registry.insert_reader(reader);
        registry.insert_writer(writer);

        let drained = registry.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(registry.open_reader_count(), 0);
        assert_eq!(registry.open_writer_count(), 0);
    }

    #[tokio::test]
    async fn contains_reflects_current_membership() {
        let store = MockStore::new();
        store.put_object("bucket", "a.txt", b"hi".to_vec());
        let reader = MultiPartFile::open(&store, "bucket", "a.txt").await.unwrap();

        let registry = Registry::new();
        let handle = registry.insert_reader(reader);
        assert!(registry.contains(handle));

        registry.take_reader(handle);
        assert!(!registry.contains(handle));
    }
}
