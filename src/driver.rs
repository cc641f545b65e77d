//! Driver facade (component H): implements the plugin contract
//! by composing the URI parser (B), resolver (D), reader (E), writer (F)
//! and handle registry (G) over an object-store client (C). This is the
//! only layer [`crate::ffi`] talks to; everything here still deals in
//! [`DriverError`], never in ABI sentinels.

use crate::config::{ConfigKeys, DriverConfig, GCS_KEYS, S3_KEYS};
use crate::error::{DriverError, DriverResult};
use crate::reader::{MultiPartFile, Whence};
use crate::registry::{Handle, Registry};
use crate::resolver::resolve;
use crate::store::ObjectStoreClient;
use crate::uri::{self, ParsedName};
use crate::writer::{WriteFile, WriteMode};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

/// URI scheme this build's driver answers to — `"s3"` by default, `"gs"`
/// under `feature = "gcs"`.
pub const SCHEME: &str = if cfg!(feature = "gcs") { "gs" } else { "s3" };

pub const DRIVER_NAME: &str = if cfg!(feature = "gcs") {
    "GCS driver"
} else {
    "S3 driver"
};

/// Recommended host-side I/O buffer size, 4 MiB.
pub const PREFERRED_BUFFER_SIZE: i64 = 4 * 1024 * 1024;

/// Implementation-defined "available space" constant:
/// comfortably large without approaching overflow in host arithmetic.
pub const DISK_FREE_SPACE: i64 = i64::MAX / 2;

static LOG_INIT: std::sync::Once = std::sync::Once::new();

/// Installs the process's `tracing-subscriber` filter exactly once, seeded
/// from the driver's log-level config key. Re-running
/// `connect` after a `disconnect` must not attempt a second `init()` — that
/// panics — hence the `Once` guard rather than a plain flag.
fn init_logging(log_level: &str) {
    LOG_INIT.call_once(|| {
        let level = match log_level {
            "trace" => "trace",
            "debug" => "debug",
            _ => "info",
        };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

fn config_keys() -> &'static ConfigKeys {
    if cfg!(feature = "gcs") {
        &GCS_KEYS
    } else {
        &S3_KEYS
    }
}

/// Process-global driver state: the object-store client, default bucket,
/// connection flag, handle registry and last-error slot, bundled as one
/// record with a lifetime of `connect`..`disconnect`.
pub struct DriverState {
    connected: AtomicBool,
    store: RwLock<Option<Arc<dyn ObjectStoreClient>>>,
    default_bucket: RwLock<Option<String>>,
    registry: Registry,
    last_error: Mutex<Option<String>>,
}

impl DriverState {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            store: RwLock::new(None),
            default_bucket: RwLock::new(None),
            registry: Registry::new(),
            last_error: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Record a human-readable message in the last-error slot — called by
    /// [`crate::ffi`] whenever an entry point's `Result` is `Err`,
    /// independent of which sentinel gets returned.
    pub fn record_error(&self, err: &DriverError) {
        error!(error = %err, "driver operation failed");
        *self.last_error.lock() = Some(err.to_string());
    }

    fn store_ref(&self) -> DriverResult<Arc<dyn ObjectStoreClient>> {
        self.store.read().clone().ok_or(DriverError::NotConnected)
    }

    fn parse(&self, path: &str) -> DriverResult<ParsedName> {
        let default_bucket = self.default_bucket.read().clone();
        uri::parse(path, SCHEME, default_bucket.as_deref())
    }

    /// `connect`: idempotent no-op success when already
    /// connected, otherwise loads config, initializes logging once, and
    /// constructs the object-store client.
    pub async fn connect(&self) -> DriverResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let config = DriverConfig::load(config_keys())
            .map_err(|e| DriverError::InvalidArgument(e.to_string()))?;
        init_logging(&config.log_level);

        let client: Arc<dyn ObjectStoreClient> = Self::connect_client(&config).await?;

        *self.store.write() = Some(client);
        *self.default_bucket.write() = config.default_bucket;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    #[cfg(not(feature = "gcs"))]
    async fn connect_client(config: &DriverConfig) -> DriverResult<Arc<dyn ObjectStoreClient>> {
        let client = crate::store::s3::S3Client::connect(config).await?;
        Ok(Arc::new(client))
    }

    #[cfg(feature = "gcs")]
    async fn connect_client(config: &DriverConfig) -> DriverResult<Arc<dyn ObjectStoreClient>> {
        let client = crate::store::gcs::GcsClient::connect(config).await?;
        Ok(Arc::new(client))
    }

    /// `disconnect`: drains the registry, best-effort
    /// aborting every open writer, tears down the client, clears
    /// `IsConnected`. Idempotent.
    pub async fn disconnect(&self) -> DriverResult<()> {
        if !self.is_connected() {
            return Ok(());
        }

        let store = self.store_ref()?;
        let writers = self.registry.drain();

        let mut abort_errors = Vec::new();
        for mut writer in writers {
            if let Err(e) = writer.abort(store.as_ref()).await {
                warn!(error = %e, "abort_multipart failed during disconnect drain");
                abort_errors.push(e.to_string());
            }
        }

        *self.store.write() = None;
        *self.default_bucket.write() = None;
        self.connected.store(false, Ordering::SeqCst);

        if !abort_errors.is_empty() {
            return Err(DriverError::Store {
                code: "DisconnectAbortFailures".to_string(),
                message: abort_errors.join("; "),
            });
        }
        Ok(())
    }

    /// `exist(path)`: trailing `/` is degenerate directory
    /// intent and always exists.
    pub async fn exist(&self, path: &str) -> DriverResult<bool> {
        if path.ends_with('/') {
            return self.dir_exists(path);
        }
        self.file_exists(path).await
    }

    pub async fn file_exists(&self, path: &str) -> DriverResult<bool> {
        let store = self.store_ref()?;
        let parsed = self.parse(path)?;
        match resolve(store.as_ref(), &parsed.bucket, &parsed.object).await {
            Ok(entries) => Ok(!entries.is_empty()),
            Err(DriverError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Object stores are flat; a directory "exists" unconditionally once
    /// connected.
    pub fn dir_exists(&self, _path: &str) -> DriverResult<bool> {
        if !self.is_connected() {
            return Err(DriverError::NotConnected);
        }
        Ok(true)
    }

    /// `getFileSize`: multifile-aware, via a full reader
    /// construction so common-header dedup is reflected (scenario 2).
    pub async fn get_file_size(&self, path: &str) -> DriverResult<u64> {
        let store = self.store_ref()?;
        let parsed = self.parse(path)?;
        let reader = MultiPartFile::open(store.as_ref(), &parsed.bucket, &parsed.object).await?;
        Ok(reader.total_size())
    }

    /// `fopen`: `'r'` builds a reader, `'w'`/`'a'` a
    /// writer (append falls back to a plain write internally when the
    /// target is missing).
    pub async fn fopen(&self, path: &str, mode: char) -> DriverResult<Handle> {
        let store = self.store_ref()?;
        let parsed = self.parse(path)?;

        match mode {
            'r' => {
                let reader =
                    MultiPartFile::open(store.as_ref(), &parsed.bucket, &parsed.object).await?;
                Ok(self.registry.insert_reader(reader))
            }
            'w' => {
                let writer = WriteFile::open(
                    store.as_ref(),
                    &parsed.bucket,
                    &parsed.object,
                    WriteMode::Write,
                )
                .await?;
                Ok(self.registry.insert_writer(writer))
            }
            'a' => {
                let writer = WriteFile::open(
                    store.as_ref(),
                    &parsed.bucket,
                    &parsed.object,
                    WriteMode::Append,
                )
                .await?;
                Ok(self.registry.insert_writer(writer))
            }
            other => Err(DriverError::InvalidArgument(format!(
                "unsupported fopen mode: {other:?}"
            ))),
        }
    }

    /// `fclose`: looks the handle up in either container;
    /// closing a writer finalizes its multipart upload.
    pub async fn fclose(&self, handle: Handle) -> DriverResult<()> {
        if self.registry.take_reader(handle).is_some() {
            return Ok(());
        }
        if let Some(mut writer) = self.registry.take_writer(handle) {
            let store = self.store_ref()?;
            if let Err(err) = writer.close(store.as_ref()).await {
                // Completion failed mid-upload; leave the handle registered
                // so a later disconnect can still abort it instead of
                // leaking the in-flight multipart upload.
                self.registry.put_writer(handle, writer);
                return Err(err);
            }
            return Ok(());
        }
        Err(DriverError::UnknownHandle)
    }

    /// `fseek` (readers only).
    pub fn fseek(&self, handle: Handle, offset: i64, whence: Whence) -> DriverResult<i64> {
        let mut reader = self
            .registry
            .take_reader(handle)
            .ok_or(DriverError::UnknownHandle)?;
        let result = reader.seek(offset, whence);
        self.registry.put_reader(handle, reader);
        result
    }

    /// `fread` (readers only); `offset` is left unchanged on error.
    pub async fn fread(&self, handle: Handle, n: usize) -> DriverResult<Vec<u8>> {
        let store = self.store_ref()?;
        let mut reader = self
            .registry
            .take_reader(handle)
            .ok_or(DriverError::UnknownHandle)?;
        let result = reader.read(store.as_ref(), n).await;
        self.registry.put_reader(handle, reader);
        result
    }

    /// `fwrite` (writers only).
    pub async fn fwrite(&self, handle: Handle, data: &[u8]) -> DriverResult<usize> {
        let store = self.store_ref()?;
        let mut writer = self
            .registry
            .take_writer(handle)
            .ok_or(DriverError::UnknownHandle)?;
        let result = writer.write(store.as_ref(), data).await;
        self.registry.put_writer(handle, writer);
        result
    }

    /// `fflush`: pure acknowledgment — multipart
    /// uploads cannot publish intermediate bytes, so there is nothing to
    /// flush beyond verifying the handle is still live.
    pub fn fflush(&self, handle: Handle) -> DriverResult<()> {
        if self.registry.contains(handle) {
            Ok(())
        } else {
            Err(DriverError::UnknownHandle)
        }
    }

    pub async fn remove(&self, path: &str) -> DriverResult<()> {
        let store = self.store_ref()?;
        let parsed = self.parse(path)?;
        store
            .delete(&parsed.bucket, &parsed.object)
            .await
            .map_err(DriverError::from)
    }

    /// `mkdir`/`rmdir` are no-ops that succeed once connected: object
    /// stores have no directory semantics.
    pub fn mkdir(&self, _path: &str) -> DriverResult<()> {
        if !self.is_connected() {
            return Err(DriverError::NotConnected);
        }
        Ok(())
    }

    pub fn rmdir(&self, _path: &str) -> DriverResult<()> {
        self.mkdir(_path)
    }

    /// `copyToLocal`: a single full `get`, streamed to the
    /// local path (the abstract client already buffers the whole object;
    /// there is no partial-read path to thread through here).
    pub async fn copy_to_local(&self, src: &str, dst_local: &str) -> DriverResult<()> {
        let store = self.store_ref()?;
        let parsed = self.parse(src)?;
        let data = store.get(&parsed.bucket, &parsed.object, None).await?;
        tokio::fs::write(dst_local, &data)
            .await
            .map_err(|e| DriverError::Protocol(format!("local write to {dst_local} failed: {e}")))
    }

    /// `copyFromLocal`: single-shot `put`.
    pub async fn copy_from_local(&self, src_local: &str, dst: &str) -> DriverResult<()> {
        let store = self.store_ref()?;
        let parsed = self.parse(dst)?;
        let data = tokio::fs::read(src_local)
            .await
            .map_err(|e| DriverError::Protocol(format!("local read from {src_local} failed: {e}")))?;
        store
            .put(&parsed.bucket, &parsed.object, Bytes::from(data))
            .await
            .map_err(DriverError::from)
    }

    /// Test-only constructor that skips real client construction, wiring a
    /// caller-supplied [`ObjectStoreClient`] (typically
    /// [`crate::store::testutil::MockStore`]) directly into `connected` state.
    #[cfg(test)]
    pub fn new_connected_for_test(
        store: Arc<dyn ObjectStoreClient>,
        default_bucket: Option<&str>,
    ) -> Self {
        let state = Self::new();
        *state.store.write() = Some(store);
        *state.default_bucket.write() = default_bucket.map(|s| s.to_string());
        state.connected.store(true, Ordering::SeqCst);
        state
    }
}

impl Default for DriverState {
    fn default() -> Self {
        Self::new()
    }
}
